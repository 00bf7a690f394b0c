use crate::error::BoxError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Where an uploaded frame ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDescriptor {
    pub video_id: String,
    pub filename: String,
    pub location: Option<String>,
}

#[async_trait]
pub trait ArtifactUploader: Send + Sync {
    /// Store `bytes` under `filename` for `video_id`.
    /// Uploading the same (video_id, filename) twice overwrites the first copy.
    async fn upload_frame(
        &self,
        video_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<ArtifactDescriptor, BoxError>;
}

#[async_trait]
impl<T: ArtifactUploader + ?Sized> ArtifactUploader for Arc<T> {
    async fn upload_frame(
        &self,
        video_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<ArtifactDescriptor, BoxError> {
        (**self).upload_frame(video_id, filename, bytes).await
    }
}
