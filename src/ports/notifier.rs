use crate::error::BoxError;
use async_trait::async_trait;
use serde::Serialize;

/// Sent when a video could not be processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureNotice {
    pub video_id: String,
    pub video_name: String,
    pub error: String,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_failure(&self, notice: &FailureNotice) -> Result<(), BoxError>;
}
