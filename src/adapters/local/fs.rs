use crate::error::BoxError;
use crate::ports::storage::{ArtifactDescriptor, ArtifactUploader};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};

/// Artifact store writing frames to `<root>/<video_id>/<filename>`.
#[derive(Clone, Debug)]
pub struct FsArtifactStore {
    root: PathBuf,
}

impl FsArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn key_path(&self, video_id: &str, filename: &str) -> Result<PathBuf, BoxError> {
        for part in [video_id, filename] {
            let mut components = Path::new(part).components();
            let single_normal = matches!(components.next(), Some(Component::Normal(_)))
                && components.next().is_none();
            if !single_normal {
                return Err(format!("Invalid artifact key component {:?}", part).into());
            }
        }
        Ok(self.root.join(video_id).join(filename))
    }
}

#[async_trait]
impl ArtifactUploader for FsArtifactStore {
    async fn upload_frame(
        &self,
        video_id: &str,
        filename: &str,
        bytes: Vec<u8>,
    ) -> Result<ArtifactDescriptor, BoxError> {
        let path = self.key_path(video_id, filename)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Overwrites, so re-uploading a frame after a retry is harmless.
        tokio::fs::write(&path, bytes).await?;

        Ok(ArtifactDescriptor {
            video_id: video_id.to_string(),
            filename: filename.to_string(),
            location: Some(path.to_string_lossy().into_owned()),
        })
    }
}
