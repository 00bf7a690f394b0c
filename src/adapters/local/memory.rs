use crate::domain::jobs::VideoRecordStatus;
use crate::error::BoxError;
use crate::ports::repository::StatusReporter;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub uuid: String,
    pub user_id: String,
    pub name: String,
    pub extension: String,
    pub path: PathBuf,
    pub status: VideoRecordStatus,
}

/// Video records kept in process memory. Lost on restart.
#[derive(Debug, Default)]
pub struct MemoryVideoStore {
    records: RwLock<HashMap<String, VideoRecord>>,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an uploaded video with status UPLOADED.
    pub async fn create(&self, user_id: &str, path: PathBuf) -> VideoRecord {
        let record = VideoRecord {
            uuid: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            name: path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            extension: path
                .extension()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
            path,
            status: VideoRecordStatus::Uploaded,
        };
        self.records
            .write()
            .await
            .insert(record.uuid.clone(), record.clone());
        record
    }

    pub async fn get(&self, uuid: &str) -> Option<VideoRecord> {
        self.records.read().await.get(uuid).cloned()
    }
}

#[async_trait]
impl StatusReporter for MemoryVideoStore {
    async fn set_video_status(
        &self,
        video_id: &str,
        status: VideoRecordStatus,
    ) -> Result<(), BoxError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(video_id)
            .ok_or_else(|| format!("Video {} not found", video_id))?;
        record.status = status;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_and_update_status() {
        let store = MemoryVideoStore::new();
        let record = store.create("42", PathBuf::from("./files/clip-1a2b.mp4")).await;
        assert_eq!(record.status, VideoRecordStatus::Uploaded);
        assert_eq!(record.name, "clip-1a2b");
        assert_eq!(record.extension, "mp4");

        store
            .set_video_status(&record.uuid, VideoRecordStatus::Done)
            .await
            .unwrap();
        assert_eq!(store.get(&record.uuid).await.unwrap().status, VideoRecordStatus::Done);
    }

    #[tokio::test]
    async fn test_unknown_video_is_an_error() {
        let store = MemoryVideoStore::new();
        assert!(store
            .set_video_status("missing", VideoRecordStatus::Error)
            .await
            .is_err());
    }
}
