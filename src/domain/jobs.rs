use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Lifecycle of a job tracked by the work queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Durable status of a video record, written by the status reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VideoRecordStatus {
    Uploaded,
    Processing,
    Done,
    Error,
}

impl fmt::Display for VideoRecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VideoRecordStatus::Uploaded => "UPLOADED",
            VideoRecordStatus::Processing => "PROCESSING",
            VideoRecordStatus::Done => "DONE",
            VideoRecordStatus::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// One processing run of a video, as tracked by the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoJob {
    pub id: String,
    pub video_id: String,
    pub source_path: PathBuf,
    pub frame_rate: u32,
    /// Whole seconds, known once a run has probed the source
    pub duration_secs: Option<u64>,
    pub status: JobStatus,
    pub error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
}

impl VideoJob {
    pub fn new(video_id: impl Into<String>, source_path: impl Into<PathBuf>, frame_rate: u32) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            video_id: video_id.into(),
            source_path: source_path.into(),
            frame_rate,
            duration_secs: None,
            status: JobStatus::Pending,
            error: None,
            enqueued_at: Utc::now(),
        }
    }

    /// Name of the source file without its extension, used for logs and notices.
    pub fn video_name(&self) -> String {
        self.source_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Outcome of a run that reached the end of its frame plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FrameReport {
    pub duration_secs: u64,
    pub planned: usize,
    pub uploaded: usize,
    pub failed_extractions: usize,
    pub failed_uploads: usize,
}

impl FrameReport {
    pub fn dropped(&self) -> usize {
        self.failed_extractions + self.failed_uploads
    }
}
