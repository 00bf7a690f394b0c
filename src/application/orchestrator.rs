use crate::application::queue::{JobRunner, QueueEvent, QueueStatus, WorkQueue};
use crate::domain::jobs::VideoJob;
use std::path::Path;
use tokio::sync::broadcast;
use tracing::info;

/// Returned by [`OrchestratorService::submit`] as soon as the job is queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: String,
    pub video_id: String,
}

/// Entry point for callers: turns accepted videos into queued processing jobs.
pub struct OrchestratorService<J> {
    queue: WorkQueue<J>,
    frame_rate: u32,
}

impl<J: JobRunner> OrchestratorService<J> {
    pub fn new(queue: WorkQueue<J>, frame_rate: u32) -> Self {
        Self { queue, frame_rate }
    }

    /// Queue a video for frame extraction. Does not wait for processing.
    pub async fn submit(&self, video_id: &str, source_path: &Path) -> JobHandle {
        let job = VideoJob::new(video_id, source_path, self.frame_rate);
        let job_id = self.queue.enqueue(job).await;
        info!("Submitted video {} as job {}", video_id, job_id);

        JobHandle {
            job_id,
            video_id: video_id.to_string(),
        }
    }

    pub async fn queue_status(&self) -> QueueStatus {
        self.queue.status().await
    }

    pub async fn retry_failed(&self) -> usize {
        self.queue.retry_failed().await
    }

    /// Completion notifications for submitted jobs.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.queue.subscribe()
    }

    pub fn queue(&self) -> &WorkQueue<J> {
        &self.queue
    }
}
