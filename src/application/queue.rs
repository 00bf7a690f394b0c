//! In-memory work queue bounding how many videos are processed at once.
//!
//! Jobs live in a single collection behind one mutex. A scheduler task admits
//! the oldest pending job whenever a concurrency slot is free and runs it on
//! its own task; job completion frees the slot and wakes the scheduler. When
//! nothing is pending or processing the scheduler drops completed jobs, keeps
//! failed ones for [`WorkQueue::retry_failed`], and exits until the next
//! enqueue.

use crate::config::QueueConfig;
use crate::domain::jobs::{FrameReport, JobStatus, VideoJob};
use crate::error::JobError;
use async_trait::async_trait;
use serde::Serialize;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, Notify};
use tokio::task::JoinError;
use tracing::{debug, error, info};

/// Executes one admitted job.
#[async_trait]
pub trait JobRunner: Send + Sync + 'static {
    async fn run(&self, job: &VideoJob) -> Result<FrameReport, JobError>;
}

/// Lifecycle notifications published by the queue.
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    Admitted {
        job_id: String,
        video_id: String,
    },
    Finished {
        job_id: String,
        video_id: String,
        status: JobStatus,
        error: Option<String>,
    },
    /// Nothing pending or processing; the scheduler went idle.
    Drained,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

const EVENT_CAPACITY: usize = 256;

#[derive(Default)]
struct QueueState {
    jobs: Vec<VideoJob>,
    processing: usize,
    scheduler_running: bool,
}

impl QueueState {
    /// Move the oldest pending job to PROCESSING if a slot is free.
    fn admit(&mut self, limit: usize) -> Option<VideoJob> {
        if self.processing >= limit {
            return None;
        }
        let job = self
            .jobs
            .iter_mut()
            .filter(|job| job.status == JobStatus::Pending)
            .min_by_key(|job| job.enqueued_at)?;
        job.status = JobStatus::Processing;
        self.processing += 1;
        Some(job.clone())
    }

    fn is_idle(&self) -> bool {
        self.processing == 0
            && self
                .jobs
                .iter()
                .all(|job| job.status != JobStatus::Pending && job.status != JobStatus::Processing)
    }

    fn count(&self, status: JobStatus) -> usize {
        self.jobs.iter().filter(|job| job.status == status).count()
    }
}

struct Shared<J> {
    state: Mutex<QueueState>,
    runner: Arc<J>,
    config: QueueConfig,
    wake: Notify,
    events: broadcast::Sender<QueueEvent>,
}

pub struct WorkQueue<J> {
    shared: Arc<Shared<J>>,
}

impl<J> Clone for WorkQueue<J> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<J: JobRunner> WorkQueue<J> {
    pub fn new(runner: Arc<J>, config: QueueConfig) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState::default()),
                runner,
                config,
                wake: Notify::new(),
                events,
            }),
        }
    }

    /// Add a job as PENDING and make sure the scheduler is running.
    pub async fn enqueue(&self, mut job: VideoJob) -> String {
        job.status = JobStatus::Pending;
        job.error = None;
        let id = job.id.clone();

        let mut state = self.shared.state.lock().await;
        state.jobs.push(job);
        info!("Job {} added to queue. Total in queue: {}", id, state.jobs.len());
        start_or_wake(&self.shared, &mut state);
        id
    }

    /// Move every FAILED job back to PENDING. Returns how many were moved.
    pub async fn retry_failed(&self) -> usize {
        let mut state = self.shared.state.lock().await;
        let mut moved = 0;
        for job in state.jobs.iter_mut().filter(|job| job.status == JobStatus::Failed) {
            job.status = JobStatus::Pending;
            job.error = None;
            moved += 1;
        }

        if moved > 0 {
            info!("{} failed jobs added back to the queue", moved);
            start_or_wake(&self.shared, &mut state);
        }
        moved
    }

    pub async fn status(&self) -> QueueStatus {
        let state = self.shared.state.lock().await;
        QueueStatus {
            total: state.jobs.len(),
            pending: state.count(JobStatus::Pending),
            processing: state.count(JobStatus::Processing),
            completed: state.count(JobStatus::Completed),
            failed: state.count(JobStatus::Failed),
        }
    }

    /// Snapshot of the tracked jobs.
    pub async fn jobs(&self) -> Vec<VideoJob> {
        self.shared.state.lock().await.jobs.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.shared.events.subscribe()
    }
}

fn start_or_wake<J: JobRunner>(shared: &Arc<Shared<J>>, state: &mut QueueState) {
    if state.scheduler_running {
        shared.wake.notify_one();
    } else {
        state.scheduler_running = true;
        let scheduler = shared.clone();
        tokio::spawn(supervise(shared.config.fault_backoff, move || {
            schedule(scheduler.clone())
        }));
    }
}

/// Keep the scheduler alive: a panicking loop is restarted after the fault backoff.
async fn supervise<F, Fut>(fault_backoff: Duration, mut scheduler: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        match tokio::spawn(scheduler()).await {
            Ok(()) => return,
            Err(e) => {
                error!("Queue scheduler faulted: {}. Restarting in {:?}", e, fault_backoff);
                tokio::time::sleep(fault_backoff).await;
            }
        }
    }
}

async fn schedule<J: JobRunner>(shared: Arc<Shared<J>>) {
    loop {
        let admitted = {
            let mut state = shared.state.lock().await;
            let admitted = state.admit(shared.config.max_concurrent);

            if admitted.is_none() && state.is_idle() {
                let before = state.jobs.len();
                state.jobs.retain(|job| job.status == JobStatus::Failed);
                state.scheduler_running = false;
                info!(
                    "Queue drained: {} jobs retired, {} failed kept for retry",
                    before - state.jobs.len(),
                    state.jobs.len()
                );
                let _ = shared.events.send(QueueEvent::Drained);
                return;
            }
            admitted
        };

        match admitted {
            Some(job) => execute(shared.clone(), job),
            None => {
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    _ = tokio::time::sleep(shared.config.poll_interval) => {}
                }
            }
        }
    }
}

/// Run an admitted job on its own task and record its outcome.
fn execute<J: JobRunner>(shared: Arc<Shared<J>>, job: VideoJob) {
    debug!("Admitted job {} for video {}", job.id, job.video_id);
    let _ = shared.events.send(QueueEvent::Admitted {
        job_id: job.id.clone(),
        video_id: job.video_id.clone(),
    });

    tokio::spawn(async move {
        let runner = shared.runner.clone();
        let run_job = job.clone();
        let outcome = match tokio::spawn(async move { runner.run(&run_job).await }).await {
            Ok(Ok(report)) => Ok(report),
            Ok(Err(e)) => Err(e.to_string()),
            Err(e) => Err(JobError::Panicked(panic_message(e)).to_string()),
        };
        finish(&shared, &job, outcome).await;
    });
}

async fn finish<J>(shared: &Shared<J>, job: &VideoJob, outcome: Result<FrameReport, String>) {
    let mut state = shared.state.lock().await;
    state.processing = state.processing.saturating_sub(1);

    let (status, error) = match outcome {
        Ok(report) => {
            info!("Job {} completed", job.id);
            if let Some(tracked) = state.jobs.iter_mut().find(|j| j.id == job.id) {
                tracked.status = JobStatus::Completed;
                tracked.duration_secs = Some(report.duration_secs);
                tracked.error = None;
            }
            (JobStatus::Completed, None)
        }
        Err(cause) => {
            error!("Job {} failed: {}", job.id, cause);
            if let Some(tracked) = state.jobs.iter_mut().find(|j| j.id == job.id) {
                tracked.status = JobStatus::Failed;
                tracked.error = Some(cause.clone());
            }
            (JobStatus::Failed, Some(cause))
        }
    };

    let _ = shared.events.send(QueueEvent::Finished {
        job_id: job.id.clone(),
        video_id: job.video_id.clone(),
        status,
        error,
    });
    drop(state);
    shared.wake.notify_one();
}

fn panic_message(err: JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => downcast_panic(payload),
        Err(err) => err.to_string(),
    }
}

fn downcast_panic(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::from("unknown panic")
    }
}
