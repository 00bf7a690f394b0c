use crate::application::queue::JobRunner;
use crate::config::PipelineConfig;
use crate::domain::jobs::{FrameReport, VideoJob, VideoRecordStatus};
use crate::domain::plan::{safe_stem, FramePlan};
use crate::error::JobError;
use crate::ports::extractor::FrameExtractor;
use crate::ports::notifier::{FailureNotice, Notifier};
use crate::ports::repository::StatusReporter;
use crate::ports::storage::ArtifactUploader;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Runs the extract/upload loop of one video and resolves its terminal status.
pub struct WorkerService<X, U, R> {
    extractor: X,
    uploader: U,
    reporter: R,
    notifier: Option<Arc<dyn Notifier>>,
    config: PipelineConfig,
}

impl<X, U, R> WorkerService<X, U, R>
where
    X: FrameExtractor,
    U: ArtifactUploader,
    R: StatusReporter,
{
    pub fn new(extractor: X, uploader: U, reporter: R, config: PipelineConfig) -> Self {
        Self {
            extractor,
            uploader,
            reporter,
            notifier: None,
            config,
        }
    }

    /// Send a failure notice whenever a job fails.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Process a job end to end.
    ///
    /// Per-frame extraction and upload failures are counted in the report and
    /// never fail the job. Only pipeline-level failures return an error, in
    /// which case the video is reported as ERROR.
    pub async fn run(&self, job: &VideoJob) -> Result<FrameReport, JobError> {
        info!("[Job {}] Processing video {} ({:?})", job.id, job.video_id, job.source_path);
        self.report(&job.video_id, VideoRecordStatus::Processing).await;

        // Per job, so concurrent runs over the same source never share scratch space.
        let frames_dir = self
            .config
            .frames_dir
            .join(format!("{}-{}", safe_stem(&job.source_path), job.id));
        let result = self.process(job, &frames_dir).await;

        if !self.config.retain_frames {
            if let Err(e) = tokio::fs::remove_dir_all(&frames_dir).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("[Job {}] Could not clean up {:?}: {}", job.id, frames_dir, e);
                }
            }
        }

        match &result {
            Ok(report) => {
                info!(
                    "[Job {}] Video {} done: {}/{} frames uploaded",
                    job.id, job.video_id, report.uploaded, report.planned
                );
                self.report(&job.video_id, VideoRecordStatus::Done).await;
            }
            Err(e) => {
                error!("[Job {}] Video {} failed: {}", job.id, job.video_id, e);
                self.report(&job.video_id, VideoRecordStatus::Error).await;
                self.notify(job, e).await;
            }
        }

        result
    }

    async fn process(&self, job: &VideoJob, frames_dir: &Path) -> Result<FrameReport, JobError> {
        tokio::fs::create_dir_all(frames_dir).await?;

        let mut duration = self.extractor.probe_duration(&job.source_path).await;
        if duration > self.config.max_duration_secs {
            warn!(
                "[Job {}] Probed {}s exceeds {}s, using {}s",
                job.id, duration, self.config.max_duration_secs, self.config.default_duration_secs
            );
            duration = self.config.default_duration_secs;
        }

        if !self.extractor.check_availability().await {
            return Err(JobError::ProcessorUnavailable);
        }

        let plan = FramePlan::new(duration, job.frame_rate).ok_or_else(|| {
            JobError::Internal(format!(
                "frame plan for {}s at {} fps is too large",
                duration, job.frame_rate
            ))
        })?;
        let mut report = FrameReport {
            duration_secs: duration,
            planned: plan.len(),
            ..FrameReport::default()
        };
        debug!("[Job {}] {}s at {} fps: {} frames", job.id, duration, job.frame_rate, plan.len());

        for frame in plan.iter() {
            let filename = plan.filename(frame.index, &self.config.frame_extension);
            let output = frames_dir.join(&filename);

            let bytes = match self
                .extractor
                .extract_frame(&job.source_path, frame.timestamp, &output)
                .await
            {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("[Job {}] Skipping frame {}: {}", job.id, frame.index, e);
                    report.failed_extractions += 1;
                    continue;
                }
            };

            match self.uploader.upload_frame(&job.video_id, &filename, bytes).await {
                Ok(artifact) => {
                    debug!("[Job {}] Uploaded {} ({:?})", job.id, filename, artifact.location);
                    report.uploaded += 1;
                }
                Err(e) => {
                    warn!("[Job {}] Upload of {} failed: {}", job.id, filename, e);
                    report.failed_uploads += 1;
                }
            }
        }

        Ok(report)
    }

    async fn report(&self, video_id: &str, status: VideoRecordStatus) {
        if let Err(e) = self.reporter.set_video_status(video_id, status).await {
            warn!("Could not set video {} to {}: {}", video_id, status, e);
        }
    }

    async fn notify(&self, job: &VideoJob, cause: &JobError) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        let notice = FailureNotice {
            video_id: job.video_id.clone(),
            video_name: job.video_name(),
            error: cause.to_string(),
        };
        if let Err(e) = notifier.notify_failure(&notice).await {
            warn!("Could not send failure notice for video {}: {}", job.video_id, e);
        }
    }
}

#[async_trait]
impl<X, U, R> JobRunner for WorkerService<X, U, R>
where
    X: FrameExtractor + 'static,
    U: ArtifactUploader + 'static,
    R: StatusReporter + 'static,
{
    async fn run(&self, job: &VideoJob) -> Result<FrameReport, JobError> {
        WorkerService::run(self, job).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{BoxError, FrameError};
    use crate::ports::storage::ArtifactDescriptor;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[derive(Default)]
    struct FakeExtractor {
        duration: u64,
        unavailable: bool,
        fail_at: Vec<f64>,
        /// Write each frame to its output path and read it back, like ffmpeg.
        on_disk: bool,
        attempts: Mutex<Vec<f64>>,
    }

    #[async_trait]
    impl FrameExtractor for FakeExtractor {
        async fn probe_duration(&self, _source: &Path) -> u64 {
            self.duration
        }

        async fn extract_frame(&self, _source: &Path, at: f64, output: &Path) -> Result<Vec<u8>, FrameError> {
            self.attempts.lock().unwrap().push(at);
            if self.fail_at.contains(&at) {
                return Err(FrameError::extraction_failed(at, "corrupt packet"));
            }
            if !self.on_disk {
                return Ok(at.to_string().into_bytes());
            }
            let io_err = |e: std::io::Error| FrameError::extraction_failed(at, e.to_string());
            tokio::fs::write(output, at.to_string()).await.map_err(io_err)?;
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            tokio::fs::read(output).await.map_err(io_err)
        }

        async fn check_availability(&self) -> bool {
            !self.unavailable
        }
    }

    #[derive(Default)]
    struct FakeUploader {
        uploads: Mutex<Vec<String>>,
        reject: Vec<String>,
    }

    #[async_trait]
    impl ArtifactUploader for FakeUploader {
        async fn upload_frame(&self, video_id: &str, filename: &str, _bytes: Vec<u8>) -> Result<ArtifactDescriptor, BoxError> {
            if self.reject.iter().any(|r| r == filename) {
                return Err("503 from image service".into());
            }
            self.uploads.lock().unwrap().push(filename.to_string());
            Ok(ArtifactDescriptor {
                video_id: video_id.to_string(),
                filename: filename.to_string(),
                location: None,
            })
        }
    }

    #[derive(Default)]
    struct FakeReporter {
        statuses: Mutex<Vec<VideoRecordStatus>>,
        broken: bool,
    }

    #[async_trait]
    impl StatusReporter for FakeReporter {
        async fn set_video_status(&self, _video_id: &str, status: VideoRecordStatus) -> Result<(), BoxError> {
            if self.broken {
                return Err("database is down".into());
            }
            self.statuses.lock().unwrap().push(status);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        notices: Mutex<Vec<FailureNotice>>,
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        async fn notify_failure(&self, notice: &FailureNotice) -> Result<(), BoxError> {
            self.notices.lock().unwrap().push(notice.clone());
            Ok(())
        }
    }

    fn config(dir: &Path) -> PipelineConfig {
        PipelineConfig {
            frames_dir: dir.to_path_buf(),
            ..PipelineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_all_frames_uploaded() {
        let dir = tempdir().unwrap();
        let worker = WorkerService::new(
            FakeExtractor { duration: 3, ..Default::default() },
            FakeUploader::default(),
            FakeReporter::default(),
            config(dir.path()),
        );
        let job = VideoJob::new("video-1", "/files/clip.mp4", 2);

        let report = worker.run(&job).await.unwrap();

        assert_eq!(report.planned, 6);
        assert_eq!(report.uploaded, 6);
        assert_eq!(report.dropped(), 0);
        assert_eq!(
            *worker.extractor.attempts.lock().unwrap(),
            vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5]
        );
        assert_eq!(
            *worker.reporter.statuses.lock().unwrap(),
            vec![VideoRecordStatus::Processing, VideoRecordStatus::Done]
        );
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_unavailable_tool_fails_without_uploads() {
        let dir = tempdir().unwrap();
        let notifier = Arc::new(FakeNotifier::default());
        let worker = WorkerService::new(
            FakeExtractor { duration: 3, unavailable: true, ..Default::default() },
            FakeUploader::default(),
            FakeReporter::default(),
            config(dir.path()),
        )
        .with_notifier(notifier.clone());
        let job = VideoJob::new("video-2", "/files/clip.mp4", 2);

        let result = worker.run(&job).await;

        assert!(matches!(result, Err(JobError::ProcessorUnavailable)));
        assert!(worker.extractor.attempts.lock().unwrap().is_empty());
        assert!(worker.uploader.uploads.lock().unwrap().is_empty());
        assert_eq!(
            *worker.reporter.statuses.lock().unwrap(),
            vec![VideoRecordStatus::Processing, VideoRecordStatus::Error]
        );
        let notices = notifier.notices.lock().unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].video_name, "clip");
        assert_eq!(notices[0].error, "processor unavailable");
    }

    #[tokio::test]
    async fn test_frame_failures_do_not_fail_the_job() {
        let dir = tempdir().unwrap();
        let worker = WorkerService::new(
            FakeExtractor { duration: 3, fail_at: vec![1.5], ..Default::default() },
            FakeUploader { reject: vec![String::from("frame_000005.jpg")], ..Default::default() },
            FakeReporter::default(),
            config(dir.path()),
        );
        let job = VideoJob::new("video-3", "/files/clip.mp4", 2);

        let report = worker.run(&job).await.unwrap();

        assert_eq!(report.failed_extractions, 1);
        assert_eq!(report.failed_uploads, 1);
        assert_eq!(report.uploaded, 4);
        assert_eq!(
            *worker.uploader.uploads.lock().unwrap(),
            vec!["frame_000000.jpg", "frame_000001.jpg", "frame_000002.jpg", "frame_000004.jpg"]
        );
        assert_eq!(worker.reporter.statuses.lock().unwrap().last(), Some(&VideoRecordStatus::Done));
    }

    #[tokio::test]
    async fn test_every_frame_failing_still_completes() {
        let dir = tempdir().unwrap();
        let worker = WorkerService::new(
            FakeExtractor { duration: 1, fail_at: vec![0.0, 0.5], ..Default::default() },
            FakeUploader::default(),
            FakeReporter::default(),
            config(dir.path()),
        );
        let job = VideoJob::new("video-4", "/files/clip.mp4", 2);

        let report = worker.run(&job).await.unwrap();
        assert_eq!(report.uploaded, 0);
        assert_eq!(report.failed_extractions, 2);
    }

    #[tokio::test]
    async fn test_reporting_failure_is_not_fatal() {
        let dir = tempdir().unwrap();
        let worker = WorkerService::new(
            FakeExtractor { duration: 2, ..Default::default() },
            FakeUploader::default(),
            FakeReporter { broken: true, ..Default::default() },
            config(dir.path()),
        );
        let job = VideoJob::new("video-5", "/files/clip.mp4", 2);

        let report = worker.run(&job).await.unwrap();
        assert_eq!(report.uploaded, 4);
    }

    #[tokio::test]
    async fn test_retained_frames_directory_is_kept() {
        let dir = tempdir().unwrap();
        let worker = WorkerService::new(
            FakeExtractor { duration: 1, ..Default::default() },
            FakeUploader::default(),
            FakeReporter::default(),
            PipelineConfig {
                retain_frames: true,
                ..config(dir.path())
            },
        );
        let job = VideoJob::new("video-6", "/files/my clip.mp4", 2);

        worker.run(&job).await.unwrap();
        assert!(dir.path().join(format!("my_clip-{}", job.id)).is_dir());
    }

    #[tokio::test]
    async fn test_absurd_duration_falls_back_to_default() {
        let dir = tempdir().unwrap();
        let worker = WorkerService::new(
            FakeExtractor { duration: u64::MAX, ..Default::default() },
            FakeUploader::default(),
            FakeReporter::default(),
            config(dir.path()),
        );
        let job = VideoJob::new("video-8", "/files/clip.mp4", 2);

        let report = worker.run(&job).await.unwrap();
        assert_eq!(report.duration_secs, 5);
        assert_eq!(report.planned, 10);
    }

    #[tokio::test]
    async fn test_oversized_plan_fails_the_job() {
        let dir = tempdir().unwrap();
        let worker = WorkerService::new(
            FakeExtractor { duration: 86_400, ..Default::default() },
            FakeUploader::default(),
            FakeReporter::default(),
            config(dir.path()),
        );
        let job = VideoJob::new("video-9", "/files/clip.mp4", u32::MAX);

        let result = worker.run(&job).await;
        assert!(matches!(result, Err(JobError::Internal(_))));
        assert!(worker.extractor.attempts.lock().unwrap().is_empty());
        assert_eq!(worker.reporter.statuses.lock().unwrap().last(), Some(&VideoRecordStatus::Error));
    }

    #[tokio::test]
    async fn test_concurrent_runs_of_one_source_keep_their_frames() {
        let dir = tempdir().unwrap();
        let short = WorkerService::new(
            FakeExtractor { duration: 1, on_disk: true, ..Default::default() },
            FakeUploader::default(),
            FakeReporter::default(),
            config(dir.path()),
        );
        let long = WorkerService::new(
            FakeExtractor { duration: 4, on_disk: true, ..Default::default() },
            FakeUploader::default(),
            FakeReporter::default(),
            config(dir.path()),
        );
        let first = VideoJob::new("video-10", "/files/clip.mp4", 2);
        let second = VideoJob::new("video-10", "/files/clip.mp4", 2);

        let (a, b) = tokio::join!(short.run(&first), long.run(&second));

        let (a, b) = (a.unwrap(), b.unwrap());
        assert_eq!((a.uploaded, a.failed_extractions), (2, 0));
        assert_eq!((b.uploaded, b.failed_extractions), (8, 0));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[tokio::test]
    async fn test_unwritable_frames_dir_fails_the_job() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"file").unwrap();

        let worker = WorkerService::new(
            FakeExtractor { duration: 3, ..Default::default() },
            FakeUploader::default(),
            FakeReporter::default(),
            config(&blocker),
        );
        let job = VideoJob::new("video-7", "/files/clip.mp4", 2);

        let result = worker.run(&job).await;
        assert!(matches!(result, Err(JobError::Io(_))));
        assert!(worker.uploader.uploads.lock().unwrap().is_empty());
        assert_eq!(worker.reporter.statuses.lock().unwrap().last(), Some(&VideoRecordStatus::Error));
    }
}
