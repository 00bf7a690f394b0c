//! Configuration loaded from the environment.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Longest source duration trusted from the probe: 24 hours.
pub const DEFAULT_MAX_DURATION_SECS: u64 = 24 * 60 * 60;

/// Extraction and upload policy for a single processing job.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Frames extracted per second of source video
    pub frame_rate: u32,
    /// Duration used when the probe fails or is disabled
    pub default_duration_secs: u64,
    /// When false the duration probe is never invoked
    pub probe_duration: bool,
    /// Probed durations above this are treated as a failed probe
    pub max_duration_secs: u64,
    /// Parent directory of the per-video frame directories
    pub frames_dir: PathBuf,
    /// Image extension of extracted frames
    pub frame_extension: String,
    /// Keep extracted frames on disk after the job finishes
    pub retain_frames: bool,
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            frame_rate: 2,
            default_duration_secs: 5,
            probe_duration: true,
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
            frames_dir: PathBuf::from("./frames"),
            frame_extension: String::from("jpg"),
            retain_frames: false,
            ffmpeg_bin: String::from("ffmpeg"),
            ffprobe_bin: String::from("ffprobe"),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let defaults = Self::default();

        Self {
            frame_rate: parse_var("FRAME_RATE", defaults.frame_rate).max(1),
            default_duration_secs: parse_var(
                "DEFAULT_DURATION_SECS",
                defaults.default_duration_secs,
            ),
            probe_duration: parse_var("PROBE_DURATION", defaults.probe_duration),
            max_duration_secs: parse_var("MAX_DURATION_SECS", defaults.max_duration_secs).max(1),
            frames_dir: env::var("FRAMES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.frames_dir),
            frame_extension: env::var("FRAME_EXTENSION").unwrap_or(defaults.frame_extension),
            retain_frames: parse_var("RETAIN_FRAMES", defaults.retain_frames),
            ffmpeg_bin: env::var("FFMPEG_BIN").unwrap_or(defaults.ffmpeg_bin),
            ffprobe_bin: env::var("FFPROBE_BIN").unwrap_or(defaults.ffprobe_bin),
        }
    }
}

/// Admission and scheduling policy of the work queue.
#[derive(Clone, Debug)]
pub struct QueueConfig {
    /// Maximum number of jobs in PROCESSING at once
    pub max_concurrent: usize,
    /// Re-poll delay when nothing is admissible
    pub poll_interval: Duration,
    /// Restart delay after the scheduler loop faults
    pub fault_backoff: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 1,
            poll_interval: Duration::from_millis(100),
            fault_backoff: Duration::from_secs(5),
        }
    }
}

impl QueueConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            max_concurrent: parse_var("MAX_CONCURRENT_JOBS", 1usize).max(1),
            poll_interval: Duration::from_millis(parse_var("QUEUE_POLL_INTERVAL_MS", 100)),
            fault_backoff: Duration::from_millis(parse_var("QUEUE_FAULT_BACKOFF_MS", 5000)),
        }
    }
}

/// Configuration of the HTTP binary and its collaborators.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// HTTP server bind address
    pub addr: String,
    /// HTTP server port
    pub port: String,
    /// Directory receiving uploaded videos
    pub upload_dir: PathBuf,
    /// Base URL of the image upload service; frames go to `artifact_dir` when unset
    pub image_service_url: Option<String>,
    /// Base URL of the notification service
    pub notification_service_url: Option<String>,
    pub artifact_dir: PathBuf,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            addr: env::var("ADDR").unwrap_or_else(|_| String::from("127.0.0.1")),
            port: env::var("PORT").unwrap_or_else(|_| String::from("3000")),
            upload_dir: PathBuf::from(
                env::var("UPLOAD_DIR").unwrap_or_else(|_| String::from("./files")),
            ),
            image_service_url: non_empty_var("IMAGE_SERVICE_URL"),
            notification_service_url: non_empty_var("NOTIFICATION_SERVICE_URL"),
            artifact_dir: PathBuf::from(
                env::var("ARTIFACT_DIR").unwrap_or_else(|_| String::from("./artifacts")),
            ),
        }
    }
}

fn parse_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
}
