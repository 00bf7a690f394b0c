use super::cmd::{DecoderCommands, SystemDecoder};
use crate::config::{PipelineConfig, DEFAULT_MAX_DURATION_SECS};
use crate::error::FrameError;
use crate::ports::extractor::FrameExtractor;
use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use tracing::{debug, warn};

/// Frame extractor backed by the ffmpeg/ffprobe binaries.
pub struct FfmpegExtractor<C = SystemDecoder> {
    commands: C,
    default_duration_secs: u64,
    probe_enabled: bool,
    max_duration_secs: u64,
}

impl FfmpegExtractor<SystemDecoder> {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            SystemDecoder::new(&config.ffmpeg_bin, &config.ffprobe_bin),
            config.default_duration_secs,
            config.probe_duration,
        )
        .with_max_duration(config.max_duration_secs)
    }
}

impl<C: DecoderCommands> FfmpegExtractor<C> {
    pub fn new(commands: C, default_duration_secs: u64, probe_enabled: bool) -> Self {
        Self {
            commands,
            default_duration_secs,
            probe_enabled,
            max_duration_secs: DEFAULT_MAX_DURATION_SECS,
        }
    }

    /// Probed durations above `secs` fall back to the default duration.
    pub fn with_max_duration(mut self, secs: u64) -> Self {
        self.max_duration_secs = secs;
        self
    }

    async fn probe(&self, source: &Path) -> Result<u64, FrameError> {
        let output = self
            .commands
            .run_ffprobe_for_duration(source)
            .await
            .map_err(|e| FrameError::ProbeFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(FrameError::ProbeFailed(stderr_of(&output)));
        }
        parse_duration(&output.stdout, self.max_duration_secs)
    }

    async fn availability(&self) -> Result<(), FrameError> {
        let output = self
            .commands
            .run_ffmpeg_version()
            .await
            .map_err(|e| FrameError::ToolUnavailable(e.to_string()))?;

        if !output.status.success() {
            return Err(FrameError::ToolUnavailable(stderr_of(&output)));
        }
        Ok(())
    }
}

#[async_trait]
impl<C: DecoderCommands> FrameExtractor for FfmpegExtractor<C> {
    async fn probe_duration(&self, source: &Path) -> u64 {
        if !self.probe_enabled {
            return self.default_duration_secs;
        }

        match self.probe(source).await {
            Ok(duration) => duration,
            Err(e) => {
                warn!(
                    "Falling back to {}s for {:?}: {}",
                    self.default_duration_secs, source, e
                );
                self.default_duration_secs
            }
        }
    }

    async fn extract_frame(
        &self,
        source: &Path,
        at: f64,
        output: &Path,
    ) -> Result<Vec<u8>, FrameError> {
        let result = self
            .commands
            .run_ffmpeg_frame(source, at, output)
            .await
            .map_err(|e| FrameError::extraction_failed(at, e.to_string()))?;

        if !result.status.success() {
            return Err(FrameError::extraction_failed(at, stderr_of(&result)));
        }

        let bytes = tokio::fs::read(output)
            .await
            .map_err(|e| FrameError::extraction_failed(at, format!("no frame at {:?}: {}", output, e)))?;
        debug!("Extracted {} bytes at {:.3}s", bytes.len(), at);
        Ok(bytes)
    }

    async fn check_availability(&self) -> bool {
        match self.availability().await {
            Ok(()) => true,
            Err(e) => {
                warn!("{}", e);
                false
            }
        }
    }
}

/// Parse ffprobe's bare `format=duration` output, truncated to whole seconds.
///
/// Durations longer than `max_secs` come from corrupt headers and are
/// rejected like unparseable output.
pub fn parse_duration(stdout: &[u8], max_secs: u64) -> Result<u64, FrameError> {
    let text = String::from_utf8_lossy(stdout);
    let text = text.trim();
    let secs: f64 = text
        .parse()
        .map_err(|_| FrameError::ProbeFailed(format!("unparseable duration {:?}", text)))?;

    if !secs.is_finite() || secs < 0.0 {
        return Err(FrameError::ProbeFailed(format!("invalid duration {}", secs)));
    }
    let whole = secs.trunc();
    if whole > max_secs as f64 {
        return Err(FrameError::ProbeFailed(format!(
            "duration {}s exceeds the {}s limit",
            whole, max_secs
        )));
    }
    Ok(whole as u64)
}

fn stderr_of(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr
    }
}
