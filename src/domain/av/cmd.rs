use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command as TokioCommand;

/// Process invocations of the external decoding tool.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DecoderCommands: Send + Sync {
    async fn run_ffprobe_for_duration(&self, media_path: &Path) -> io::Result<Output>;
    async fn run_ffmpeg_frame(&self, media_path: &Path, at: f64, output_path: &Path) -> io::Result<Output>;
    async fn run_ffmpeg_version(&self) -> io::Result<Output>;
}

pub struct SystemDecoder {
    ffmpeg: String,
    ffprobe: String,
}

impl SystemDecoder {
    pub fn new(ffmpeg: impl Into<String>, ffprobe: impl Into<String>) -> Self {
        Self {
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }
}

impl Default for SystemDecoder {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

#[async_trait]
impl DecoderCommands for SystemDecoder {
    async fn run_ffprobe_for_duration(&self, media_path: &Path) -> io::Result<Output> {
        TokioCommand::new(&self.ffprobe)
            .arg("-v").arg("error")
            .arg("-show_entries").arg("format=duration")
            .arg("-of").arg("default=noprint_wrappers=1:nokey=1")
            .arg(media_path)
            .stdin(Stdio::null())
            .output()
            .await
    }

    async fn run_ffmpeg_frame(&self, media_path: &Path, at: f64, output_path: &Path) -> io::Result<Output> {
        TokioCommand::new(&self.ffmpeg)
            .arg("-y")
            .arg("-loglevel").arg("error")
            .arg("-ss").arg(format!("{:.3}", at))
            .arg("-i").arg(media_path)
            .arg("-frames:v").arg("1")
            .arg("-q:v").arg("2")
            .arg(output_path)
            .stdin(Stdio::null())
            .output()
            .await
    }

    async fn run_ffmpeg_version(&self) -> io::Result<Output> {
        TokioCommand::new(&self.ffmpeg)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
    }
}
