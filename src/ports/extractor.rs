use crate::error::FrameError;
use async_trait::async_trait;
use std::path::Path;

#[async_trait]
pub trait FrameExtractor: Send + Sync {
    /// Duration of the source in whole seconds. Never fails: a probe that
    /// cannot resolve falls back to the configured default.
    async fn probe_duration(&self, source: &Path) -> u64;

    /// Write the frame at `at` seconds to `output` and return its bytes.
    async fn extract_frame(
        &self,
        source: &Path,
        at: f64,
        output: &Path,
    ) -> Result<Vec<u8>, FrameError>;

    /// Whether the decoding tool can be invoked at all.
    async fn check_availability(&self) -> bool;
}
