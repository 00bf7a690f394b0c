//! Local adapters for single-process deployment.

pub mod fs;
pub mod memory;

pub use fs::FsArtifactStore;
pub use memory::{MemoryVideoStore, VideoRecord};
