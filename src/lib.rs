//! Framepipe - Video frame extraction pipeline
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (jobs, frame plan, ffmpeg wrapper)
//! - ports/: Trait definitions
//! - adapters/: Concrete implementations (local store, HTTP services)
//! - application/: Processing job, work queue and orchestrator
//! - config: Environment configuration

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;

// Re-exports for convenience
pub use application::{JobHandle, OrchestratorService, QueueStatus, WorkQueue, WorkerService};
pub use config::{PipelineConfig, QueueConfig, ServerConfig};
pub use domain::av;
pub use error::{BoxError, FrameError, JobError};
