//! Application layer - The processing job, the work queue and the entry point tying them together.

pub mod orchestrator;
pub mod queue;
pub mod worker;

pub use orchestrator::{JobHandle, OrchestratorService};
pub use queue::{JobRunner, QueueEvent, QueueStatus, WorkQueue};
pub use worker::WorkerService;
