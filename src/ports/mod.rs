//! Ports - Trait definitions for the pipeline's collaborators.

pub mod extractor;
pub mod notifier;
pub mod repository;
pub mod storage;
