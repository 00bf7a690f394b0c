//! Domain layer - Jobs, frame plans and the decoding tool wrapper.

pub mod av;
pub mod jobs;
pub mod plan;
