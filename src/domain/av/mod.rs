//! Wrapper around the external decoding tool (ffmpeg/ffprobe).

pub mod cmd;
pub mod extractor;

pub use cmd::{DecoderCommands, SystemDecoder};
pub use extractor::FfmpegExtractor;
