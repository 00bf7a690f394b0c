//! Frame plan: which frames a job extracts, and what they are called.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Minimum number of digits in a frame filename index.
pub const FRAME_INDEX_WIDTH: usize = 6;

/// Largest plan ever built: a day of video at over 100 fps.
pub const MAX_PLANNED_FRAMES: usize = 10_000_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlannedFrame {
    pub index: usize,
    /// Seek offset into the source, in seconds
    pub timestamp: f64,
}

/// Ordered (index, timestamp) targets derived from duration × frame rate.
#[derive(Debug, Clone)]
pub struct FramePlan {
    frames: Vec<PlannedFrame>,
    width: usize,
}

impl FramePlan {
    /// `floor(duration) × rate` frames, frame `i` at `i / rate` seconds.
    ///
    /// `None` when the frame count overflows or exceeds [`MAX_PLANNED_FRAMES`].
    pub fn new(duration_secs: u64, frame_rate: u32) -> Option<Self> {
        let count = usize::try_from(duration_secs)
            .ok()?
            .checked_mul(usize::try_from(frame_rate).ok()?)
            .filter(|&count| count <= MAX_PLANNED_FRAMES)?;
        let rate = f64::from(frame_rate);
        let frames = (0..count)
            .map(|index| PlannedFrame {
                index,
                timestamp: index as f64 / rate,
            })
            .collect();

        let digits = count.saturating_sub(1).to_string().len();
        Some(Self {
            frames,
            width: digits.max(FRAME_INDEX_WIDTH),
        })
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlannedFrame> {
        self.frames.iter()
    }

    /// Zero-padded frame name, e.g. `frame_000042.jpg`.
    pub fn filename(&self, index: usize, extension: &str) -> String {
        format!("frame_{:0width$}.{}", index, extension, width = self.width)
    }
}

/// Filesystem-safe directory name derived from the source file stem.
pub fn safe_stem(source: &Path) -> String {
    static UNSAFE: OnceLock<Regex> = OnceLock::new();
    let re = UNSAFE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_-]").expect("static regex"));

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let cleaned = re.replace_all(&stem, "_").into_owned();
    if cleaned.is_empty() {
        String::from("video")
    } else {
        cleaned
    }
}
