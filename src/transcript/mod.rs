/// Transcript acquisition module
///
/// Turns a video id into timed transcript entries under a strict wall-clock
/// budget, falling through an ordered chain of caption-source strategies.
pub mod acquirer;
pub mod captions;
pub mod scrape;

pub use acquirer::{AcquirerConfig, TranscriptAcquirer};
pub use captions::{CaptionBackend, CaptionTrack, TimedTextClient};

use serde::{Deserialize, Serialize};

/// A single timed segment of spoken content
///
/// Entries are ordered by `start_seconds` ascending. Overlap is not
/// enforced; the last entry's end defines the video duration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptEntry {
    /// Spoken text for this segment
    pub text: String,
    /// Segment start offset from the beginning of the video
    pub start_seconds: f64,
    /// Segment length
    pub duration_seconds: f64,
}

impl TranscriptEntry {
    pub fn new(text: impl Into<String>, start_seconds: f64, duration_seconds: f64) -> Self {
        Self {
            text: text.into(),
            start_seconds,
            duration_seconds,
        }
    }

    /// End offset of this segment
    pub fn end_seconds(&self) -> f64 {
        self.start_seconds + self.duration_seconds
    }
}

/// Video duration in seconds, defined by the last entry's end
pub fn video_duration_seconds(entries: &[TranscriptEntry]) -> f64 {
    entries.last().map(|e| e.end_seconds()).unwrap_or(0.0)
}

/// Concatenated plain text of all entries, newline separated
pub fn plain_text(entries: &[TranscriptEntry]) -> String {
    entries
        .iter()
        .map(|e| e.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
