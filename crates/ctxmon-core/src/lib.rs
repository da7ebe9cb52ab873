//! Core library for ctxmon
//!
//! Holds everything the background daemon needs to turn a conversation
//! transcript into cached topic segments: the transcript reader, the
//! extractor process wrapper, the segment cache and the analysis scheduler.

pub mod cache;
pub mod config;
pub mod error;
pub mod extractor;
pub mod journal;
pub mod paths;
pub mod prompt;
pub mod scheduler;
pub mod segments;
pub mod transcript;

pub use cache::{SegmentCache, SessionEntry};
pub use config::AnalysisSettings;
pub use error::AnalysisError;
pub use extractor::{CommandExtractor, ExtractionJob, ExtractionOutcome, Extractor};
pub use journal::{AnalysisJournal, JournalEvent};
pub use scheduler::Scheduler;
pub use segments::{parse_segment_line, Segment};
pub use transcript::{Role, TokenUsage, Turn};

/// Get current time in milliseconds since the Unix epoch
pub fn current_time_millis() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
