//! Failure taxonomy for a single analysis attempt.

use std::path::PathBuf;

use crate::journal::JournalEvent;

/// Why an analysis attempt produced no new segments
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    /// The transcript could not be read; nothing was spawned
    #[error("failed to read transcript {path:?}: {source}")]
    TranscriptUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The extractor process could not be started
    #[error("failed to spawn extractor: {0}")]
    Spawn(#[source] std::io::Error),

    /// The extractor exited unsuccessfully
    #[error("extractor exited with {status}: {stderr}")]
    Exit { status: String, stderr: String },

    /// The extractor succeeded but printed no usable segment
    #[error("no segments in extractor output: {last_line:?}")]
    ParseFail { last_line: String },

    /// The extractor overran its time bound and was terminated
    #[error("extractor timed out after {secs}s")]
    Timeout { secs: u64 },
}

impl AnalysisError {
    /// Journal event recorded for this failure
    pub fn journal_event(&self) -> JournalEvent {
        match self {
            Self::TranscriptUnreadable { .. } | Self::Exit { .. } => JournalEvent::Error,
            Self::Spawn(_) => JournalEvent::SpawnError,
            Self::ParseFail { .. } => JournalEvent::ParseFail,
            Self::Timeout { .. } => JournalEvent::Timeout,
        }
    }
}
