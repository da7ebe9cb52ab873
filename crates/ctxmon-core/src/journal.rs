//! Append-only journal of analysis lifecycle events
//!
//! One JSON object per line, e.g.
//! `{"ts":"2026-01-01T10:00:00.000Z","event":"START","session":"abc","detail":"pct=55.0"}`.
//! Written for post-hoc debugging only; nothing in ctxmon reads it back.

use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Analysis lifecycle event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalEvent {
    /// Analysis claimed the in-flight slot
    Start,
    /// Extractor overran its bound and was terminated
    Timeout,
    /// Transcript unreadable or extractor exited unsuccessfully
    Error,
    /// Extractor finished; raw answer line
    Result,
    /// New segments written to the cache
    Cached,
    /// Extractor answer held no valid segment
    ParseFail,
    /// Extractor process could not be started
    SpawnError,
}

#[derive(Debug, Serialize)]
struct JournalRecord<'a> {
    ts: String,
    event: JournalEvent,
    session: &'a str,
    #[serde(skip_serializing_if = "is_blank")]
    detail: &'a str,
}

fn is_blank(detail: &&str) -> bool {
    detail.is_empty()
}

/// Journal writer with size-based rotation
pub struct AnalysisJournal {
    enabled: bool,
    max_size_bytes: u64,
    file_path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl AnalysisJournal {
    /// Open a journal appending to `file_path`
    pub fn new(file_path: impl Into<PathBuf>, max_size_bytes: u64) -> Self {
        let file_path = file_path.into();
        let writer = Self::open_writer(&file_path);
        Self {
            enabled: true,
            max_size_bytes,
            file_path,
            writer,
        }
    }

    /// A journal that drops every event
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_size_bytes: 0,
            file_path: PathBuf::new(),
            writer: None,
        }
    }

    /// Path of the active journal file
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Append one event for `session`
    pub fn record(&mut self, event: JournalEvent, session: &str, detail: &str) {
        if !self.enabled {
            return;
        }

        if self.writer.is_none() {
            self.writer = Self::open_writer(&self.file_path);
        }

        let writer = match self.writer.as_mut() {
            Some(w) => w,
            None => return,
        };

        let record = JournalRecord {
            ts: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            event,
            session,
            detail,
        };

        if let Ok(json) = serde_json::to_string(&record) {
            if writeln!(writer, "{}", json).is_ok() {
                let _ = writer.flush();
            } else {
                // Reopen on next call
                self.writer = None;
            }
        }

        self.maybe_rotate();
    }

    fn open_writer(file_path: &Path) -> Option<BufWriter<File>> {
        if let Some(dir) = file_path.parent() {
            if let Err(e) = fs::create_dir_all(dir) {
                tracing::warn!("Failed to create journal directory: {}", e);
                return None;
            }
        }

        match OpenOptions::new().create(true).append(true).open(file_path) {
            Ok(file) => Some(BufWriter::new(file)),
            Err(e) => {
                tracing::warn!("Failed to open analysis journal: {}", e);
                None
            }
        }
    }

    fn maybe_rotate(&mut self) {
        let metadata = match fs::metadata(&self.file_path) {
            Ok(m) => m,
            Err(_) => return,
        };

        if metadata.len() >= self.max_size_bytes {
            self.writer = None;
            let rotated = self.file_path.with_extension("ndjson.1");
            let _ = fs::rename(&self.file_path, &rotated);
            self.writer = Self::open_writer(&self.file_path);
        }
    }
}
