//! Persisted segment cache
//!
//! Maps session id to the last segmentation computed for it. The file is
//! loaded once at daemon start and rewritten after every successful
//! analysis. It is a cache, not a database: a missing or corrupt file just
//! means starting empty.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::segments::Segment;

/// Last analysis result for one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEntry {
    /// Usage percentage at which the segments were computed
    #[serde(default)]
    pub last_pct: f64,
    /// When the segments were computed (Unix millis)
    #[serde(default)]
    pub last_time: u64,
    /// Segments in the order the extractor emitted them
    #[serde(default)]
    pub segments: Vec<Segment>,
}

/// File-backed map from session id to [`SessionEntry`]
#[derive(Debug)]
pub struct SegmentCache {
    path: PathBuf,
    entries: BTreeMap<String, SessionEntry>,
}

impl SegmentCache {
    /// Create an empty cache that persists to `path`
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Load the cache from `path`
    ///
    /// Never fails: an unreadable or unparsable file yields an empty cache,
    /// and individual malformed entries are skipped.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match Self::read_entries(&path) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("Starting with empty segment cache: {:#}", e);
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    fn read_entries(path: &Path) -> Result<BTreeMap<String, SessionEntry>> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read segment cache: {:?}", path))?;
        let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse segment cache: {:?}", path))?;

        let mut entries = BTreeMap::new();
        for (session_id, value) in raw {
            match serde_json::from_value::<SessionEntry>(value) {
                Ok(entry) => {
                    entries.insert(session_id, entry);
                }
                Err(e) => {
                    tracing::warn!(session = %session_id, "Dropping malformed cache entry: {}", e);
                }
            }
        }
        Ok(entries)
    }

    /// Path the cache persists to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up the entry for a session
    pub fn get(&self, session_id: &str) -> Option<&SessionEntry> {
        self.entries.get(session_id)
    }

    /// Number of cached sessions
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace the entry for a session and persist the cache
    pub fn put(&mut self, session_id: impl Into<String>, entry: SessionEntry) {
        self.entries.insert(session_id.into(), entry);
        self.save();
    }

    /// Persist the cache, logging (not returning) any failure
    pub fn save(&self) {
        if let Err(e) = self.write() {
            tracing::warn!("Failed to save segment cache: {:#}", e);
        }
    }

    /// Write the cache atomically via a temp file and rename
    fn write(&self) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create cache directory: {:?}", dir))?;
            }
        }

        let json =
            serde_json::to_string_pretty(&self.entries).context("Failed to serialize cache")?;

        let temp_path = self.path.with_extension("tmp");
        let _ = fs::remove_file(&temp_path);

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&temp_path)
            .with_context(|| format!("Failed to create temp cache file: {:?}", temp_path))?;

        file.write_all(json.as_bytes())
            .with_context(|| format!("Failed to write temp cache file: {:?}", temp_path))?;

        file.sync_all()
            .with_context(|| format!("Failed to sync temp cache file: {:?}", temp_path))?;

        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to rename cache file: {:?}", self.path))?;

        Ok(())
    }
}
