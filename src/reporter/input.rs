//! Session JSON handed to the status line on stdin

use serde::Deserialize;
use std::io::Read;
use std::path::{Path, PathBuf};

use crate::daemon::api::UNKNOWN_SESSION;

/// Model shown when the input names none
pub const DEFAULT_MODEL: &str = "Claude";

#[derive(Debug, Default, Deserialize)]
pub struct ModelInfo {
    pub display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContextWindow {
    pub context_window_size: Option<u64>,
    pub used_percentage: Option<f64>,
}

/// Fields of the status-line input that ctxmon uses; the rest is ignored
#[derive(Debug, Default, Deserialize)]
pub struct StatusInput {
    pub session_id: Option<String>,
    pub transcript_path: Option<PathBuf>,
    pub model: Option<ModelInfo>,
    pub context_window: Option<ContextWindow>,
}

impl StatusInput {
    /// Parse input JSON; anything malformed reads as an empty object
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|e| {
            tracing::debug!("Ignoring malformed status input: {}", e);
            Self::default()
        })
    }

    /// Read and parse all of stdin
    pub fn from_stdin() -> Self {
        let mut raw = String::new();
        if let Err(e) = std::io::stdin().read_to_string(&mut raw) {
            tracing::debug!("Failed to read stdin: {}", e);
        }
        Self::parse(&raw)
    }

    pub fn model_name(&self) -> &str {
        self.model
            .as_ref()
            .and_then(|m| m.display_name.as_deref())
            .unwrap_or(DEFAULT_MODEL)
    }

    pub fn session(&self) -> &str {
        self.session_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_SESSION)
    }

    pub fn transcript(&self) -> Option<&Path> {
        self.transcript_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Context window size, or `fallback` when absent or zero
    pub fn window_size(&self, fallback: u64) -> u64 {
        self.context_window
            .as_ref()
            .and_then(|c| c.context_window_size)
            .filter(|&size| size > 0)
            .unwrap_or(fallback)
    }

    /// Usage percentage as reported by the assistant itself
    pub fn provided_pct(&self) -> Option<f64> {
        self.context_window
            .as_ref()
            .and_then(|c| c.used_percentage)
            .filter(|p| p.is_finite())
    }
}
