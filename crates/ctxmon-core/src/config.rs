//! Analysis tuning shared by the scheduler and the settings file.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for when and how topic analysis runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSettings {
    /// Usage percentage points that must accumulate before re-analyzing
    #[serde(default = "default_min_pct_delta")]
    pub min_pct_delta: f64,

    /// Minimum seconds between two analyses of the same session
    #[serde(default = "default_min_interval")]
    pub min_interval_secs: u64,

    /// Wall-clock bound for a single extractor run
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// How long a terminated extractor may take to exit before it is killed
    #[serde(default = "default_kill_grace")]
    pub kill_grace_secs: u64,

    /// Extractor executable
    #[serde(default = "default_command")]
    pub command: String,

    /// Arguments placed before the prompt
    #[serde(default = "default_args")]
    pub args: Vec<String>,

    /// Per-turn character cap when building the prompt
    #[serde(default = "default_max_turn_chars")]
    pub max_turn_chars: usize,
}

fn default_min_pct_delta() -> f64 {
    10.0
}

fn default_min_interval() -> u64 {
    60
}

fn default_timeout() -> u64 {
    120
}

fn default_kill_grace() -> u64 {
    5
}

fn default_command() -> String {
    "claude".to_string()
}

fn default_args() -> Vec<String> {
    vec!["--print".to_string(), "-p".to_string()]
}

fn default_max_turn_chars() -> usize {
    500
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            min_pct_delta: default_min_pct_delta(),
            min_interval_secs: default_min_interval(),
            timeout_secs: default_timeout(),
            kill_grace_secs: default_kill_grace(),
            command: default_command(),
            args: default_args(),
            max_turn_chars: default_max_turn_chars(),
        }
    }
}

impl AnalysisSettings {
    /// Cooldown between analyses in milliseconds
    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval_secs.saturating_mul(1000)
    }

    /// Extractor run timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Grace period between terminate and kill
    pub fn kill_grace(&self) -> Duration {
        Duration::from_secs(self.kill_grace_secs)
    }

    /// Clamp values that would disable the bounds they control
    pub fn validate(&mut self) {
        if self.timeout_secs == 0 {
            self.timeout_secs = 1;
        }
        if self.max_turn_chars == 0 {
            self.max_turn_chars = default_max_turn_chars();
        }
        if !self.min_pct_delta.is_finite() || self.min_pct_delta < 0.0 {
            self.min_pct_delta = default_min_pct_delta();
        }
    }
}
