use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use ctxmon_core::paths;
use ctxmon_core::AnalysisSettings;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Context usage gauge for coding-assistant status lines")]
pub struct Config {
    /// Enable debug mode
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand (defaults to `status`)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Subcommands
#[derive(Subcommand, Debug, Clone, Default)]
pub enum Command {
    /// Print the status line for the session JSON on stdin
    #[default]
    Status,
    /// Run the background topic-analysis daemon
    Daemon {
        /// Port to listen on (loopback only)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

impl Config {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Check if running as the daemon
    pub fn is_daemon_mode(&self) -> bool {
        matches!(self.command, Some(Command::Daemon { .. }))
    }
}

/// Application settings (from config file)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Daemon settings
    #[serde(default)]
    pub daemon: DaemonSettings,

    /// Topic analysis settings
    #[serde(default)]
    pub analysis: AnalysisSettings,

    /// File locations
    #[serde(default)]
    pub paths: PathSettings,

    /// Status line settings
    #[serde(default)]
    pub reporter: ReporterSettings,
}

/// Daemon settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonSettings {
    /// Loopback port of the control endpoint
    #[serde(default = "default_port")]
    pub port: u16,

    /// Exit after this many seconds without a request
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// How often the idle check runs
    #[serde(default = "default_reap_interval")]
    pub reap_interval_secs: u64,
}

fn default_port() -> u16 {
    47523
}

fn default_idle_timeout() -> u64 {
    600
}

fn default_reap_interval() -> u64 {
    60
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            idle_timeout_secs: default_idle_timeout(),
            reap_interval_secs: default_reap_interval(),
        }
    }
}

impl DaemonSettings {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }
}

/// File locations (defaults live under the state directory)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathSettings {
    /// Segment cache file
    #[serde(default)]
    pub cache_file: Option<PathBuf>,

    /// Analysis journal file
    #[serde(default)]
    pub journal_file: Option<PathBuf>,

    /// Journal size that triggers rotation
    #[serde(default = "default_journal_max_bytes")]
    pub journal_max_bytes: u64,
}

/// Default journal max size (1MB)
fn default_journal_max_bytes() -> u64 {
    1_048_576
}

impl Default for PathSettings {
    fn default() -> Self {
        Self {
            cache_file: None,
            journal_file: None,
            journal_max_bytes: default_journal_max_bytes(),
        }
    }
}

impl PathSettings {
    /// Resolved segment cache path
    pub fn cache_file(&self) -> PathBuf {
        self.cache_file
            .clone()
            .unwrap_or_else(paths::default_cache_file)
    }

    /// Resolved journal path
    pub fn journal_file(&self) -> PathBuf {
        self.journal_file
            .clone()
            .unwrap_or_else(paths::default_journal_file)
    }
}

/// Status line settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReporterSettings {
    /// Overall budget for the daemon query in milliseconds
    #[serde(default = "default_reporter_timeout")]
    pub timeout_ms: u64,

    /// Width of the segment bar in cells
    #[serde(default = "default_bar_width")]
    pub bar_width: usize,

    /// Context window size assumed when the input does not say
    #[serde(default = "default_context_window")]
    pub default_context_window: u64,
}

fn default_reporter_timeout() -> u64 {
    80
}

fn default_bar_width() -> usize {
    20
}

fn default_context_window() -> u64 {
    200_000
}

impl Default for ReporterSettings {
    fn default() -> Self {
        Self {
            timeout_ms: default_reporter_timeout(),
            bar_width: default_bar_width(),
            default_context_window: default_context_window(),
        }
    }
}

impl ReporterSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Settings {
    /// Load settings from config file or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        // Try custom path first
        if let Some(p) = path {
            if p.exists() {
                let content = std::fs::read_to_string(p)
                    .with_context(|| format!("Failed to read config file: {:?}", p))?;
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", p));
            }
        }

        // Try default config locations
        let default_paths = [
            dirs::config_dir().map(|p| p.join("ctxmon/config.toml")),
            dirs::home_dir().map(|p| p.join(".config/ctxmon/config.toml")),
            dirs::home_dir().map(|p| p.join(".ctxmon.toml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {:?}", path))?;
                return toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config file: {:?}", path));
            }
        }

        // Return defaults if no config file found
        Ok(Self::default())
    }

    /// Merge CLI config into settings (CLI takes precedence)
    pub fn merge_cli(&mut self, cli: &Config) {
        if let Some(Command::Daemon { port: Some(port) }) = cli.command {
            self.daemon.port = port;
        }
    }

    /// Validate and normalize settings values
    ///
    /// Zero intervals would spin the reaper or disable the bounds they control.
    pub fn validate(&mut self) {
        const MIN_REAP_INTERVAL: u64 = 1;
        const MIN_REPORTER_TIMEOUT: u64 = 10;

        if self.daemon.reap_interval_secs < MIN_REAP_INTERVAL {
            self.daemon.reap_interval_secs = MIN_REAP_INTERVAL;
        }
        if self.daemon.idle_timeout_secs == 0 {
            self.daemon.idle_timeout_secs = default_idle_timeout();
        }
        if self.reporter.timeout_ms < MIN_REPORTER_TIMEOUT {
            self.reporter.timeout_ms = MIN_REPORTER_TIMEOUT;
        }
        if self.reporter.bar_width == 0 {
            self.reporter.bar_width = default_bar_width();
        }
        if self.reporter.default_context_window == 0 {
            self.reporter.default_context_window = default_context_window();
        }
        self.analysis.validate();
    }
}
