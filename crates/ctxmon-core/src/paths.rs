//! Locations of the files ctxmon keeps between runs.

use std::path::PathBuf;

const APP_DIR: &str = "ctxmon";
const CACHE_FILE: &str = "segment_cache.json";
const JOURNAL_FILE: &str = "analysis.ndjson";

/// Get the state directory
///
/// Prefers `$XDG_STATE_HOME/ctxmon` (or the platform equivalent), falling
/// back to a per-user directory under `/tmp`.
pub fn state_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        if !xdg.is_empty() {
            return PathBuf::from(xdg).join(APP_DIR);
        }
    }
    if let Some(dir) = dirs::state_dir() {
        return dir.join(APP_DIR);
    }
    let uid = unsafe { libc::getuid() };
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, uid))
}

/// Default path of the persisted segment cache
pub fn default_cache_file() -> PathBuf {
    state_dir().join(CACHE_FILE)
}

/// Default path of the analysis journal
pub fn default_journal_file() -> PathBuf {
    state_dir().join(JOURNAL_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_dir_honors_xdg_state_home() {
        temp_env::with_var("XDG_STATE_HOME", Some("/var/tmp/xdg-state"), || {
            assert_eq!(state_dir(), PathBuf::from("/var/tmp/xdg-state/ctxmon"));
            assert_eq!(
                default_cache_file(),
                PathBuf::from("/var/tmp/xdg-state/ctxmon/segment_cache.json")
            );
        });
    }

    #[test]
    fn test_state_dir_ignores_empty_xdg() {
        temp_env::with_var("XDG_STATE_HOME", Some(""), || {
            assert!(state_dir().ends_with("ctxmon") || state_dir().starts_with("/tmp"));
        });
    }
}
