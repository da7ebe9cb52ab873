//! Best-effort client for the daemon's control endpoint

use serde::Deserialize;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use ctxmon_core::Segment;

/// Why a segment query produced nothing
#[derive(Debug)]
pub enum FetchError {
    /// Nothing is listening; the daemon should be started
    DaemonDown,
    /// Timeout, bad status or malformed body
    Failed(ureq::Error),
}

impl From<ureq::Error> for FetchError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Io(ref e) if e.kind() == std::io::ErrorKind::ConnectionRefused => {
                Self::DaemonDown
            }
            ureq::Error::ConnectionFailed => Self::DaemonDown,
            other => Self::Failed(other),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SegmentsBody {
    #[serde(default)]
    segments: Vec<Segment>,
}

/// HTTP client bound to the loopback daemon
pub struct DaemonClient {
    agent: ureq::Agent,
    base_url: String,
}

impl DaemonClient {
    /// Client for `127.0.0.1:<port>` with an overall per-request budget
    pub fn new(port: u16, timeout: Duration) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        Self {
            agent,
            base_url: format!("http://127.0.0.1:{}", port),
        }
    }

    /// Ask for the cached segments of a session
    ///
    /// Passing a transcript lets the daemon schedule a fresh analysis.
    pub fn fetch_segments(
        &self,
        session: &str,
        pct: f64,
        transcript: Option<&Path>,
    ) -> Result<Vec<Segment>, FetchError> {
        let transcript = transcript
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        let body: SegmentsBody = self
            .agent
            .get(format!("{}/segments", self.base_url))
            .query("session", session)
            .query("pct", pct.to_string())
            .query("transcript", transcript)
            .call()?
            .body_mut()
            .read_json()?;
        Ok(body.segments)
    }
}

/// Start `ctxmon daemon` in the background for the next render
///
/// The child gets its own process group and no stdio, so it outlives the
/// status line invocation.
pub fn spawn_daemon(config_path: Option<&Path>) -> std::io::Result<()> {
    let exe = std::env::current_exe()?;
    let mut cmd = Command::new(exe);
    if let Some(path) = config_path {
        cmd.arg("--config").arg(path);
    }
    cmd.arg("daemon")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let child = cmd.spawn()?;
    tracing::debug!(pid = child.id(), "Started daemon");
    Ok(())
}
