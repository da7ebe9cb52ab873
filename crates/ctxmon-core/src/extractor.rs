//! Topic extractor processes
//!
//! An extraction is an out-of-process call: the prompt goes in as the last
//! argument, stdin is closed, and stdout/stderr are captured. Launching
//! returns an [`ExtractionJob`], which yields a single completion event and
//! carries a [`JobControl`] for asking the process to stop.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, oneshot};

/// How long to keep draining pipes after the process has exited
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Result of a finished extractor process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionOutcome {
    /// Exit code; `None` when killed by a signal or the wait itself failed
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ExtractionOutcome {
    /// Successful exit with the given output
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Whether the process exited with status 0
    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Human-readable exit status
    pub fn status_text(&self) -> String {
        match self.code {
            Some(code) => format!("exit code {}", code),
            None => "signal".to_string(),
        }
    }
}

/// Stop request delivered to a running extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    /// Polite termination (SIGTERM)
    Terminate,
    /// Forced kill (SIGKILL)
    Kill,
}

/// Cloneable handle for stopping a running extraction
#[derive(Debug, Clone)]
pub struct JobControl {
    tx: mpsc::UnboundedSender<StopSignal>,
}

impl JobControl {
    /// Ask the extraction to terminate; false if it already finished
    pub fn terminate(&self) -> bool {
        self.tx.send(StopSignal::Terminate).is_ok()
    }

    /// Force the extraction to stop; false if it already finished
    pub fn kill(&self) -> bool {
        self.tx.send(StopSignal::Kill).is_ok()
    }
}

/// Extractor-side ends of a job: where to report completion and where
/// stop requests arrive
pub struct JobEnds {
    pub completion: oneshot::Sender<ExtractionOutcome>,
    pub signals: mpsc::UnboundedReceiver<StopSignal>,
}

/// A launched extraction
pub struct ExtractionJob {
    pid: Option<u32>,
    completion: oneshot::Receiver<ExtractionOutcome>,
    control: JobControl,
}

impl ExtractionJob {
    /// Create a job together with the ends the extractor drives
    pub fn channel(pid: Option<u32>) -> (Self, JobEnds) {
        let (completion_tx, completion_rx) = oneshot::channel();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        (
            Self {
                pid,
                completion: completion_rx,
                control: JobControl { tx: signal_tx },
            },
            JobEnds {
                completion: completion_tx,
                signals: signal_rx,
            },
        )
    }

    /// OS process id, when the job is backed by a process
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Handle for stopping this job
    pub fn control(&self) -> JobControl {
        self.control.clone()
    }

    /// Wait for the completion event
    ///
    /// Cancel-safe: may be awaited again after a timeout. If the extractor
    /// side vanished without reporting, an outcome with no exit code is
    /// returned.
    pub async fn wait(&mut self) -> ExtractionOutcome {
        match (&mut self.completion).await {
            Ok(outcome) => outcome,
            Err(_) => ExtractionOutcome {
                code: None,
                stdout: String::new(),
                stderr: "extractor dropped without reporting".to_string(),
            },
        }
    }
}

/// Something that can turn a prompt into a running extraction
pub trait Extractor: Send + Sync + 'static {
    /// Start an extraction for `prompt`.
    ///
    /// Must be called from within a tokio runtime. An error means nothing
    /// was started.
    fn launch(&self, prompt: &str) -> std::io::Result<ExtractionJob>;
}

/// Extractor backed by an external CLI (by default `claude --print -p`)
pub struct CommandExtractor {
    command: String,
    args: Vec<String>,
}

impl CommandExtractor {
    /// Create an extractor that runs `command args... <prompt>`
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

impl Extractor for CommandExtractor {
    fn launch(&self, prompt: &str) -> std::io::Result<ExtractionJob> {
        let mut cmd = tokio::process::Command::new(&self.command);
        cmd.args(&self.args)
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group, so signals reach the whole extractor tree
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn()?;
        let pid = child.id();
        tracing::debug!(pid = ?pid, command = %self.command, "Extractor spawned");

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let (job, ends) = ExtractionJob::channel(pid);
        tokio::spawn(drive_child(child, pid, stdout, stderr, ends));
        Ok(job)
    }
}

/// Wait for the child while honoring stop requests, then report
async fn drive_child(
    mut child: tokio::process::Child,
    pid: Option<u32>,
    stdout: Option<tokio::process::ChildStdout>,
    stderr: Option<tokio::process::ChildStderr>,
    ends: JobEnds,
) {
    let JobEnds {
        completion,
        mut signals,
    } = ends;

    let stdout_task = tokio::spawn(read_pipe(stdout));
    let stderr_task = tokio::spawn(read_pipe(stderr));

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(signal) = signals.recv() => signal_group(pid, signal),
        }
    };

    let stdout = drain(stdout_task).await;
    let stderr = drain(stderr_task).await;

    let outcome = match status {
        Ok(status) => ExtractionOutcome {
            code: status.code(),
            stdout,
            stderr,
        },
        Err(e) => ExtractionOutcome {
            code: None,
            stdout,
            stderr: format!("wait failed: {}", e),
        },
    };

    if !outcome.stderr.trim().is_empty() {
        tracing::debug!(pid = ?pid, "Extractor stderr: {}", outcome.stderr.trim());
    }
    let _ = completion.send(outcome);
}

async fn read_pipe<R: AsyncRead + Unpin>(pipe: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    String::from_utf8_lossy(&buf).into_owned()
}

async fn drain(task: tokio::task::JoinHandle<String>) -> String {
    match tokio::time::timeout(PIPE_DRAIN_TIMEOUT, task).await {
        Ok(Ok(text)) => text,
        _ => String::new(),
    }
}

#[cfg(unix)]
fn signal_group(pid: Option<u32>, signal: StopSignal) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Some(pid) = pid else { return };
    let sig = match signal {
        StopSignal::Terminate => Signal::SIGTERM,
        StopSignal::Kill => Signal::SIGKILL,
    };
    if let Err(e) = killpg(Pid::from_raw(pid as i32), sig) {
        tracing::debug!(pid, "Failed to signal extractor group: {}", e);
    }
}

#[cfg(not(unix))]
fn signal_group(_pid: Option<u32>, _signal: StopSignal) {}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandExtractor {
        CommandExtractor::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        // The prompt lands in $0 for `sh -c`
        let mut job = sh("echo thinking; echo \"$0 40%|free 60%\"")
            .launch("topic")
            .unwrap();
        assert!(job.pid().is_some());

        let outcome = job.wait().await;
        assert!(outcome.is_success());
        assert_eq!(outcome.stdout, "thinking\ntopic 40%|free 60%\n");
    }

    #[tokio::test]
    async fn test_nonzero_exit() {
        let mut job = sh("echo oops >&2; exit 3").launch("p").unwrap();
        let outcome = job.wait().await;
        assert_eq!(outcome.code, Some(3));
        assert_eq!(outcome.stderr.trim(), "oops");
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_stdin_is_closed() {
        let mut job = sh("cat; echo done").launch("p").unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(5), job.wait())
            .await
            .unwrap();
        assert_eq!(outcome.stdout.trim(), "done");
    }

    #[tokio::test]
    async fn test_terminate_stops_process() {
        let mut job = sh("sleep 30").launch("p").unwrap();
        assert!(job.control().terminate());

        let outcome = tokio::time::timeout(Duration::from_secs(5), job.wait())
            .await
            .unwrap();
        assert_eq!(outcome.code, None);
        assert_eq!(outcome.status_text(), "signal");
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let extractor = CommandExtractor::new("/nonexistent/ctxmon-extractor", Vec::new());
        assert!(extractor.launch("p").is_err());
    }
}
