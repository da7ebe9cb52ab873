//! Analysis scheduler
//!
//! Decides whether a request warrants a fresh topic analysis, runs at most
//! one analysis at a time across the whole process, bounds its runtime, and
//! publishes results into the segment cache.
//!
//! The single in-flight slot is global, not per session: while one session
//! is being analyzed, requests for every other session are served from the
//! cache and skipped for this round.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::cache::{SegmentCache, SessionEntry};
use crate::config::AnalysisSettings;
use crate::current_time_millis;
use crate::error::AnalysisError;
use crate::extractor::{ExtractionJob, ExtractionOutcome, Extractor, JobControl};
use crate::journal::{AnalysisJournal, JournalEvent};
use crate::prompt::build_prompt;
use crate::segments::{last_line, parse_segment_line, Segment};
use crate::transcript;

/// The analysis currently holding the in-flight slot
struct Flight {
    /// Identity token; a stale timer or completion carries an older one
    generation: u64,
    session_id: String,
    started: Instant,
    /// Stop handle; `None` only while the extractor is being launched
    control: Option<JobControl>,
}

struct SchedulerState {
    cache: SegmentCache,
    flight: Option<Flight>,
    next_generation: u64,
}

/// Cached segments for a session plus the process-wide pending flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSnapshot {
    pub segments: Vec<Segment>,
    pub pending: bool,
}

/// Whether an entry is stale enough to analyze again.
///
/// A session without an entry is always analyzed. Otherwise both the usage
/// growth and the cooldown must have been reached.
pub fn needs_refresh(
    entry: Option<&SessionEntry>,
    pct: f64,
    now_ms: u64,
    settings: &AnalysisSettings,
) -> bool {
    let entry = match entry {
        Some(e) => e,
        None => return true,
    };
    let pct_delta = pct - entry.last_pct;
    let elapsed_ms = now_ms.saturating_sub(entry.last_time);
    pct_delta >= settings.min_pct_delta && elapsed_ms >= settings.min_interval_ms()
}

/// Single-flight analysis scheduler owning the segment cache
pub struct Scheduler {
    state: Mutex<SchedulerState>,
    journal: Mutex<AnalysisJournal>,
    extractor: Box<dyn Extractor>,
    settings: AnalysisSettings,
    timeout: Duration,
    kill_grace: Duration,
}

impl Scheduler {
    /// Create a scheduler over a loaded cache
    pub fn new(
        cache: SegmentCache,
        journal: AnalysisJournal,
        extractor: Box<dyn Extractor>,
        settings: AnalysisSettings,
    ) -> Arc<Self> {
        let timeout = settings.timeout();
        let kill_grace = settings.kill_grace();
        Self::with_time_bounds(cache, journal, extractor, settings, timeout, kill_grace)
    }

    /// Override the run timeout and kill grace period
    pub fn with_time_bounds(
        cache: SegmentCache,
        journal: AnalysisJournal,
        extractor: Box<dyn Extractor>,
        settings: AnalysisSettings,
        timeout: Duration,
        kill_grace: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            timeout,
            kill_grace,
            state: Mutex::new(SchedulerState {
                cache,
                flight: None,
                next_generation: 1,
            }),
            journal: Mutex::new(journal),
            extractor,
            settings,
        })
    }

    /// Whether an analysis is currently running (any session)
    pub fn is_pending(&self) -> bool {
        self.state.lock().flight.is_some()
    }

    /// Session whose analysis is currently running
    pub fn in_flight_session(&self) -> Option<String> {
        self.state
            .lock()
            .flight
            .as_ref()
            .map(|f| f.session_id.clone())
    }

    /// Cached entry for a session
    pub fn entry(&self, session_id: &str) -> Option<SessionEntry> {
        self.state.lock().cache.get(session_id).cloned()
    }

    /// Cached segments for a session and the pending flag, read together
    pub fn snapshot(&self, session_id: &str) -> SegmentSnapshot {
        let state = self.state.lock();
        SegmentSnapshot {
            segments: state
                .cache
                .get(session_id)
                .map(|e| e.segments.clone())
                .unwrap_or_default(),
            pending: state.flight.is_some(),
        }
    }

    /// Decide whether a new analysis should start for `session_id`
    pub fn should_analyze(&self, session_id: &str, pct: f64) -> bool {
        let state = self.state.lock();
        if state.flight.is_some() {
            return false;
        }
        needs_refresh(
            state.cache.get(session_id),
            pct,
            current_time_millis(),
            &self.settings,
        )
    }

    /// Start an analysis if one is warranted; never waits for it.
    ///
    /// Reading the transcript and launching the extractor happen before
    /// returning; the extractor itself runs on a background task.
    pub fn maybe_analyze(self: &Arc<Self>, session_id: &str, transcript: &Path, pct: f64) {
        if self.should_analyze(session_id, pct) {
            self.run_analysis(session_id, transcript, pct);
        }
    }

    /// Run an analysis unless one is already in flight
    pub fn run_analysis(self: &Arc<Self>, session_id: &str, transcript_path: &Path, pct: f64) {
        let generation = match self.claim(session_id) {
            Some(g) => g,
            None => return,
        };

        tracing::info!(session = %session_id, pct, "Starting topic analysis");
        self.record(
            JournalEvent::Start,
            session_id,
            &format!("pct={:.1} transcript={}", pct, transcript_path.display()),
        );

        let turns = match transcript::read_turns(transcript_path) {
            Ok(turns) => turns,
            Err(source) => {
                let err = AnalysisError::TranscriptUnreadable {
                    path: transcript_path.to_path_buf(),
                    source,
                };
                self.finish(generation, session_id, pct, Err(err));
                return;
            }
        };

        let prompt = build_prompt(&turns, pct, self.settings.max_turn_chars);
        let job = match self.extractor.launch(&prompt) {
            Ok(job) => job,
            Err(e) => {
                self.finish(generation, session_id, pct, Err(AnalysisError::Spawn(e)));
                return;
            }
        };

        self.attach(generation, job.control());

        let scheduler = Arc::clone(self);
        let session_id = session_id.to_string();
        tokio::spawn(async move {
            scheduler.supervise(generation, session_id, pct, job).await;
        });
    }

    /// Ask the running extractor, if any, to stop
    pub fn shutdown(&self) {
        let state = self.state.lock();
        if let Some(control) = state.flight.as_ref().and_then(|f| f.control.as_ref()) {
            tracing::info!("Terminating in-flight analysis for shutdown");
            control.terminate();
        }
    }

    /// Take the in-flight slot, returning its generation
    fn claim(&self, session_id: &str) -> Option<u64> {
        let mut state = self.state.lock();
        if state.flight.is_some() {
            return None;
        }
        let generation = state.next_generation;
        state.next_generation += 1;
        state.flight = Some(Flight {
            generation,
            session_id: session_id.to_string(),
            started: Instant::now(),
            control: None,
        });
        Some(generation)
    }

    fn attach(&self, generation: u64, control: JobControl) {
        let mut state = self.state.lock();
        if let Some(flight) = state.flight.as_mut() {
            if flight.generation == generation {
                flight.control = Some(control);
            }
        }
    }

    /// Wait for the job under the time bound, then publish the outcome
    async fn supervise(
        self: Arc<Self>,
        generation: u64,
        session_id: String,
        pct: f64,
        mut job: ExtractionJob,
    ) {
        let result = match tokio::time::timeout(self.timeout, job.wait()).await {
            Ok(outcome) => self.evaluate(&session_id, outcome),
            Err(_) => {
                self.expire(generation, &session_id);
                self.reap(&mut job).await;
                Err(AnalysisError::Timeout {
                    secs: self.timeout.as_secs(),
                })
            }
        };
        self.finish(generation, &session_id, pct, result);
    }

    /// Send the termination request if `generation` still owns the slot
    fn expire(&self, generation: u64, session_id: &str) {
        let control = {
            let state = self.state.lock();
            match state.flight.as_ref() {
                Some(f) if f.generation == generation => f.control.clone(),
                _ => None,
            }
        };

        if let Some(control) = control {
            tracing::warn!(
                session = %session_id,
                timeout_secs = self.timeout.as_secs(),
                "Topic analysis timed out, terminating extractor"
            );
            self.record(
                JournalEvent::Timeout,
                session_id,
                &format!("after {}s", self.timeout.as_secs()),
            );
            control.terminate();
        }
    }

    /// Give a terminated job the grace period to exit, then kill it
    async fn reap(&self, job: &mut ExtractionJob) {
        if tokio::time::timeout(self.kill_grace, job.wait()).await.is_ok() {
            return;
        }
        tracing::warn!(pid = ?job.pid(), "Extractor ignored termination, killing");
        job.control().kill();
        let _ = tokio::time::timeout(self.kill_grace, job.wait()).await;
    }

    /// Turn a finished process into segments
    fn evaluate(
        &self,
        session_id: &str,
        outcome: ExtractionOutcome,
    ) -> Result<Vec<Segment>, AnalysisError> {
        if !outcome.is_success() {
            return Err(AnalysisError::Exit {
                status: outcome.status_text(),
                stderr: outcome.stderr.trim().to_string(),
            });
        }

        let line = last_line(&outcome.stdout);
        self.record(JournalEvent::Result, session_id, line);

        let segments = parse_segment_line(&outcome.stdout);
        if segments.is_empty() {
            return Err(AnalysisError::ParseFail {
                last_line: line.to_string(),
            });
        }
        Ok(segments)
    }

    /// Release the slot and, on success, replace the session's entry
    fn finish(
        &self,
        generation: u64,
        session_id: &str,
        pct: f64,
        result: Result<Vec<Segment>, AnalysisError>,
    ) {
        let elapsed_ms = {
            let mut state = self.state.lock();
            let elapsed_ms = match state.flight.as_ref() {
                Some(f) if f.generation == generation => f.started.elapsed().as_millis() as u64,
                _ => {
                    tracing::debug!(generation, "Ignoring completion of stale analysis");
                    return;
                }
            };
            state.flight = None;

            if let Ok(segments) = &result {
                state.cache.put(
                    session_id,
                    SessionEntry {
                        last_pct: pct,
                        last_time: current_time_millis(),
                        segments: segments.clone(),
                    },
                );
            }
            elapsed_ms
        };

        match result {
            Ok(segments) => {
                let summary = segments
                    .iter()
                    .map(|s| format!("{} {}%", s.name, s.pct))
                    .collect::<Vec<_>>()
                    .join("|");
                tracing::info!(
                    session = %session_id,
                    segments = segments.len(),
                    elapsed_ms,
                    "Topic analysis cached"
                );
                self.record(JournalEvent::Cached, session_id, &summary);
            }
            Err(err) => {
                tracing::warn!(session = %session_id, elapsed_ms, "Topic analysis failed: {}", err);
                // Timeouts are journaled when the termination is sent
                if !matches!(err, AnalysisError::Timeout { .. }) {
                    self.record(err.journal_event(), session_id, &err.to_string());
                }
            }
        }
    }

    fn record(&self, event: JournalEvent, session_id: &str, detail: &str) {
        self.journal.lock().record(event, session_id, detail);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{JobEnds, StopSignal};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// How a fake job reacts once launched
    #[derive(Clone, Copy)]
    enum Behavior {
        /// Report the outcome when released by the test
        Manual,
        /// Never finish on its own; exit on Terminate
        HangUntilTerminated,
        /// Never finish on its own; ignore Terminate, exit on Kill
        IgnoreTerminate,
    }

    #[derive(Default)]
    struct Counters {
        launches: AtomicUsize,
        terminates: AtomicUsize,
        kills: AtomicUsize,
    }

    struct FakeExtractor {
        behavior: Behavior,
        fail_spawn: bool,
        counters: Arc<Counters>,
        pending: Arc<Mutex<Vec<(String, CompletionTx)>>>,
    }

    type CompletionTx = tokio::sync::oneshot::Sender<ExtractionOutcome>;

    impl FakeExtractor {
        fn new(behavior: Behavior) -> Self {
            Self {
                behavior,
                fail_spawn: false,
                counters: Arc::new(Counters::default()),
                pending: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Complete the oldest manual job with `outcome`
        fn release(pending: &Mutex<Vec<(String, CompletionTx)>>, outcome: ExtractionOutcome) {
            let (_, tx) = pending.lock().remove(0);
            let _ = tx.send(outcome);
        }
    }

    impl Extractor for FakeExtractor {
        fn launch(&self, prompt: &str) -> std::io::Result<ExtractionJob> {
            if self.fail_spawn {
                return Err(std::io::Error::from(std::io::ErrorKind::NotFound));
            }
            self.counters.launches.fetch_add(1, Ordering::SeqCst);
            let (job, ends) = ExtractionJob::channel(None);
            let JobEnds {
                completion,
                mut signals,
            } = ends;

            match self.behavior {
                Behavior::Manual => {
                    self.pending.lock().push((prompt.to_string(), completion));
                    // Keep the signal receiver alive without acting on it
                    tokio::spawn(async move { while signals.recv().await.is_some() {} });
                }
                Behavior::HangUntilTerminated | Behavior::IgnoreTerminate => {
                    let behavior = self.behavior;
                    let counters = self.counters.clone();
                    tokio::spawn(async move {
                        while let Some(signal) = signals.recv().await {
                            match signal {
                                StopSignal::Terminate => {
                                    counters.terminates.fetch_add(1, Ordering::SeqCst);
                                    if matches!(behavior, Behavior::HangUntilTerminated) {
                                        break;
                                    }
                                }
                                StopSignal::Kill => {
                                    counters.kills.fetch_add(1, Ordering::SeqCst);
                                    break;
                                }
                            }
                        }
                        let _ = completion.send(ExtractionOutcome {
                            code: None,
                            stdout: String::new(),
                            stderr: String::new(),
                        });
                    });
                }
            }
            Ok(job)
        }
    }

    struct Fixture {
        scheduler: Arc<Scheduler>,
        counters: Arc<Counters>,
        pending: Arc<Mutex<Vec<(String, CompletionTx)>>>,
        transcript: std::path::PathBuf,
        cache_path: std::path::PathBuf,
        journal_path: std::path::PathBuf,
        _dir: tempfile::TempDir,
    }

    fn fixture_with(extractor: FakeExtractor, timeout: Duration, grace: Duration) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let transcript = dir.path().join("transcript.jsonl");
        std::fs::write(
            &transcript,
            "{\"message\":{\"role\":\"user\",\"content\":\"design the cache\"}}\n",
        )
        .unwrap();
        let cache_path = dir.path().join("cache.json");
        let journal_path = dir.path().join("analysis.ndjson");

        let counters = extractor.counters.clone();
        let pending = extractor.pending.clone();
        let scheduler = Scheduler::with_time_bounds(
            SegmentCache::load(&cache_path),
            AnalysisJournal::new(&journal_path, 1_048_576),
            Box::new(extractor),
            AnalysisSettings::default(),
            timeout,
            grace,
        );
        Fixture {
            scheduler,
            counters,
            pending,
            transcript,
            cache_path,
            journal_path,
            _dir: dir,
        }
    }

    fn fixture(behavior: Behavior) -> Fixture {
        fixture_with(
            FakeExtractor::new(behavior),
            Duration::from_secs(30),
            Duration::from_secs(1),
        )
    }

    impl Fixture {
        fn journal_events(&self) -> Vec<String> {
            std::fs::read_to_string(&self.journal_path)
                .unwrap_or_default()
                .lines()
                .map(|l| {
                    let v: serde_json::Value = serde_json::from_str(l).unwrap();
                    v["event"].as_str().unwrap().to_string()
                })
                .collect()
        }
    }

    async fn wait_until_idle(scheduler: &Scheduler) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while scheduler.is_pending() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("analysis did not finish");
    }

    fn entry(pct: f64, time: u64) -> SessionEntry {
        SessionEntry {
            last_pct: pct,
            last_time: time,
            segments: vec![Segment::new("old topic", 100)],
        }
    }

    #[test]
    fn test_needs_refresh_first_analysis() {
        let settings = AnalysisSettings::default();
        assert!(needs_refresh(None, 0.0, 0, &settings));
        assert!(needs_refresh(None, 99.0, u64::MAX, &settings));
    }

    #[test]
    fn test_needs_refresh_dual_gate() {
        let settings = AnalysisSettings::default();
        let e = entry(30.0, 1_000_000);

        // Both thresholds met
        assert!(needs_refresh(Some(&e), 40.0, 1_060_000, &settings));
        // Growth too small
        assert!(!needs_refresh(Some(&e), 39.9, 2_000_000, &settings));
        // Cooldown not elapsed
        assert!(!needs_refresh(Some(&e), 90.0, 1_059_999, &settings));
        // Usage shrank (e.g. after compaction)
        assert!(!needs_refresh(Some(&e), 5.0, 9_000_000, &settings));
    }

    #[tokio::test]
    async fn test_successful_analysis_populates_cache() {
        let f = fixture(Behavior::Manual);
        f.scheduler.maybe_analyze("abc", &f.transcript, 42.0);
        assert!(f.scheduler.is_pending());
        assert_eq!(f.scheduler.in_flight_session().as_deref(), Some("abc"));

        {
            let pending = f.pending.lock();
            assert!(pending[0].0.contains("[USER] design the cache"));
            assert!(pending[0].0.contains("about 58%"));
        }
        FakeExtractor::release(
            &f.pending,
            ExtractionOutcome::success("cache design 42%|free 58%\n"),
        );
        wait_until_idle(&f.scheduler).await;

        let snapshot = f.scheduler.snapshot("abc");
        assert!(!snapshot.pending);
        assert_eq!(
            snapshot.segments,
            vec![Segment::new("cache design", 42), Segment::new("free", 58)]
        );
        let stored = f.scheduler.entry("abc").unwrap();
        assert_eq!(stored.last_pct, 42.0);
        assert!(stored.last_time > 0);

        // Persisted immediately
        let reloaded = SegmentCache::load(&f.cache_path);
        assert_eq!(reloaded.get("abc"), Some(&stored));
        assert_eq!(f.journal_events(), vec!["START", "RESULT", "CACHED"]);
    }

    #[tokio::test]
    async fn test_second_trigger_while_in_flight_is_noop() {
        let f = fixture(Behavior::Manual);
        f.scheduler.maybe_analyze("abc", &f.transcript, 10.0);
        assert!(f.scheduler.is_pending());

        // Different session, and a direct run attempt: both skipped
        assert!(!f.scheduler.should_analyze("other", 50.0));
        f.scheduler.maybe_analyze("other", &f.transcript, 50.0);
        f.scheduler.run_analysis("other", &f.transcript, 50.0);

        assert_eq!(f.counters.launches.load(Ordering::SeqCst), 1);
        assert_eq!(f.scheduler.in_flight_session().as_deref(), Some("abc"));
        assert!(f.scheduler.snapshot("other").segments.is_empty());

        FakeExtractor::release(&f.pending, ExtractionOutcome::success("x 10%|free 90%"));
        wait_until_idle(&f.scheduler).await;
        assert!(f.scheduler.should_analyze("other", 50.0));
    }

    #[tokio::test]
    async fn test_cached_session_respects_thresholds() {
        let f = fixture(Behavior::Manual);
        f.scheduler.maybe_analyze("abc", &f.transcript, 20.0);
        FakeExtractor::release(&f.pending, ExtractionOutcome::success("a 20%|free 80%"));
        wait_until_idle(&f.scheduler).await;

        // Just analyzed: cooldown blocks even a large jump
        assert!(!f.scheduler.should_analyze("abc", 90.0));
        f.scheduler.maybe_analyze("abc", &f.transcript, 90.0);
        assert!(!f.scheduler.is_pending());
        assert_eq!(f.counters.launches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_parse_failure_keeps_previous_entry() {
        let f = fixture(Behavior::Manual);
        f.scheduler.maybe_analyze("abc", &f.transcript, 20.0);
        FakeExtractor::release(&f.pending, ExtractionOutcome::success("a 20%|free 80%"));
        wait_until_idle(&f.scheduler).await;
        let before = f.scheduler.entry("abc").unwrap();

        f.scheduler.run_analysis("abc", &f.transcript, 60.0);
        FakeExtractor::release(
            &f.pending,
            ExtractionOutcome::success("Sorry, I cannot help with that."),
        );
        wait_until_idle(&f.scheduler).await;

        assert_eq!(f.scheduler.entry("abc").unwrap(), before);
        assert_eq!(
            f.journal_events(),
            vec!["START", "RESULT", "CACHED", "START", "RESULT", "PARSE_FAIL"]
        );
    }

    #[tokio::test]
    async fn test_nonzero_exit_leaves_cache_untouched() {
        let f = fixture(Behavior::Manual);
        f.scheduler.maybe_analyze("abc", &f.transcript, 20.0);
        FakeExtractor::release(
            &f.pending,
            ExtractionOutcome {
                code: Some(1),
                stdout: "a 20%|free 80%".to_string(),
                stderr: "rate limited".to_string(),
            },
        );
        wait_until_idle(&f.scheduler).await;

        assert!(f.scheduler.entry("abc").is_none());
        assert_eq!(f.journal_events(), vec!["START", "ERROR"]);
        // Next qualifying request retries
        assert!(f.scheduler.should_analyze("abc", 20.0));
    }

    #[tokio::test]
    async fn test_unreadable_transcript_aborts_before_spawn() {
        let f = fixture(Behavior::Manual);
        f.scheduler
            .maybe_analyze("abc", Path::new("/nonexistent/transcript.jsonl"), 20.0);

        assert!(!f.scheduler.is_pending());
        assert_eq!(f.counters.launches.load(Ordering::SeqCst), 0);
        assert!(f.scheduler.entry("abc").is_none());
        assert_eq!(f.journal_events(), vec!["START", "ERROR"]);
    }

    #[tokio::test]
    async fn test_spawn_failure_clears_flight() {
        let mut extractor = FakeExtractor::new(Behavior::Manual);
        extractor.fail_spawn = true;
        let f = fixture_with(extractor, Duration::from_secs(30), Duration::from_secs(1));

        f.scheduler.maybe_analyze("abc", &f.transcript, 20.0);
        assert!(!f.scheduler.is_pending());
        assert_eq!(f.journal_events(), vec!["START", "SPAWN_ERROR"]);
        assert!(f.scheduler.should_analyze("abc", 20.0));
    }

    #[tokio::test]
    async fn test_timeout_terminates_exactly_once() {
        let f = fixture_with(
            FakeExtractor::new(Behavior::HangUntilTerminated),
            Duration::from_millis(50),
            Duration::from_millis(500),
        );
        f.scheduler.maybe_analyze("abc", &f.transcript, 20.0);
        assert!(f.scheduler.is_pending());

        wait_until_idle(&f.scheduler).await;
        assert_eq!(f.counters.terminates.load(Ordering::SeqCst), 1);
        assert_eq!(f.counters.kills.load(Ordering::SeqCst), 0);
        assert!(f.scheduler.entry("abc").is_none());
        assert_eq!(f.journal_events(), vec!["START", "TIMEOUT"]);
    }

    #[tokio::test]
    async fn test_timeout_escalates_to_kill() {
        let f = fixture_with(
            FakeExtractor::new(Behavior::IgnoreTerminate),
            Duration::from_millis(50),
            Duration::from_millis(50),
        );
        f.scheduler.maybe_analyze("abc", &f.transcript, 20.0);

        wait_until_idle(&f.scheduler).await;
        assert_eq!(f.counters.terminates.load(Ordering::SeqCst), 1);
        assert_eq!(f.counters.kills.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_generation_is_ignored() {
        let f = fixture(Behavior::Manual);
        f.scheduler.maybe_analyze("abc", &f.transcript, 20.0);

        // A completion or timer from an older generation must not touch the slot
        f.scheduler.expire(0, "abc");
        f.scheduler.finish(0, "abc", 20.0, Ok(vec![Segment::new("bogus", 1)]));
        assert!(f.scheduler.is_pending());
        assert!(f.scheduler.entry("abc").is_none());

        FakeExtractor::release(&f.pending, ExtractionOutcome::success("real 20%|free 80%"));
        wait_until_idle(&f.scheduler).await;
        assert_eq!(
            f.scheduler.snapshot("abc").segments[0],
            Segment::new("real", 20)
        );
    }

    #[tokio::test]
    async fn test_shutdown_terminates_running_extractor() {
        let f = fixture(Behavior::HangUntilTerminated);
        f.scheduler.maybe_analyze("abc", &f.transcript, 20.0);
        f.scheduler.shutdown();

        wait_until_idle(&f.scheduler).await;
        assert_eq!(f.counters.terminates.load(Ordering::SeqCst), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_end_to_end_with_command_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let transcript = dir.path().join("t.jsonl");
        std::fs::write(
            &transcript,
            "{\"message\":{\"role\":\"user\",\"content\":\"hello\"}}\n",
        )
        .unwrap();

        let extractor = crate::extractor::CommandExtractor::new(
            "sh",
            vec![
                "-c".to_string(),
                "echo 'Here you go:'; echo 'greeting 5%|bogus|free 95%'".to_string(),
            ],
        );
        let scheduler = Scheduler::new(
            SegmentCache::load(dir.path().join("cache.json")),
            AnalysisJournal::disabled(),
            Box::new(extractor),
            AnalysisSettings::default(),
        );

        scheduler.maybe_analyze("s1", &transcript, 5.0);
        wait_until_idle(&scheduler).await;
        assert_eq!(
            scheduler.snapshot("s1").segments,
            vec![Segment::new("greeting", 5), Segment::new("free", 95)]
        );
    }
}
