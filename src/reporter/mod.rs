//! Status line reporter
//!
//! Runs once per render: reads the session JSON from stdin, works out the
//! usage percentage, asks the daemon for cached segments and prints one
//! line. Every failure degrades to a line without the segment bar.

pub mod client;
pub mod input;
pub mod render;

use std::path::Path;

use ctxmon_core::{transcript, Segment};

use crate::config::Settings;
use client::{DaemonClient, FetchError};
use input::StatusInput;

/// Print the status line for the session on stdin
pub fn run(settings: &Settings, config_path: Option<&Path>) {
    let input = StatusInput::from_stdin();
    let line = render_input(&input, settings, |session, pct, transcript| {
        fetch_or_start(settings, config_path, session, pct, transcript)
    });
    println!("{}", line);
}

/// Usage percentage from a token count, to one decimal
pub fn usage_pct(tokens: u64, window: u64) -> f64 {
    if window == 0 {
        return 0.0;
    }
    (tokens as f64 * 1000.0 / window as f64).round() / 10.0
}

fn render_input<F>(input: &StatusInput, settings: &Settings, fetch: F) -> String
where
    F: FnOnce(&str, f64, Option<&Path>) -> Vec<Segment>,
{
    let model = input.model_name();
    let usage = match input.transcript().and_then(transcript::latest_usage) {
        Some(usage) => usage,
        None => return render::new_session_line(model),
    };

    let window = input.window_size(settings.reporter.default_context_window);
    let pct = input
        .provided_pct()
        .unwrap_or_else(|| usage_pct(usage.total(), window));
    let used_tokens = (pct / 100.0 * window as f64).round() as u64;

    let segments = fetch(input.session(), pct, input.transcript());
    render::status_line(model, pct, used_tokens, &segments, settings.reporter.bar_width)
}

/// Query the daemon, starting it for next time when nothing listens
fn fetch_or_start(
    settings: &Settings,
    config_path: Option<&Path>,
    session: &str,
    pct: f64,
    transcript: Option<&Path>,
) -> Vec<Segment> {
    let client = DaemonClient::new(settings.daemon.port, settings.reporter.timeout());
    match client.fetch_segments(session, pct, transcript) {
        Ok(segments) => segments,
        Err(FetchError::DaemonDown) => {
            if let Err(e) = client::spawn_daemon(config_path) {
                tracing::debug!("Failed to start daemon: {}", e);
            }
            Vec::new()
        }
        Err(FetchError::Failed(e)) => {
            tracing::debug!("Segment query failed: {}", e);
            Vec::new()
        }
    }
}
