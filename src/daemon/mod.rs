//! Background topic-analysis daemon
//!
//! Serves `GET /segments` on loopback, schedules analyses as a side effect
//! of those requests, and exits after a period without requests.

pub mod api;
pub mod reaper;
pub mod server;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use ctxmon_core::{AnalysisJournal, CommandExtractor, Scheduler, SegmentCache};

use crate::config::Settings;
use reaper::{ActivityClock, IdleReaper};
use server::DaemonServer;

/// Run the daemon until idle timeout or a termination signal
pub async fn run(settings: Settings) -> Result<()> {
    let cache_file = settings.paths.cache_file();
    let journal_file = settings.paths.journal_file();

    let cache = SegmentCache::load(&cache_file);
    tracing::info!(
        entries = cache.len(),
        path = %cache_file.display(),
        "Segment cache loaded"
    );

    let journal = AnalysisJournal::new(&journal_file, settings.paths.journal_max_bytes);
    let extractor = CommandExtractor::new(
        settings.analysis.command.clone(),
        settings.analysis.args.clone(),
    );
    let kill_grace = settings.analysis.kill_grace();
    let scheduler = Scheduler::new(
        cache,
        journal,
        Box::new(extractor),
        settings.analysis.clone(),
    );

    let activity = ActivityClock::new();
    let reaper = IdleReaper::new(
        activity.clone(),
        settings.daemon.idle_timeout(),
        settings.daemon.reap_interval(),
    );

    let server = DaemonServer::new(settings.daemon.port, scheduler.clone(), activity);
    let listener = server.bind().await?;
    tracing::info!(
        "Daemon listening on http://127.0.0.1:{}",
        settings.daemon.port
    );

    server.serve(listener, shutdown_signal(reaper)).await?;

    scheduler.shutdown();
    wait_for_flight(&scheduler, kill_grace).await;
    tracing::info!("Daemon stopped");
    Ok(())
}

/// Resolve on idle timeout, SIGINT or SIGTERM
async fn shutdown_signal(reaper: IdleReaper) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = reaper.wait_idle() => {}
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down"),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down"),
    }
}

/// Give a terminated extractor time to exit before the runtime goes away
async fn wait_for_flight(scheduler: &Arc<Scheduler>, grace: Duration) {
    let deadline = tokio::time::Instant::now() + grace;
    while scheduler.is_pending() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
