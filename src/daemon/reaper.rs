//! Idle shutdown
//!
//! Every request touches the [`ActivityClock`]; the [`IdleReaper`] checks it
//! periodically and resolves once nothing has arrived for the idle timeout.

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Time of the last request, shared between handlers and the reaper
#[derive(Debug, Clone)]
pub struct ActivityClock {
    last_request: Arc<Mutex<Instant>>,
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityClock {
    /// Start the clock as if a request just arrived
    pub fn new() -> Self {
        Self {
            last_request: Arc::new(Mutex::new(Instant::now())),
        }
    }

    /// Record a request
    pub fn touch(&self) {
        *self.last_request.lock() = Instant::now();
    }

    /// Time since the last request
    pub fn idle_for(&self) -> Duration {
        self.last_request.lock().elapsed()
    }
}

/// Periodic idle check
pub struct IdleReaper {
    clock: ActivityClock,
    idle_timeout: Duration,
    interval: Duration,
}

impl IdleReaper {
    pub fn new(clock: ActivityClock, idle_timeout: Duration, interval: Duration) -> Self {
        Self {
            clock,
            idle_timeout,
            interval,
        }
    }

    /// Resolve once the daemon has been idle for longer than the timeout
    pub async fn wait_idle(self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let idle = self.clock.idle_for();
            if idle > self.idle_timeout {
                tracing::info!(idle_secs = idle.as_secs(), "Idle timeout reached, shutting down");
                return;
            }
        }
    }
}
