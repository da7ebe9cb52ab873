//! Control endpoint server using axum

use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use ctxmon_core::Scheduler;

use super::api::{self, ApiState};
use super::reaper::ActivityClock;

/// Loopback HTTP server answering segment queries
pub struct DaemonServer {
    port: u16,
    state: Arc<ApiState>,
}

impl DaemonServer {
    /// Create a new server
    pub fn new(port: u16, scheduler: Arc<Scheduler>, activity: ActivityClock) -> Self {
        Self {
            port,
            state: Arc::new(ApiState {
                scheduler,
                activity,
            }),
        }
    }

    /// Bind the loopback listener
    ///
    /// Fails when the port is taken, typically by a daemon already running.
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))
    }

    /// Serve until `shutdown` resolves
    pub async fn serve<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = build_router(self.state);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

/// Routes, activity tracking and request tracing
pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/segments", get(api::get_segments))
        .fallback(api::not_found)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            track_activity,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Every request, recognized or not, counts as activity
async fn track_activity(
    State(state): State<Arc<ApiState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    state.activity.touch();
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use ctxmon_core::{AnalysisJournal, AnalysisSettings, CommandExtractor, SegmentCache};
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state(dir: &std::path::Path) -> Arc<ApiState> {
        let scheduler = Scheduler::new(
            SegmentCache::empty(dir.join("segment_cache.json")),
            AnalysisJournal::disabled(),
            Box::new(CommandExtractor::new("true", Vec::new())),
            AnalysisSettings::default(),
        );
        Arc::new(ApiState {
            scheduler,
            activity: ActivityClock::new(),
        })
    }

    #[tokio::test]
    async fn test_requests_touch_activity() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let app = build_router(state.clone());

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(state.activity.idle_for() >= Duration::from_millis(30));

        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(state.activity.idle_for() < Duration::from_millis(30));
    }

    #[tokio::test]
    async fn test_bind_conflict_fails() {
        let dir = tempfile::tempdir().unwrap();
        let first = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = first.local_addr().unwrap().port();

        let server = DaemonServer::new(
            port,
            test_state(dir.path()).scheduler.clone(),
            ActivityClock::new(),
        );
        assert!(server.bind().await.is_err());
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let server = DaemonServer::new(
            0,
            test_state(dir.path()).scheduler.clone(),
            ActivityClock::new(),
        );
        let listener = server.bind().await.unwrap();

        tokio::time::timeout(Duration::from_secs(2), server.serve(listener, async {}))
            .await
            .expect("server should stop")
            .unwrap();
    }
}
