//! Control endpoint handlers

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use ctxmon_core::{Scheduler, Segment};

use super::reaper::ActivityClock;

/// Session id used when the request names none
pub const UNKNOWN_SESSION: &str = "unknown";

/// Shared state for endpoint handlers
pub struct ApiState {
    pub scheduler: Arc<Scheduler>,
    pub activity: ActivityClock,
}

/// Query parameters of `GET /segments`
///
/// Everything arrives as text so a malformed value degrades to its default
/// instead of rejecting the request.
#[derive(Debug, Default, Deserialize)]
pub struct SegmentsQuery {
    pub session: Option<String>,
    pub pct: Option<String>,
    pub transcript: Option<String>,
}

/// Response of `GET /segments`
#[derive(Debug, Serialize, Deserialize)]
pub struct SegmentsResponse {
    pub segments: Vec<Segment>,
    /// Whether any analysis is running, for any session
    pub pending: bool,
}

/// Parse a usage percentage, falling back to 0
pub fn parse_pct(raw: Option<&str>) -> f64 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|p| p.is_finite())
        .unwrap_or(0.0)
}

/// Cached segments for a session; may schedule an analysis as a side effect
///
/// Never waits on an analysis: the response is whatever the cache holds
/// right now.
pub async fn get_segments(
    State(state): State<Arc<ApiState>>,
    query: Result<Query<SegmentsQuery>, QueryRejection>,
) -> Json<SegmentsResponse> {
    let query = match query {
        Ok(Query(q)) => q,
        Err(e) => {
            tracing::debug!("Malformed segments query: {}", e);
            SegmentsQuery::default()
        }
    };

    let session = query
        .session
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNKNOWN_SESSION.to_string());
    let pct = parse_pct(query.pct.as_deref());

    if let Some(transcript) = query.transcript.filter(|t| !t.is_empty()) {
        state
            .scheduler
            .maybe_analyze(&session, Path::new(&transcript), pct);
    }

    let snapshot = state.scheduler.snapshot(&session);
    Json(SegmentsResponse {
        segments: snapshot.segments,
        pending: snapshot.pending,
    })
}

/// Any unknown path: 404 with an empty body
pub async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
