//! HTTP API.
//!
//! - `GET /api/radar/latest` - latest frame as PNG
//! - `GET /api/radar/refresh` - force a refresh
//! - `GET /api/radar/status` - cache state
//! - `GET /health`, `GET /metrics`, `GET /`

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::{SecondsFormat, Utc};
use radar_common::{BoundingBox, RadarFrame};
use serde::Serialize;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::state::AppState;

const X_RADAR_SOURCE: HeaderName = HeaderName::from_static("x-radar-source");
const X_RADAR_FETCHED_AT: HeaderName = HeaderName::from_static("x-radar-fetched-at");
const X_RADAR_BOUNDS: HeaderName = HeaderName::from_static("x-radar-bounds");

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub service: String,
    /// `empty` or `populated`
    pub state: String,
    pub refreshing: bool,
    pub staleness_policy: String,
    pub max_age_secs: u64,
    pub uptime_secs: i64,
    pub frame: Option<FrameStatus>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameStatus {
    pub source: String,
    pub fetched_at: String,
    pub valid_time: Option<String>,
    pub age_secs: i64,
    /// Last time upstream was confirmed to hold nothing newer
    pub checked_at: Option<String>,
    pub stale: bool,
    pub width: u32,
    pub height: u32,
    pub bounds: BoundingBox,
    pub bytes: usize,
}

// ============================================================================
// Router
// ============================================================================

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/api/radar/latest", get(latest_handler))
        .route("/api/radar/refresh", get(refresh_handler))
        .route("/api/radar/status", get(status_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
}

/// Serve until `shutdown` resolves.
pub async fn run_server(
    state: Arc<AppState>,
    addr: SocketAddr,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %listener.local_addr()?, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

async fn root_handler() -> &'static str {
    "Radar mosaic service is running"
}

async fn health_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "radar-api"
    }))
}

/// GET /api/radar/latest
async fn latest_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.cache.get().await {
        Ok(frame) => png_response(&frame),
        Err(e) => {
            error!(error = %e, kind = e.kind(), "Failed to serve latest radar frame");
            error_response("Failed to fetch radar")
        }
    }
}

/// GET /api/radar/refresh
async fn refresh_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.cache.refresh().await {
        Ok(frame) => Json(serde_json::json!({
            "message": "Radar refreshed",
            "source": frame.source_name,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, kind = e.kind(), "Manual radar refresh failed");
            error_response("Failed to refresh radar")
        }
    }
}

/// GET /api/radar/status
async fn status_handler(Extension(state): Extension<Arc<AppState>>) -> Json<StatusResponse> {
    let snapshot = state.cache.snapshot().await;
    let now = Utc::now();
    let max_age = state.cache.max_age();

    let frame = snapshot.current.as_deref().map(|f| {
        let age = f.age(now);
        FrameStatus {
            source: f.source_name.clone(),
            fetched_at: f.fetched_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            valid_time: f
                .valid_time
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            age_secs: age.num_seconds(),
            checked_at: snapshot
                .checked_at
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true)),
            stale: snapshot.stale,
            width: f.width,
            height: f.height,
            bounds: f.bounds,
            bytes: f.image.len(),
        }
    });

    Json(StatusResponse {
        service: "radar-api".to_string(),
        state: if frame.is_some() { "populated" } else { "empty" }.to_string(),
        refreshing: snapshot.refreshing,
        staleness_policy: state.cache.policy().as_str().to_string(),
        max_age_secs: max_age.as_secs(),
        uptime_secs: (now - state.started_at).num_seconds(),
        frame,
    })
}

/// GET /metrics
async fn metrics_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match &state.prometheus {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn png_response(frame: &RadarFrame) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));

    let fetched_at = frame.fetched_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    let bounds = frame.bounds.to_header_value();
    for (name, value) in [
        (X_RADAR_SOURCE, frame.source_name.as_str()),
        (X_RADAR_FETCHED_AT, fetched_at.as_str()),
        (X_RADAR_BOUNDS, bounds.as_str()),
    ] {
        match HeaderValue::from_str(value) {
            Ok(v) => {
                headers.insert(name, v);
            }
            Err(_) => warn!(header = %name, "Skipping header with invalid value"),
        }
    }

    (StatusCode::OK, headers, frame.image.clone()).into_response()
}

fn error_response(message: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}
