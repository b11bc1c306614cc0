//! Shared helpers for radar-api integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use bytes::Bytes;
use chrono::Utc;
use radar_api::{FrameSource, RefreshOutcome};
use radar_common::{BoundingBox, RadarError, RadarFrame};

// ============================================================================
// Frames
// ============================================================================

/// A frame fetched `age` ago.
pub fn frame_aged(name: &str, age: chrono::Duration) -> RadarFrame {
    RadarFrame {
        image: Bytes::from(format!("png:{}", name)),
        source_name: name.to_string(),
        fetched_at: Utc::now() - age,
        width: 20,
        height: 15,
        bounds: BoundingBox::new(-129.995, 54.855, -129.805, 54.995),
        valid_time: None,
    }
}

pub fn frame(name: &str) -> RadarFrame {
    frame_aged(name, chrono::Duration::zero())
}

pub fn stale_frame(name: &str) -> RadarFrame {
    frame_aged(name, chrono::Duration::hours(1))
}

// ============================================================================
// Scripted frame source
// ============================================================================

/// Returns queued results in order and records every call.
#[derive(Default)]
pub struct FakeSource {
    runs: AtomicUsize,
    delay: Duration,
    script: Mutex<VecDeque<Result<RefreshOutcome, RadarError>>>,
    seen_current: Mutex<Vec<Option<String>>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn push_frame(&self, frame: RadarFrame) -> &Self {
        self.push(Ok(RefreshOutcome::Updated(frame)))
    }

    pub fn push_unchanged(&self) -> &Self {
        self.push(Ok(RefreshOutcome::Unchanged))
    }

    pub fn push_error(&self, err: RadarError) -> &Self {
        self.push(Err(err))
    }

    fn push(&self, result: Result<RefreshOutcome, RadarError>) -> &Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn seen_current(&self) -> Vec<Option<String>> {
        self.seen_current.lock().unwrap().clone()
    }
}

#[async_trait]
impl FrameSource for FakeSource {
    async fn produce(&self, current: Option<&str>) -> Result<RefreshOutcome, RadarError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.seen_current
            .lock()
            .unwrap()
            .push(current.map(str::to_string));

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RadarError::Internal("script exhausted".to_string())))
    }
}

/// Panics on every call.
pub struct PanickingSource;

#[async_trait]
impl FrameSource for PanickingSource {
    async fn produce(&self, _current: Option<&str>) -> Result<RefreshOutcome, RadarError> {
        panic!("source blew up");
    }
}

// ============================================================================
// Upstream HTTP server
// ============================================================================

/// In-process stand-in for the upstream directory.
#[derive(Default)]
pub struct Upstream {
    pub listing: Mutex<String>,
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub listing_hits: AtomicUsize,
    pub download_hits: AtomicUsize,
    /// Listing requests answered with 503 before the listing is served
    pub listing_failures: AtomicUsize,
    /// Download requests answered with 503 before files are served
    pub download_failures: AtomicUsize,
    /// Delay applied to every file download
    pub download_delay: Mutex<Duration>,
}

impl Upstream {
    pub fn new(listing: String) -> Arc<Self> {
        Arc::new(Self {
            listing: Mutex::new(listing),
            ..Self::default()
        })
    }

    pub fn add_file(&self, name: &str, data: Vec<u8>) {
        self.files.lock().unwrap().insert(name.to_string(), data);
    }

    pub fn listing_hits(&self) -> usize {
        self.listing_hits.load(Ordering::SeqCst)
    }

    pub fn download_hits(&self) -> usize {
        self.download_hits.load(Ordering::SeqCst)
    }
}

async fn listing_route(State(upstream): State<Arc<Upstream>>) -> Response {
    upstream.listing_hits.fetch_add(1, Ordering::SeqCst);

    let failures = upstream.listing_failures.load(Ordering::SeqCst);
    if failures > 0 {
        upstream.listing_failures.store(failures - 1, Ordering::SeqCst);
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let html = upstream.listing.lock().unwrap().clone();
    axum::response::Html(html).into_response()
}

async fn file_route(
    State(upstream): State<Arc<Upstream>>,
    Path(name): Path<String>,
) -> Response {
    upstream.download_hits.fetch_add(1, Ordering::SeqCst);

    let failures = upstream.download_failures.load(Ordering::SeqCst);
    if failures > 0 {
        upstream.download_failures.store(failures - 1, Ordering::SeqCst);
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let delay = *upstream.download_delay.lock().unwrap();
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }

    let data = upstream.files.lock().unwrap().get(&name).cloned();
    match data {
        Some(bytes) => bytes.into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Serve `upstream` under `/mrms/`; returns the directory URL.
pub async fn spawn_upstream(upstream: Arc<Upstream>) -> String {
    let app = Router::new()
        .route("/mrms/", get(listing_route))
        .route("/mrms/:name", get(file_route))
        .with_state(upstream);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}/mrms/", addr)
}

/// Poll `check` until it holds or `timeout` passes.
pub async fn eventually<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check().await
}
