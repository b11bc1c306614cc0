//! The single cached radar frame and refresh coordination.
//!
//! At most one refresh runs at a time. A caller that needs a refresh while
//! one is in flight subscribes to it instead of starting another, and every
//! subscriber receives the same result. Runs execute in their own task, so a
//! caller going away never cancels one.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use radar_common::{RadarError, RadarFrame};
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, instrument, warn};

use crate::config::StalenessPolicy;
use crate::metrics::{self, CacheLookup};
use crate::pipeline::{FrameSource, RefreshOutcome};

type RefreshResult = Result<Arc<RadarFrame>, RadarError>;

#[derive(Default)]
struct CacheState {
    current: Option<Arc<RadarFrame>>,
    /// Last time the upstream was confirmed to hold nothing newer than
    /// `current`. Staleness is measured from here, not from `fetched_at`.
    checked_at: Option<DateTime<Utc>>,
    in_flight: Option<broadcast::Sender<RefreshResult>>,
}

impl CacheState {
    /// Install `frame` unless it would replace a frame of equal or newer
    /// source. Returns the frame that is current afterwards.
    fn put(&mut self, frame: Arc<RadarFrame>) -> Arc<RadarFrame> {
        match &self.current {
            Some(current) if !frame.supersedes(current) => {
                warn!(
                    current = %current.source_name,
                    rejected = %frame.source_name,
                    "Ignoring frame that is not newer than the cached one"
                );
                current.clone()
            }
            _ => {
                self.current = Some(frame.clone());
                frame
            }
        }
    }
}

struct Inner {
    source: Arc<dyn FrameSource>,
    state: Mutex<CacheState>,
    policy: StalenessPolicy,
    max_age: Duration,
}

/// Point-in-time view of the cache for status reporting.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    pub current: Option<Arc<RadarFrame>>,
    pub checked_at: Option<DateTime<Utc>>,
    /// Whether the next `get` would trigger a refresh
    pub stale: bool,
    pub refreshing: bool,
}

/// Holds the latest frame and drives refreshes through a [`FrameSource`].
#[derive(Clone)]
pub struct RadarCache {
    inner: Arc<Inner>,
}

impl RadarCache {
    pub fn new(source: Arc<dyn FrameSource>, policy: StalenessPolicy, max_age: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                source,
                state: Mutex::new(CacheState::default()),
                policy,
                max_age,
            }),
        }
    }

    pub fn policy(&self) -> StalenessPolicy {
        self.inner.policy
    }

    pub fn max_age(&self) -> Duration {
        self.inner.max_age
    }

    /// Frame to serve, refreshing first when the cache is empty.
    #[instrument(skip(self))]
    pub async fn get(&self) -> RefreshResult {
        let mut state = self.inner.state.lock().await;

        let now = Utc::now();
        let Some(frame) = state.current.clone() else {
            metrics::record_cache_request(CacheLookup::Miss);
            let rx = self.join_or_start(&mut state);
            drop(state);
            return wait(rx).await;
        };

        if !self.is_stale(&state, now) {
            metrics::record_cache_request(CacheLookup::Hit);
            return Ok(frame);
        }

        metrics::record_cache_request(CacheLookup::Stale);
        match self.inner.policy {
            StalenessPolicy::ServeStale => {
                // Receiver dropped; the run completes on its own
                let _ = self.join_or_start(&mut state);
                Ok(frame)
            }
            StalenessPolicy::RefreshThenServe => {
                let rx = self.join_or_start(&mut state);
                drop(state);
                wait(rx).await
            }
        }
    }

    /// Run a refresh (or join the running one) and wait for it.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> RefreshResult {
        let rx = {
            let mut state = self.inner.state.lock().await;
            self.join_or_start(&mut state)
        };
        wait(rx).await
    }

    /// The cached frame, without triggering a refresh.
    pub async fn current(&self) -> Option<Arc<RadarFrame>> {
        self.inner.state.lock().await.current.clone()
    }

    pub async fn snapshot(&self) -> CacheSnapshot {
        let state = self.inner.state.lock().await;
        CacheSnapshot {
            current: state.current.clone(),
            checked_at: state.checked_at,
            stale: state.current.is_some() && self.is_stale(&state, Utc::now()),
            refreshing: state.in_flight.is_some(),
        }
    }

    /// Install a previously persisted frame. Only an empty cache is seeded.
    pub async fn seed(&self, frame: RadarFrame) -> bool {
        let mut state = self.inner.state.lock().await;
        if state.current.is_some() {
            return false;
        }
        info!(source = %frame.source_name, "Seeded cache with persisted frame");
        state.checked_at = Some(frame.fetched_at);
        state.current = Some(Arc::new(frame));
        true
    }

    fn is_stale(&self, state: &CacheState, now: DateTime<Utc>) -> bool {
        let Some(checked_at) = state.checked_at else {
            return true;
        };
        (now - checked_at)
            .to_std()
            .map(|age| age > self.inner.max_age)
            .unwrap_or(false)
    }

    /// Subscribe to the refresh in flight, starting one if there is none.
    fn join_or_start(&self, state: &mut CacheState) -> broadcast::Receiver<RefreshResult> {
        if let Some(tx) = &state.in_flight {
            metrics::record_coalesced();
            return tx.subscribe();
        }

        let (tx, rx) = broadcast::channel(1);
        state.in_flight = Some(tx.clone());

        let current = state.current.as_ref().map(|f| f.source_name.clone());
        tokio::spawn(run_refresh(self.inner.clone(), tx, current));
        rx
    }
}

async fn run_refresh(
    inner: Arc<Inner>,
    tx: broadcast::Sender<RefreshResult>,
    current: Option<String>,
) {
    let start = Instant::now();

    // A panicking source must still release the waiters
    let source = inner.source.clone();
    let produced = tokio::spawn(async move { source.produce(current.as_deref()).await })
        .await
        .unwrap_or_else(|e| Err(RadarError::Internal(format!("Refresh task failed: {}", e))));

    let mut state = inner.state.lock().await;
    let (result, outcome) = match produced {
        Ok(RefreshOutcome::Updated(frame)) => {
            let installed = state.put(Arc::new(frame));
            info!(
                source = %installed.source_name,
                width = installed.width,
                height = installed.height,
                bytes = installed.image.len(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Radar frame refreshed"
            );
            state.checked_at = Some(Utc::now());
            (Ok(installed), "updated")
        }
        Ok(RefreshOutcome::Unchanged) => match state.current.clone() {
            Some(frame) => {
                state.checked_at = Some(Utc::now());
                (Ok(frame), "unchanged")
            }
            None => (
                Err(RadarError::Internal(
                    "Refresh reported no change but nothing is cached".to_string(),
                )),
                "internal",
            ),
        },
        Err(e) => {
            error!(error = %e, kind = e.kind(), "Radar refresh failed");
            let kind = e.kind();
            (Err(e), kind)
        }
    };

    metrics::record_refresh(outcome, start.elapsed());
    state.in_flight = None;
    // Every waiter subscribed under the lock, so all of them see this
    let _ = tx.send(result);
}

async fn wait(mut rx: broadcast::Receiver<RefreshResult>) -> RefreshResult {
    rx.recv()
        .await
        .unwrap_or_else(|e| Err(RadarError::Internal(format!("Refresh result lost: {}", e))))
}
