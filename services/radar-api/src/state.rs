//! Shared application state.

use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::cache::RadarCache;

pub struct AppState {
    pub cache: RadarCache,
    /// Present when the Prometheus recorder is installed
    pub prometheus: Option<PrometheusHandle>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(cache: RadarCache) -> Self {
        Self {
            cache,
            prometheus: None,
            started_at: Utc::now(),
        }
    }

    pub fn with_prometheus(mut self, handle: PrometheusHandle) -> Self {
        self.prometheus = Some(handle);
        self
    }
}
