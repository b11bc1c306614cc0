//! Prometheus metrics for refreshes, cache lookups and downloads.
//!
//! Metrics are recorded through the `metrics` facade and are no-ops until a
//! recorder is installed.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub const REFRESH_TOTAL: &str = "radar_refresh_total";
pub const REFRESH_DURATION: &str = "radar_refresh_duration_seconds";
pub const CACHE_REQUESTS: &str = "radar_cache_requests_total";
pub const REFRESH_COALESCED: &str = "radar_refresh_coalesced_total";
pub const DOWNLOAD_BYTES: &str = "radar_download_bytes";

/// Outcome of a cache lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheLookup {
    Hit,
    Stale,
    Miss,
}

impl CacheLookup {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheLookup::Hit => "hit",
            CacheLookup::Stale => "stale",
            CacheLookup::Miss => "miss",
        }
    }
}

/// Install the global Prometheus recorder.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    describe_metrics();
    Ok(handle)
}

fn describe_metrics() {
    describe_counter!(REFRESH_TOTAL, "Completed refresh runs by outcome");
    describe_histogram!(REFRESH_DURATION, Unit::Seconds, "Duration of refresh runs");
    describe_counter!(CACHE_REQUESTS, "Frame lookups by cache result");
    describe_counter!(
        REFRESH_COALESCED,
        "Callers that joined a refresh already in flight"
    );
    describe_histogram!(DOWNLOAD_BYTES, Unit::Bytes, "Size of downloaded radar files");
}

/// `outcome` is `updated`, `unchanged` or an error kind.
pub fn record_refresh(outcome: &'static str, duration: Duration) {
    counter!(REFRESH_TOTAL, "outcome" => outcome).increment(1);
    histogram!(REFRESH_DURATION).record(duration.as_secs_f64());
}

pub fn record_cache_request(lookup: CacheLookup) {
    counter!(CACHE_REQUESTS, "result" => lookup.as_str()).increment(1);
}

pub fn record_coalesced() {
    counter!(REFRESH_COALESCED).increment(1);
}

pub fn record_download(bytes: usize) {
    histogram!(DOWNLOAD_BYTES).record(bytes as f64);
}
