//! Background polling so the cached frame stays current without requests.

use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{debug, error, info};

use crate::cache::RadarCache;

pub struct RefreshScheduler {
    cache: RadarCache,
    interval: Duration,
}

impl RefreshScheduler {
    pub fn new(cache: RadarCache, interval: Duration) -> Self {
        Self { cache, interval }
    }

    /// Refresh now, then every `interval`, until `shutdown` fires.
    pub async fn run_forever(&self, mut shutdown: broadcast::Receiver<()>) {
        info!(interval_secs = self.interval.as_secs(), "Starting radar refresh scheduler");

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down scheduler");
                    break;
                }
                result = self.cache.refresh() => {
                    match result {
                        Ok(frame) => debug!(source = %frame.source_name, "Scheduled refresh complete"),
                        Err(e) => error!(error = %e, kind = e.kind(), "Scheduled refresh failed"),
                    }
                }
            }

            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutting down scheduler");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}
