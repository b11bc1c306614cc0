mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{eventually, frame, FakeSource};
use radar_api::scheduler::RefreshScheduler;
use radar_api::{RadarCache, StalenessPolicy};
use tokio::sync::broadcast;

#[tokio::test]
async fn test_scheduler_polls_until_shutdown() {
    let source = Arc::new(FakeSource::new());
    source
        .push_frame(frame("a_20240101-000000.grib2.gz"))
        .push_frame(frame("a_20240101-000200.grib2.gz"))
        .push_frame(frame("a_20240101-000400.grib2.gz"));
    let cache = RadarCache::new(
        source.clone(),
        StalenessPolicy::ServeStale,
        Duration::from_secs(120),
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let scheduler = RefreshScheduler::new(cache.clone(), Duration::from_millis(20));
    let shutdown = shutdown_tx.subscribe();
    let handle = tokio::spawn(async move { scheduler.run_forever(shutdown).await });

    let caught_up = eventually(Duration::from_secs(2), || async {
        cache
            .current()
            .await
            .map(|f| f.source_name == "a_20240101-000400.grib2.gz")
            .unwrap_or(false)
    })
    .await;
    assert!(caught_up);

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("scheduler stops on shutdown")
        .unwrap();
}

#[tokio::test]
async fn test_scheduler_survives_failed_refresh() {
    // Empty script: every run fails
    let source = Arc::new(FakeSource::new());
    let cache = RadarCache::new(
        source.clone(),
        StalenessPolicy::ServeStale,
        Duration::from_secs(120),
    );

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let scheduler = RefreshScheduler::new(cache.clone(), Duration::from_millis(10));
    let shutdown = shutdown_tx.subscribe();
    let handle = tokio::spawn(async move { scheduler.run_forever(shutdown).await });

    assert!(eventually(Duration::from_secs(2), || async { source.runs() >= 3 }).await);
    assert!(cache.current().await.is_none());

    shutdown_tx.send(()).unwrap();
    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("scheduler stops on shutdown")
        .unwrap();
}
