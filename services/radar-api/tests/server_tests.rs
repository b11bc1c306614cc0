//! HTTP routes exercised with `oneshot` against scripted sources.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{frame, FakeSource};
use radar_api::server::create_router;
use radar_api::{AppState, RadarCache, StalenessPolicy};
use radar_common::{BoundingBox, RadarError};
use tower::ServiceExt;

fn app(source: &Arc<FakeSource>) -> (Router, RadarCache) {
    let cache = RadarCache::new(
        source.clone(),
        StalenessPolicy::ServeStale,
        Duration::from_secs(120),
    );
    let router = create_router(Arc::new(AppState::new(cache.clone())));
    (router, cache)
}

async fn get(router: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body.to_vec())
}

fn json(body: &[u8]) -> serde_json::Value {
    serde_json::from_slice(body).expect("JSON body")
}

#[tokio::test]
async fn test_latest_serves_png_with_metadata_headers() {
    let source = Arc::new(FakeSource::new());
    let f = frame("RALA_20240101-000200.grib2.gz");
    source.push_frame(f.clone());
    let (router, _) = app(&source);

    let (status, headers, body) = get(&router, "/api/radar/latest").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
    assert_eq!(headers["x-radar-source"], "RALA_20240101-000200.grib2.gz");
    let bounds =
        BoundingBox::from_header_value(headers["x-radar-bounds"].to_str().unwrap()).unwrap();
    assert!((bounds.min_lon - f.bounds.min_lon).abs() < 1e-6);
    assert!((bounds.max_lat - f.bounds.max_lat).abs() < 1e-6);

    let fetched_at = headers["x-radar-fetched-at"].to_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(fetched_at).is_ok());

    assert_eq!(body, f.image.to_vec());
}

#[tokio::test]
async fn test_latest_is_served_from_cache_on_second_request() {
    let source = Arc::new(FakeSource::new());
    source.push_frame(frame("RALA_20240101-000200.grib2.gz"));
    let (router, _) = app(&source);

    assert_eq!(get(&router, "/api/radar/latest").await.0, StatusCode::OK);
    assert_eq!(get(&router, "/api/radar/latest").await.0, StatusCode::OK);
    assert_eq!(source.runs(), 1);
}

#[tokio::test]
async fn test_latest_failure_is_generic_500() {
    let source = Arc::new(FakeSource::new());
    source.push_error(RadarError::fetch("http://upstream/mrms/", "HTTP 404 Not Found"));
    let (router, cache) = app(&source);

    let (status, _, body) = get(&router, "/api/radar/latest").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(&body), serde_json::json!({ "error": "Failed to fetch radar" }));
    assert!(cache.current().await.is_none());
}

#[tokio::test]
async fn test_refresh_route() {
    let source = Arc::new(FakeSource::new());
    source
        .push_frame(frame("RALA_20240101-000200.grib2.gz"))
        .push_error(RadarError::Decode("truncated".into()));
    let (router, cache) = app(&source);

    let (status, _, body) = get(&router, "/api/radar/refresh").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json(&body),
        serde_json::json!({
            "message": "Radar refreshed",
            "source": "RALA_20240101-000200.grib2.gz"
        })
    );

    let (status, _, body) = get(&router, "/api/radar/refresh").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json(&body), serde_json::json!({ "error": "Failed to refresh radar" }));

    // Failed refresh leaves the frame in place
    assert_eq!(
        cache.current().await.unwrap().source_name,
        "RALA_20240101-000200.grib2.gz"
    );
}

#[tokio::test]
async fn test_root_and_health() {
    let (router, _) = app(&Arc::new(FakeSource::new()));

    let (status, _, body) = get(&router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(!body.is_empty());

    let (status, _, body) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json(&body),
        serde_json::json!({ "status": "ok", "service": "radar-api" })
    );
}

#[tokio::test]
async fn test_status_reports_cache_state() {
    let source = Arc::new(FakeSource::new());
    let (router, cache) = app(&source);

    let (_, _, body) = get(&router, "/api/radar/status").await;
    let status = json(&body);
    assert_eq!(status["state"], "empty");
    assert_eq!(status["staleness_policy"], "serve_stale");
    assert_eq!(status["max_age_secs"], 120);
    assert!(status["frame"].is_null());
    assert_eq!(source.runs(), 0, "status must not trigger a refresh");

    cache.seed(frame("RALA_20240101-000200.grib2.gz")).await;
    let (_, _, body) = get(&router, "/api/radar/status").await;
    let status = json(&body);
    assert_eq!(status["state"], "populated");
    assert_eq!(status["frame"]["source"], "RALA_20240101-000200.grib2.gz");
    assert_eq!(status["frame"]["width"], 20);
    assert_eq!(status["frame"]["stale"], false);
}

#[tokio::test]
async fn test_metrics_without_recorder_is_404() {
    let (router, _) = app(&Arc::new(FakeSource::new()));
    let (status, _, _) = get(&router, "/metrics").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let source = Arc::new(FakeSource::new());
    source.push_frame(frame("RALA_20240101-000200.grib2.gz"));
    let (router, _) = app(&source);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/api/radar/latest")
                .header(header::ORIGIN, "https://maps.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
}
