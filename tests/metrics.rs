// tests/metrics.rs
//
// One test per process: the Prometheus recorder is global.

use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use chrono::{DateTime, TimeDelta};
use tower::ServiceExt;

use feeder::ingest::fetch::FixtureFetcher;
use feeder::ingest::providers::FeedSource;
use feeder::ingest::types::Source;
use feeder::metrics::Metrics;
use feeder::{EngineConfig, FeedEngine, HtmlRenderer};

#[tokio::test]
async fn metrics_endpoint_contains_expected_series() {
    let fetcher = Arc::new(
        FixtureFetcher::new().with_page(
            "https://blog.example.test/feed.xml",
            include_str!("fixtures/feed_rss.xml"),
        ),
    );
    let sources: Vec<Arc<dyn Source>> = vec![
        Arc::new(FeedSource::with_fetcher(
            "Blog",
            "https://blog.example.test/feed.xml",
            vec!["rss".into()],
            fetcher.clone(),
        )),
        Arc::new(FeedSource::with_fetcher(
            "Broken",
            "https://broken.example.test/feed.xml",
            vec!["rss".into()],
            fetcher,
        )),
    ];

    let metrics = Metrics::init(sources.len(), 14).expect("install recorder");

    let dir = tempfile::tempdir().unwrap();
    let engine = FeedEngine::open(
        EngineConfig {
            snapshot_path: dir.path().join("records.json"),
            period: TimeDelta::days(14),
            tz: chrono_tz::UTC,
        },
        sources,
        Box::new(HtmlRenderer),
    )
    .unwrap();
    let now = DateTime::parse_from_rfc3339("2025-06-12T00:00:00+00:00").unwrap();
    engine.run_cycle_at(now).await.unwrap();

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    // axum::body::to_bytes requires an explicit limit
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "feeder_records_collected_total 2",
        "feeder_source_errors_total 1",
        "feeder_records_inserted_total 2",
        "feeder_store_records 2",
        "feeder_pages 1",
        "feeder_sources_configured 2",
        "feeder_cycle_ms",
        "feeder_feed_parse_ms",
    ] {
        assert!(text.contains(needle), "missing {needle:?} in:\n{text}");
    }
}
