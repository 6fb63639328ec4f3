// tests/collector.rs
//
// Fan-out collection over fixture-backed sources: feed parsing through the
// FeedSource path, per-source failure isolation, timezone normalization.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use feeder::error::CollectError;
use feeder::ingest::collect_all;
use feeder::ingest::fetch::FixtureFetcher;
use feeder::ingest::providers::FeedSource;
use feeder::ingest::types::{Record, Source};

const RSS: &str = include_str!("fixtures/feed_rss.xml");
const ATOM: &str = include_str!("fixtures/feed_atom.xml");
const RSS_ATOM_LINKS: &str = include_str!("fixtures/feed_rss_atom_links.xml");

fn ts(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).expect("valid rfc3339")
}

fn fixtures() -> Arc<FixtureFetcher> {
    Arc::new(
        FixtureFetcher::new()
            .with_page("https://blog.example.test/feed.xml", RSS)
            .with_page("https://atom.example.test/atom.xml", ATOM)
            .with_page("https://broken.example.test/feed", "<html><body>gone</body></html>"),
    )
}

fn feed(name: &str, url: &str, fetcher: &Arc<FixtureFetcher>) -> Arc<dyn Source> {
    Arc::new(FeedSource::with_fetcher(
        name,
        url,
        vec![name.to_lowercase(), "rss".into()],
        fetcher.clone(),
    ))
}

struct Panicking;

#[async_trait]
impl Source for Panicking {
    fn name(&self) -> &str {
        "Panicking"
    }

    async fn collect(&self, _cutoff: DateTime<FixedOffset>) -> Result<Vec<Record>, CollectError> {
        panic!("source blew up");
    }
}

#[tokio::test]
async fn one_failing_source_does_not_affect_others() {
    let f = fixtures();
    let sources = vec![
        feed("Blog", "https://blog.example.test/feed.xml", &f),
        feed("Broken", "https://broken.example.test/feed", &f),
        feed("Atom", "https://atom.example.test/atom.xml", &f),
    ];

    let out = collect_all(&sources, ts("2025-06-01T00:00:00+00:00"), &chrono_tz::UTC).await;

    assert_eq!(out.failed.len(), 1);
    assert_eq!(out.failed_names(), vec!["Broken"]);
    assert_eq!(out.succeeded, vec!["Blog", "Atom"]);

    let urls: Vec<&str> = out.records.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(
        urls,
        vec![
            "https://blog.example.test/june",
            "https://blog.example.test/dc",
            "https://atom.example.test/one",
            "https://atom.example.test/two",
        ]
    );
    assert_eq!(out.records[0].title, "Release notes for June");
    assert_eq!(out.records[0].tags, vec!["blog", "rss"]);
}

#[tokio::test]
async fn panicking_source_is_reported_as_failure() {
    let f = fixtures();
    let sources: Vec<Arc<dyn Source>> = vec![
        Arc::new(Panicking),
        feed("Blog", "https://blog.example.test/feed.xml", &f),
    ];

    let out = collect_all(&sources, ts("2025-06-01T00:00:00+00:00"), &chrono_tz::UTC).await;
    assert_eq!(out.failed_names(), vec!["Panicking"]);
    assert_eq!(out.records.len(), 2);
}

#[tokio::test]
async fn records_are_expressed_in_configured_timezone() {
    let f = fixtures();
    let sources = vec![feed("Atom", "https://atom.example.test/atom.xml", &f)];

    let tz = chrono_tz::Europe::Moscow;
    let out = collect_all(&sources, ts("2025-06-01T00:00:00+00:00"), &tz).await;

    let two = out
        .records
        .iter()
        .find(|r| r.url == "https://atom.example.test/two")
        .unwrap();
    assert_eq!(two.published_at.offset().local_minus_utc(), 3 * 3600);
    assert_eq!(two.published_at, ts("2025-06-07T08:15:00+01:00"));
    assert_eq!(two.published_at.to_rfc3339(), "2025-06-07T10:15:00+03:00");
}

#[tokio::test]
async fn no_sources_is_empty_outcome() {
    let out = collect_all(&[], ts("2025-06-01T00:00:00+00:00"), &chrono_tz::UTC).await;
    assert!(out.records.is_empty());
    assert!(out.failed.is_empty());
}

#[tokio::test]
async fn rss_with_atom_links_and_html_entities_is_collected() {
    let f = Arc::new(
        FixtureFetcher::new().with_page("https://lenta.example.test/rss", RSS_ATOM_LINKS),
    );
    let sources = vec![feed("Lenta", "https://lenta.example.test/rss", &f)];

    let out = collect_all(&sources, ts("2025-06-01T00:00:00+00:00"), &chrono_tz::UTC).await;

    assert!(out.failed.is_empty(), "{:?}", out.failed_names());
    let got: Vec<(&str, &str)> = out
        .records
        .iter()
        .map(|r| (r.url.as_str(), r.title.as_str()))
        .collect();
    assert_eq!(
        got,
        vec![
            ("https://lenta.example.test/news/1", "Премия «Книга года» вручена"),
            ("https://lenta.example.test/news/2", "Only an atom link"),
        ]
    );
}
