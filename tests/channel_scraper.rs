// tests/channel_scraper.rs
//
// Channel pagination against fixture pages (no network):
// - stops at the first page that crosses the cutoff
// - still emits newer messages that follow an old one on the same page
// - title extraction: <br> cut, whitespace collapse, 100 char cap
// - a prev link pointing back to a visited page ends the walk

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use feeder::ingest::fetch::FixtureFetcher;
use feeder::ingest::providers::ChannelSource;
use feeder::ingest::types::Source;

const NEWEST: &str = include_str!("fixtures/channel_newest.html");
const BEFORE_20: &str = include_str!("fixtures/channel_before20.html");
const BEFORE_10: &str = include_str!("fixtures/channel_before10.html");
const LOOP: &str = include_str!("fixtures/channel_loop.html");

fn ts(s: &str) -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339(s).expect("valid rfc3339")
}

fn demo_fetcher() -> Arc<FixtureFetcher> {
    Arc::new(
        FixtureFetcher::new()
            .with_page("https://t.me/s/demo", NEWEST)
            .with_page("https://t.me/s/demo?before=20", BEFORE_20)
            .with_page("https://t.me/s/demo?before=10", BEFORE_10),
    )
}

#[tokio::test]
async fn pagination_stops_at_page_crossing_cutoff() {
    let fetcher = demo_fetcher();
    let src = ChannelSource::with_fetcher("Demo", "demo", vec!["telegram".into()], fetcher.clone());

    let records = src.collect(ts("2025-06-01T00:00:00+00:00")).await.unwrap();

    assert_eq!(
        fetcher.requests(),
        vec!["https://t.me/s/demo", "https://t.me/s/demo?before=20"],
        "third page must not be fetched"
    );

    let urls: Vec<&str> = records.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(
        urls,
        vec!["https://t.me/demo/21", "https://t.me/demo/22", "https://t.me/demo/12"]
    );
    assert!(records.iter().all(|r| r.source == "Demo" && r.tags == ["telegram"]));
    assert!(records.iter().all(|r| r.published_at >= ts("2025-06-01T00:00:00+00:00")));
}

#[tokio::test]
async fn titles_are_cut_at_break_and_length() {
    let src = ChannelSource::with_fetcher("Demo", "demo", vec![], demo_fetcher());
    let records = src.collect(ts("2025-06-01T00:00:00+00:00")).await.unwrap();

    let long = &records[0].title;
    assert_eq!(long.chars().count(), 103);
    assert!(long.starts_with("Longxxx"));
    assert!(long.ends_with("x..."));

    assert_eq!(records[1].title, "Twenty chars exactly");
    assert_eq!(records[1].title.chars().count(), 20);

    assert_eq!(records[2].title, "Nested whitespace here");
}

#[tokio::test]
async fn early_cutoff_walks_every_page() {
    let fetcher = demo_fetcher();
    let src = ChannelSource::with_fetcher("Demo", "demo", vec![], fetcher.clone());

    // Page three has no prev link, so the walk ends there.
    let records = src.collect(ts("2025-01-01T00:00:00+00:00")).await.unwrap();
    assert_eq!(fetcher.requests().len(), 3);
    let urls: Vec<&str> = records.iter().map(|r| r.url.as_str()).collect();
    assert!(urls.contains(&"https://t.me/demo/11"));
    assert!(urls.contains(&"https://t.me/demo/1"));
}

#[tokio::test]
async fn self_referencing_prev_link_terminates() {
    let fetcher = Arc::new(FixtureFetcher::new().with_page("https://t.me/s/loop", LOOP));
    let src = ChannelSource::with_fetcher("Loop", "loop", vec![], fetcher.clone());

    let records = src.collect(ts("2025-01-01T00:00:00+00:00")).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(fetcher.requests(), vec!["https://t.me/s/loop"]);
}

#[tokio::test]
async fn missing_page_fails_whole_scrape() {
    let fetcher = Arc::new(FixtureFetcher::new().with_page("https://t.me/s/demo", NEWEST));
    let src = ChannelSource::with_fetcher("Demo", "demo", vec![], fetcher);

    // page two is not served
    let err = src.collect(ts("2025-01-01T00:00:00+00:00")).await.unwrap_err();
    assert!(err.to_string().contains("before=20"), "{err}");
}
