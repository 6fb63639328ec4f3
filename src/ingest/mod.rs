// src/ingest/mod.rs
pub mod fetch;
pub mod providers;
pub mod scheduler;
pub mod types;

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use once_cell::sync::OnceCell;

use crate::ingest::types::{Record, Source};

/// Scraped titles longer than this many chars are cut.
pub const TITLE_MAX_CHARS: usize = 100;
pub const TITLE_ELLIPSIS: &str = "...";

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "feeder_records_collected_total",
            "Records returned by sources inside the retention window."
        );
        describe_counter!(
            "feeder_source_errors_total",
            "Sources that failed during a cycle."
        );
        describe_counter!(
            "feeder_records_inserted_total",
            "Records newly added to the store."
        );
        describe_counter!(
            "feeder_records_evicted_total",
            "Records dropped by retention."
        );
        describe_histogram!("feeder_feed_parse_ms", "Feed parse time in milliseconds.");
        describe_histogram!("feeder_cycle_ms", "Update cycle duration in milliseconds.");
        describe_gauge!("feeder_store_records", "Records currently stored.");
        describe_gauge!("feeder_pages", "Pages currently cached.");
        describe_gauge!("feeder_sources_configured", "Sources loaded from config.");
        describe_gauge!("feeder_retention_days", "Retention period in days.");
        describe_gauge!(
            "feeder_last_cycle_ts",
            "Unix ts when the last update cycle finished."
        );
    });
}

/// Normalize display text: decode entities, collapse whitespace, trim.
pub fn normalize_title(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

/// Cap `s` at `TITLE_MAX_CHARS` chars, marking the cut with an ellipsis.
pub fn truncate_title(s: &str) -> String {
    if s.chars().count() > TITLE_MAX_CHARS {
        let mut out: String = s.chars().take(TITLE_MAX_CHARS).collect();
        out.push_str(TITLE_ELLIPSIS);
        out
    } else {
        s.to_string()
    }
}

/// Merged result of one collection pass.
#[derive(Debug, Default)]
pub struct CollectOutcome {
    pub records: Vec<Record>,
    pub succeeded: Vec<String>,
    /// `(source name, error message)`
    pub failed: Vec<(String, String)>,
}

impl CollectOutcome {
    pub fn failed_names(&self) -> Vec<String> {
        self.failed.iter().map(|(n, _)| n.clone()).collect()
    }
}

/// Run every source concurrently, one task each, and merge what they return.
///
/// A failing or panicking source is reported in `failed` and does not affect
/// the others. Returns only after every task has been joined.
pub async fn collect_all(
    sources: &[Arc<dyn Source>],
    cutoff: DateTime<FixedOffset>,
    tz: &Tz,
) -> CollectOutcome {
    ensure_metrics_described();

    let handles: Vec<_> = sources
        .iter()
        .map(|src| {
            let src = Arc::clone(src);
            let name = src.name().to_string();
            (name, tokio::spawn(async move { src.collect(cutoff).await }))
        })
        .collect();

    let mut outcome = CollectOutcome::default();
    for (name, handle) in handles {
        let message = match handle.await {
            Ok(Ok(records)) => {
                tracing::debug!(source = %name, count = records.len(), "source collected");
                counter!("feeder_records_collected_total").increment(records.len() as u64);
                outcome
                    .records
                    .extend(records.into_iter().map(|r| r.localize(tz)));
                outcome.succeeded.push(name);
                continue;
            }
            Ok(Err(e)) => e.to_string(),
            Err(join_err) => format!("collector task failed: {join_err}"),
        };
        tracing::warn!(source = %name, error = %message, "error while processing source");
        counter!("feeder_source_errors_total").increment(1);
        outcome.failed.push((name, message));
    }
    outcome
}
