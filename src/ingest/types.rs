// src/ingest/types.rs
use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;

use crate::error::CollectError;

/// One collected item. Field names on disk follow the snapshot format that
/// existing `records.json` files use.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct Record {
    #[serde(rename = "CollectDate")]
    pub collected_at: DateTime<FixedOffset>,
    #[serde(rename = "Date")]
    pub published_at: DateTime<FixedOffset>,
    #[serde(rename = "Title")]
    pub title: String,
    #[serde(rename = "Url")]
    pub url: String,
    #[serde(rename = "Tags")]
    pub tags: Vec<String>,
    #[serde(rename = "Source")]
    pub source: String,
}

impl Record {
    /// Express both timestamps in `tz`, keeping the instants unchanged.
    pub fn localize(mut self, tz: &Tz) -> Self {
        self.collected_at = localize(self.collected_at, tz);
        self.published_at = localize(self.published_at, tz);
        self
    }
}

pub fn localize(dt: DateTime<FixedOffset>, tz: &Tz) -> DateTime<FixedOffset> {
    dt.with_timezone(tz).fixed_offset()
}

/// A place records come from.
///
/// Implementations filter to `published_at >= cutoff` before returning.
#[async_trait::async_trait]
pub trait Source: Send + Sync {
    fn name(&self) -> &str;

    async fn collect(&self, cutoff: DateTime<FixedOffset>)
        -> Result<Vec<Record>, CollectError>;
}
