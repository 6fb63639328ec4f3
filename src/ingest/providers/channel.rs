// src/ingest/providers/channel.rs
//! Telegram public channel scraper.
//!
//! A channel's web preview (`/s/<channel>`) lists the newest messages and
//! links to the previous (older) page with `<link rel="prev">`. Within a page
//! messages run oldest to newest. The scraper walks pages backwards until a
//! message older than the cutoff shows up or there is no previous page.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use scraper::{ElementRef, Html};
use url::Url;

use super::dom::{find_first, has_class, is_tag_with_class, text_before_break};
use crate::error::CollectError;
use crate::ingest::fetch::{Fetch, HttpFetcher, Transport};
use crate::ingest::types::{Record, Source};
use crate::ingest::{normalize_title, truncate_title};

pub const TELEGRAM_BASE: &str = "https://t.me";

const HISTORY_CLASS: &str = "tgme_channel_history";
const MESSAGE_CLASS: &str = "tgme_widget_message_wrap";
const TEXT_CLASS: &str = "tgme_widget_message_text";
const PERMALINK_CLASS: &str = "tgme_widget_message_date";
const TIME_CLASS: &str = "time";

/// One message block as found on a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub published_at: DateTime<FixedOffset>,
    /// `None` when the text container is absent or holds no text.
    pub title: Option<String>,
    pub url: Option<String>,
    pub has_text_container: bool,
}

/// Everything extracted from one listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingPage {
    /// Page order: oldest first.
    pub candidates: Vec<Candidate>,
    /// Absolute url of the next older page, if any.
    pub prev_url: Option<String>,
}

fn resolve_url(base: &Url, href: &str) -> String {
    base.join(href)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| href.to_string())
}

/// Parse one listing page. The DOM is dropped before returning.
pub fn parse_page(body: &str, page_url: &str) -> Result<ListingPage, CollectError> {
    let base = Url::parse(page_url).map_err(|e| CollectError::parse(page_url, e.to_string()))?;
    let doc = Html::parse_document(body);
    let root = doc.root_element();

    let history = find_first(root, |e| is_tag_with_class(e, "section", HISTORY_CLASS))
        .ok_or_else(|| CollectError::parse(page_url, "cannot find channel messages container"))?;

    let mut candidates = Vec::new();
    for block in history.children().filter_map(ElementRef::wrap) {
        if !has_class(&block, MESSAGE_CLASS) {
            continue;
        }
        candidates.push(parse_message(block, &base, page_url)?);
    }

    let prev_url = find_first(root, |e| {
        e.value().name() == "link"
            && e.value()
                .attr("rel")
                .is_some_and(|rel| rel.split_ascii_whitespace().any(|r| r == "prev"))
    })
    .and_then(|link| link.value().attr("href"))
    .map(|href| resolve_url(&base, href));

    Ok(ListingPage {
        candidates,
        prev_url,
    })
}

fn parse_message(
    block: ElementRef<'_>,
    base: &Url,
    page_url: &str,
) -> Result<Candidate, CollectError> {
    let text = find_first(block, |e| is_tag_with_class(e, "div", TEXT_CLASS));
    let title = text
        .map(|t| normalize_title(&text_before_break(t)))
        .filter(|t| !t.is_empty())
        .map(|t| truncate_title(&t));

    let url = find_first(block, |e| is_tag_with_class(e, "a", PERMALINK_CLASS))
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
        .map(|href| resolve_url(base, href));

    let raw_ts = find_first(block, |e| is_tag_with_class(e, "time", TIME_CLASS))
        .and_then(|t| t.value().attr("datetime"))
        .ok_or_else(|| CollectError::Timestamp {
            url: page_url.to_string(),
            value: String::new(),
            message: "message has no datetime".to_string(),
        })?;
    let published_at =
        DateTime::parse_from_rfc3339(raw_ts.trim()).map_err(|e| CollectError::Timestamp {
            url: page_url.to_string(),
            value: raw_ts.to_string(),
            message: e.to_string(),
        })?;

    Ok(Candidate {
        published_at,
        title,
        url,
        has_text_container: text.is_some(),
    })
}

pub struct ChannelSource {
    name: String,
    channel: String,
    tags: Vec<String>,
    base_url: String,
    fetcher: Arc<dyn Fetch>,
}

impl ChannelSource {
    pub fn new(
        name: impl Into<String>,
        channel: impl Into<String>,
        tags: Vec<String>,
    ) -> Result<Self, CollectError> {
        let fetcher = HttpFetcher::new(&Transport::default())?;
        Ok(Self::with_fetcher(name, channel, tags, Arc::new(fetcher)))
    }

    pub fn with_fetcher(
        name: impl Into<String>,
        channel: impl Into<String>,
        tags: Vec<String>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        Self {
            name: name.into(),
            channel: channel.into(),
            tags,
            base_url: TELEGRAM_BASE.to_string(),
            fetcher,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Newest listing page of the channel.
    pub fn first_page_url(&self) -> String {
        format!("{}/s/{}", self.base_url.trim_end_matches('/'), self.channel)
    }

    fn to_record(&self, title: String, url: String, published_at: DateTime<FixedOffset>) -> Record {
        Record {
            collected_at: Utc::now().fixed_offset(),
            published_at,
            title,
            url,
            tags: self.tags.clone(),
            source: self.name.clone(),
        }
    }
}

#[async_trait]
impl Source for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self, cutoff: DateTime<FixedOffset>) -> Result<Vec<Record>, CollectError> {
        let mut page_url = self.first_page_url();
        let mut visited = HashSet::new();
        let mut out = Vec::new();

        loop {
            visited.insert(page_url.clone());
            let body = self.fetcher.get_text(&page_url).await?;
            let page = parse_page(&body, &page_url)?;

            // Messages in a page are chronological, so anything after an old
            // one is newer and still gets emitted.
            let mut done = false;
            for c in page.candidates {
                if c.published_at < cutoff {
                    done = true;
                    continue;
                }
                match (c.title, c.url) {
                    (Some(title), Some(url)) => out.push(self.to_record(title, url, c.published_at)),
                    (None, Some(url)) if c.has_text_container => {
                        tracing::debug!(source = %self.name, %url, "message without text skipped");
                    }
                    (title, url) => {
                        tracing::warn!(
                            source = %self.name,
                            page = %page_url,
                            has_title = title.is_some(),
                            has_url = url.is_some(),
                            has_text_container = c.has_text_container,
                            "message layout not recognized; skipped"
                        );
                    }
                }
            }

            if done {
                break;
            }
            match page.prev_url {
                None => break,
                Some(prev) if visited.contains(&prev) => {
                    tracing::warn!(source = %self.name, page = %prev, "previous page already visited");
                    break;
                }
                Some(prev) => page_url = prev,
            }
        }

        tracing::debug!(
            source = %self.name,
            pages = visited.len(),
            records = out.len(),
            "channel scraped"
        );
        Ok(out)
    }
}
