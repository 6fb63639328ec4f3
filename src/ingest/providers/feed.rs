// src/ingest/providers/feed.rs
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use metrics::histogram;
use once_cell::sync::OnceCell;
use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::{DeError, Reader};
use regex::{Captures, Regex};
use serde::Deserialize;

use crate::error::CollectError;
use crate::ingest::fetch::{Fetch, HttpFetcher, Transport};
use crate::ingest::normalize_title;
use crate::ingest::types::{Record, Source};

/* ----------------------------
RSS 2.0
---------------------------- */

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    #[serde(default)]
    link: Vec<RssLink>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    #[serde(rename = "dc:date", alias = "date")]
    dc_date: Option<String>,
}

/// `<link>` text, or an `<atom:link href=".."/>` sharing the element name.
#[derive(Debug, Deserialize)]
struct RssLink {
    #[serde(rename = "$text", default)]
    text: String,
    #[serde(rename = "@href")]
    href: Option<String>,
}

/// RSS 1.0: items are siblings of the channel under `rdf:RDF`.
#[derive(Debug, Deserialize)]
struct Rdf {
    #[serde(rename = "item", default)]
    item: Vec<RssItem>,
}

/* ----------------------------
Atom
---------------------------- */

#[derive(Debug, Deserialize)]
struct Atom {
    #[serde(rename = "entry", default)]
    entry: Vec<AtomEntry>,
}

#[derive(Debug, Deserialize)]
struct AtomEntry {
    title: Option<AtomText>,
    #[serde(default)]
    link: Vec<AtomLink>,
    published: Option<String>,
    updated: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AtomText {
    #[serde(rename = "$text", default)]
    value: String,
}

#[derive(Debug, Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: Option<String>,
    #[serde(rename = "@rel")]
    rel: Option<String>,
}

/// One parsed feed entry before it becomes a `Record`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub published_at: DateTime<FixedOffset>,
    pub title: String,
    pub link: String,
}

/// RFC 2822 first (RSS), then RFC 3339 (Atom, `dc:date`).
pub fn parse_feed_date(ts: &str) -> Option<DateTime<FixedOffset>> {
    let ts = ts.trim();
    DateTime::parse_from_rfc2822(ts)
        .or_else(|_| DateTime::parse_from_rfc3339(ts))
        .ok()
}

/// Local name of the document's root element.
fn root_element(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Parse an RSS 2.0, RSS 1.0 or Atom document. Entries without a usable date
/// or link are skipped.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedItem>, DeError> {
    let xml_clean = html_entities_to_xml(xml);

    let rss_fields = |it: RssItem| {
        let link = pick_rss_link(&it.link);
        (it.title, link, it.pub_date.or(it.dc_date))
    };
    let raw: Vec<(Option<String>, Option<String>, Option<String>)> =
        match root_element(&xml_clean).as_deref() {
            Some("rss") => from_str::<Rss>(&xml_clean)?
                .channel
                .item
                .into_iter()
                .map(rss_fields)
                .collect(),
            Some("RDF") => from_str::<Rdf>(&xml_clean)?
                .item
                .into_iter()
                .map(rss_fields)
                .collect(),
            Some("feed") => from_str::<Atom>(&xml_clean)?
                .entry
                .into_iter()
                .map(|e| {
                    let link = pick_atom_link(&e.link);
                    (e.title.map(|t| t.value), link, e.published.or(e.updated))
                })
                .collect(),
            other => {
                return Err(DeError::Custom(format!(
                    "not an RSS or Atom document (root element {other:?})"
                )))
            }
        };

    let mut out = Vec::with_capacity(raw.len());
    for (title, link, date) in raw {
        let Some(link) = link.map(|l| l.trim().to_string()).filter(|l| !l.is_empty()) else {
            tracing::debug!(title = ?title, "feed item without link skipped");
            continue;
        };
        let Some(published_at) = date.as_deref().and_then(parse_feed_date) else {
            tracing::debug!(%link, date = ?date, "feed item without usable date skipped");
            continue;
        };
        let title = normalize_title(title.as_deref().unwrap_or_default());
        out.push(FeedItem {
            published_at,
            title: if title.is_empty() { link.clone() } else { title },
            link,
        });
    }
    Ok(out)
}

/// Element text wins over an `href` attribute.
fn pick_rss_link(links: &[RssLink]) -> Option<String> {
    links
        .iter()
        .map(|l| l.text.trim())
        .find(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| links.iter().find_map(|l| l.href.clone()))
}

fn pick_atom_link(links: &[AtomLink]) -> Option<String> {
    links
        .iter()
        .find(|l| matches!(l.rel.as_deref(), None | Some("alternate")))
        .or_else(|| links.first())
        .and_then(|l| l.href.clone())
}

/// RSS or Atom feed behind a url.
pub struct FeedSource {
    name: String,
    url: String,
    tags: Vec<String>,
    fetcher: Arc<dyn Fetch>,
}

impl FeedSource {
    pub fn from_url(
        name: impl Into<String>,
        url: impl Into<String>,
        tags: Vec<String>,
        transport: &Transport,
    ) -> Result<Self, CollectError> {
        let fetcher = HttpFetcher::new(transport)?;
        Ok(Self::with_fetcher(name, url, tags, Arc::new(fetcher)))
    }

    pub fn with_fetcher(
        name: impl Into<String>,
        url: impl Into<String>,
        tags: Vec<String>,
        fetcher: Arc<dyn Fetch>,
    ) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            tags,
            fetcher,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Source for FeedSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn collect(&self, cutoff: DateTime<FixedOffset>) -> Result<Vec<Record>, CollectError> {
        let body = self.fetcher.get_text(&self.url).await?;

        let t0 = std::time::Instant::now();
        let items = parse_feed(&body).map_err(|e| CollectError::feed(&self.url, e))?;
        histogram!("feeder_feed_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        let collected_at = Utc::now().fixed_offset();
        Ok(items
            .into_iter()
            .filter(|it| it.published_at >= cutoff)
            .map(|it| Record {
                collected_at,
                published_at: it.published_at,
                title: it.title,
                url: it.link,
                tags: self.tags.clone(),
                source: self.name.clone(),
            })
            .collect())
    }
}

/// Rewrite HTML named entities so the XML parser accepts them. Known names
/// become numeric references and unknown ones are kept as literal text. The
/// five XML entities and CDATA sections pass through untouched.
fn html_entities_to_xml(s: &str) -> String {
    static RE_ENTITY: OnceCell<Regex> = OnceCell::new();
    let re = RE_ENTITY
        .get_or_init(|| Regex::new(r"&([A-Za-z][A-Za-z0-9]*);").expect("entity regex"));

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("<![CDATA[") {
        let (text, tail) = rest.split_at(start);
        out.push_str(&re.replace_all(text, xml_safe_entity));
        let end = tail.find("]]>").map_or(tail.len(), |i| i + 3);
        out.push_str(&tail[..end]);
        rest = &tail[end..];
    }
    out.push_str(&re.replace_all(rest, xml_safe_entity));
    out
}

fn xml_safe_entity(caps: &Captures<'_>) -> String {
    let name = &caps[1];
    if matches!(name, "amp" | "lt" | "gt" | "quot" | "apos") {
        return caps[0].to_string();
    }
    let decoded = html_escape::decode_html_entities(&caps[0]);
    if decoded == caps[0] {
        return format!("&amp;{name};");
    }
    decoded.chars().map(|c| format!("&#x{:X};", c as u32)).collect()
}
