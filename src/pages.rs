// src/pages.rs
//! Tag-partitioned page cache.
//!
//! A generation is built off-lock by [`generate`] and published with
//! [`PageCache::replace`]; readers always see one complete generation.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use chrono_tz::Tz;
use metrics::gauge;

use crate::batch::StatusReport;
use crate::error::RenderError;
use crate::ingest::types::Record;
use crate::render::{PageContext, PageRenderer};

pub type Pages = HashMap<String, Bytes>;

/// Render one page per tag from `records`.
///
/// Each page lists its records newest first; equal timestamps keep the
/// order of `records`.
pub fn generate<'a, I>(
    records: I,
    tz: Tz,
    renderer: &dyn PageRenderer,
) -> Result<Pages, RenderError>
where
    I: IntoIterator<Item = &'a Record>,
{
    generate_with_status(records, tz, renderer, None)
}

pub fn generate_with_status<'a, I>(
    records: I,
    tz: Tz,
    renderer: &dyn PageRenderer,
    status: Option<&StatusReport>,
) -> Result<Pages, RenderError>
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut by_tag: HashMap<&str, Vec<&Record>> = HashMap::new();
    for r in records {
        let unique: BTreeSet<&str> = r.tags.iter().map(String::as_str).collect();
        for tag in unique {
            by_tag.entry(tag).or_default().push(r);
        }
    }

    let mut tags: Vec<String> = by_tag.keys().map(|t| t.to_string()).collect();
    tags.sort();

    let mut pages = HashMap::with_capacity(by_tag.len());
    for (tag, mut group) in by_tag {
        // stable: ties stay in insertion order
        group.sort_by(|a, b| b.published_at.cmp(&a.published_at));
        let body = renderer.render(&PageContext {
            tag,
            records: &group,
            tags: &tags,
            status,
            tz,
        })?;
        pages.insert(tag.to_string(), Bytes::from(body));
    }
    Ok(pages)
}

#[derive(Debug, Default)]
pub struct PageCache {
    inner: RwLock<Arc<Pages>>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a new generation. The previous one is dropped after the swap,
    /// outside the lock.
    pub fn replace(&self, pages: Pages) {
        let count = pages.len();
        let fresh = Arc::new(pages);
        let old = match self.inner.write() {
            Ok(mut g) => std::mem::replace(&mut *g, fresh),
            Err(poison) => std::mem::replace(&mut *poison.into_inner(), fresh),
        };
        drop(old);
        gauge!("feeder_pages").set(count as f64);
    }

    pub fn get(&self, tag: &str) -> Option<Bytes> {
        self.current().get(tag).cloned()
    }

    /// Sorted tag names of the current generation.
    pub fn tags(&self) -> Vec<String> {
        let mut tags: Vec<String> = self.current().keys().cloned().collect();
        tags.sort();
        tags
    }

    pub fn len(&self) -> usize {
        self.current().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn current(&self) -> Arc<Pages> {
        match self.inner.read() {
            Ok(g) => Arc::clone(&g),
            Err(poison) => Arc::clone(&poison.into_inner()),
        }
    }
}
