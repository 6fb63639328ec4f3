//! # Feed Engine
//! Owns the sources, the record store and the page cache, and runs one
//! update cycle: collect -> upsert -> evict -> snapshot -> regenerate.
//!
//! Cycles are serialized by `cycle_lock`; the store mutex is only taken
//! between awaits, so nothing blocking is held across network IO.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use chrono_tz::Tz;
use metrics::{counter, gauge, histogram};

use crate::error::FeederError;
use crate::ingest::types::{localize, Source};
use crate::ingest::{collect_all, ensure_metrics_described};
use crate::pages::{generate, PageCache};
use crate::render::PageRenderer;
use crate::store::RecordStore;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub snapshot_path: PathBuf,
    /// Retention window; also how far back sources look.
    pub period: TimeDelta,
    pub tz: Tz,
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub inserted: usize,
    pub evicted: usize,
    pub stored: usize,
    pub pages: usize,
    pub failed_sources: Vec<String>,
}

pub struct FeedEngine {
    cfg: EngineConfig,
    sources: Vec<Arc<dyn Source>>,
    store: Mutex<RecordStore>,
    cache: Arc<PageCache>,
    renderer: Box<dyn PageRenderer>,
    cycle_lock: tokio::sync::Mutex<()>,
}

impl FeedEngine {
    /// Restore the snapshot (empty if absent) and render the first pages from
    /// it, so the server has something to show before the first cycle ends.
    pub fn open(
        cfg: EngineConfig,
        sources: Vec<Arc<dyn Source>>,
        renderer: Box<dyn PageRenderer>,
    ) -> Result<Self, FeederError> {
        ensure_metrics_described();

        let store = RecordStore::restore(&cfg.snapshot_path, &cfg.tz)?;
        let cache = Arc::new(PageCache::new());
        cache.replace(generate(store.iter(), cfg.tz, renderer.as_ref())?);
        gauge!("feeder_store_records").set(store.len() as f64);

        tracing::info!(
            sources = sources.len(),
            records = store.len(),
            pages = cache.len(),
            tz = %cfg.tz,
            "engine ready"
        );

        Ok(Self {
            cfg,
            sources,
            store: Mutex::new(store),
            cache,
            renderer,
            cycle_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Shared handle for the HTTP layer.
    pub fn cache(&self) -> Arc<PageCache> {
        Arc::clone(&self.cache)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// Copy of the current store contents.
    pub fn store_snapshot(&self) -> RecordStore {
        self.lock_store().clone()
    }

    pub async fn run_cycle(&self) -> Result<CycleSummary, FeederError> {
        self.run_cycle_at(Utc::now().fixed_offset()).await
    }

    /// One full cycle with `now` as the reference time.
    ///
    /// A failing snapshot write is logged and the cycle goes on. A failing
    /// render keeps the previous pages and is returned as the error.
    pub async fn run_cycle_at(
        &self,
        now: DateTime<FixedOffset>,
    ) -> Result<CycleSummary, FeederError> {
        let _cycle = self.cycle_lock.lock().await;
        let started = Instant::now();
        let cutoff = localize(now - self.cfg.period, &self.cfg.tz);

        let outcome = collect_all(&self.sources, cutoff, &self.cfg.tz).await;
        let failed_sources = outcome.failed_names();

        let (inserted, evicted, stored, pages) = {
            let mut store = self.lock_store();
            let mut inserted = 0;
            for record in outcome.records {
                if store.upsert_if_absent(record) {
                    inserted += 1;
                }
            }
            let evicted = store.evict_older_than(cutoff);

            if let Err(e) = store.snapshot(&self.cfg.snapshot_path) {
                tracing::error!(error = %e, "cannot save records; keeping them in memory");
            }

            let pages = generate(store.iter(), self.cfg.tz, self.renderer.as_ref());
            (inserted, evicted, store.len(), pages)
        };

        counter!("feeder_records_inserted_total").increment(inserted as u64);
        counter!("feeder_records_evicted_total").increment(evicted as u64);
        gauge!("feeder_store_records").set(stored as f64);

        let pages = match pages {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "page generation failed; keeping previous pages");
                return Err(e.into());
            }
        };
        let page_count = pages.len();
        self.cache.replace(pages);

        histogram!("feeder_cycle_ms").record(started.elapsed().as_secs_f64() * 1000.0);
        gauge!("feeder_last_cycle_ts").set(Utc::now().timestamp() as f64);

        tracing::info!(
            inserted,
            evicted,
            stored,
            pages = page_count,
            failed = failed_sources.len(),
            total = self.sources.len(),
            "update cycle finished"
        );

        Ok(CycleSummary {
            inserted,
            evicted,
            stored,
            pages: page_count,
            failed_sources,
        })
    }

    fn lock_store(&self) -> MutexGuard<'_, RecordStore> {
        match self.store.lock() {
            Ok(g) => g,
            Err(poison) => poison.into_inner(),
        }
    }
}
