// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod batch;
pub mod config;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod pages;
pub mod render;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::engine::{CycleSummary, EngineConfig, FeedEngine};
pub use crate::error::{FeederError, Result};
pub use crate::ingest::scheduler::UpdateScheduler;
pub use crate::pages::PageCache;
pub use crate::render::{HtmlRenderer, PageRenderer};
pub use crate::store::RecordStore;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_FORMAT: &str = "FEEDER_LOG_FORMAT";
const DEFAULT_LOG_FILTER: &str = "feeder=info,tower_http=info,warn";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` overrides the default filter; `FEEDER_LOG_FORMAT=json` switches
/// to one JSON object per line.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let json = std::env::var(ENV_LOG_FORMAT)
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}
