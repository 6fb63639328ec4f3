// src/ingest/providers/mod.rs
pub mod channel;
pub mod dom;
pub mod feed;

use std::sync::Arc;

use crate::config::SourceConfig;
use crate::error::CollectError;
use crate::ingest::types::Source;

pub use channel::ChannelSource;
pub use feed::FeedSource;

/// Build live (HTTP-backed) sources from validated configuration.
pub fn build_sources(configs: &[SourceConfig]) -> Result<Vec<Arc<dyn Source>>, CollectError> {
    configs
        .iter()
        .map(|cfg| -> Result<Arc<dyn Source>, CollectError> {
            Ok(match cfg {
                SourceConfig::Rss(c) => Arc::new(FeedSource::from_url(
                    &c.name,
                    &c.url,
                    c.tags.clone(),
                    &c.transport(),
                )?),
                SourceConfig::Telegram(c) => {
                    Arc::new(ChannelSource::new(&c.name, &c.channel, c.tags.clone())?)
                }
            })
        })
        .collect()
}
