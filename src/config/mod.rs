// src/config/mod.rs
pub mod sources;

use chrono_tz::Tz;

use crate::error::ConfigError;

pub use sources::{load_sources, ChannelConfig, FeedConfig, SourceConfig};

pub const DEFAULT_TIMEZONE: &str = "Europe/Moscow";
pub const DEFAULT_TAG: &str = "rss";
pub const DEFAULT_FREQUENCY_MINUTES: u64 = 30;
pub const DEFAULT_PERIOD_DAYS: i64 = 14;

/// Resolve an IANA timezone name such as `Europe/Berlin`.
pub fn parse_timezone(name: &str) -> Result<Tz, ConfigError> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| ConfigError::Timezone(name.to_string()))
}
