// src/error.rs

//! Error types for every stage of the aggregator.
//!
//! Startup errors (`ConfigError`, `PersistenceError` on restore) are fatal.
//! `CollectError` is scoped to one source for one cycle, and `RenderError`
//! leaves the previous page cache in place.

use std::path::PathBuf;

use thiserror::Error;

/// Malformed or unreadable source configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("an error in line {path}:{line}: {message}")]
    Syntax {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("an error in record '{name}': {message}")]
    Invalid { name: String, message: String },

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown timezone: {0}")]
    Timezone(String),
}

impl ConfigError {
    pub fn syntax(path: impl Into<PathBuf>, line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            path: path.into(),
            line,
            message: message.into(),
        }
    }

    pub fn invalid(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// One source failed during a cycle.
#[derive(Error, Debug)]
pub enum CollectError {
    /// Network or transport failure while fetching a page or feed.
    #[error("fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetch {url}: unexpected status {status}")]
    Status { url: String, status: u16 },

    /// The feed document could not be parsed as RSS or Atom.
    #[error("{url}: {message}")]
    Feed { url: String, message: String },

    /// A scraped page does not have the expected structure.
    #[error("parse {url}: {message}")]
    Parse { url: String, message: String },

    /// A scraped message carries a malformed or missing timestamp.
    #[error("timestamp {value:?} on {url}: {message}")]
    Timestamp {
        url: String,
        value: String,
        message: String,
    },

    #[error("HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("no fixture for {0}")]
    MissingFixture(String),
}

impl CollectError {
    pub fn parse(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            url: url.into(),
            message: message.into(),
        }
    }

    pub fn feed(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Feed {
            url: url.into(),
            message: message.to_string(),
        }
    }
}

/// Snapshot file problems.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("cannot read snapshot {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed snapshot {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Page rendering failed; the previous cache generation stays in place.
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("page '{tag}': record {url:?} is missing field '{field}'")]
    MissingField {
        tag: String,
        url: String,
        field: &'static str,
    },

    #[error("page formatting failed: {0}")]
    Format(#[from] std::fmt::Error),
}

/// Umbrella error for engine operations.
#[derive(Error, Debug)]
pub enum FeederError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Collect(#[from] CollectError),

    #[error(transparent)]
    Batch(#[from] BatchError),
}

pub type Result<T> = std::result::Result<T, FeederError>;

/// A batch file (records TSV or status file) does not have the expected shape.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("{what} line {line}: {message}")]
    Line {
        what: &'static str,
        line: usize,
        message: String,
    },

    #[error("{what} is empty")]
    Empty { what: &'static str },
}
