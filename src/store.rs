//! # Record Store
//! In-memory `url -> Record` mapping: the single mutable source of truth.
//!
//! - First-seen wins: a url already present is never overwritten.
//! - Retention is the only deletion path (`evict_older_than`).
//! - Iteration follows insertion order, which breaks publish-time ties on
//!   rendered pages and keeps snapshot files stable between cycles.
//! - Snapshots are one pretty-printed JSON object keyed by url, replaced
//!   atomically (temp file + rename).

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset};
use chrono_tz::Tz;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::PersistenceError;
use crate::ingest::types::Record;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordStore {
    /// Insertion order.
    records: Vec<Record>,
    urls: HashSet<String>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.urls.contains(url)
    }

    pub fn get(&self, url: &str) -> Option<&Record> {
        if !self.contains(url) {
            return None;
        }
        self.records.iter().find(|r| r.url == url)
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Insert unless the url is already stored. Returns whether it was added.
    pub fn upsert_if_absent(&mut self, record: Record) -> bool {
        if !self.urls.insert(record.url.clone()) {
            return false;
        }
        self.records.push(record);
        true
    }

    /// Remove every record published before `cutoff`. Returns how many went.
    pub fn evict_older_than(&mut self, cutoff: DateTime<FixedOffset>) -> usize {
        let before = self.records.len();
        let urls = &mut self.urls;
        self.records.retain(|r| {
            let keep = r.published_at >= cutoff;
            if !keep {
                urls.remove(&r.url);
            }
            keep
        });
        before - self.records.len()
    }

    /// Load a snapshot. A missing file is an empty store; anything else that
    /// goes wrong is an error.
    pub fn restore(path: &Path, tz: &Tz) -> Result<Self, PersistenceError> {
        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no snapshot yet; starting empty");
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let loaded: RecordStore =
            serde_json::from_slice(&bytes).map_err(|source| PersistenceError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;

        let mut store = Self::new();
        for mut record in loaded.records {
            // older files carry empty titles for untitled items
            if record.title.trim().is_empty() {
                record.title = record.url.clone();
            }
            store.upsert_if_absent(record.localize(tz));
        }
        tracing::info!(path = %path.display(), count = store.len(), "loaded records from file");
        Ok(store)
    }

    /// Write the whole mapping to `path`, replacing it atomically.
    pub fn snapshot(&self, path: &Path) -> Result<(), PersistenceError> {
        let mut json = serde_json::to_vec_pretty(self)?;
        json.push(b'\n');

        let tmp = tmp_path(path);
        let write_err = |source| PersistenceError::Write {
            path: path.to_path_buf(),
            source,
        };
        {
            let mut f = fs::File::create(&tmp).map_err(write_err)?;
            f.write_all(&json).map_err(write_err)?;
            f.sync_all().map_err(write_err)?;
        }
        fs::rename(&tmp, path).map_err(write_err)?;
        tracing::info!(path = %path.display(), count = self.len(), "saved records to file");
        Ok(())
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "records.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

impl Serialize for RecordStore {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.records.len()))?;
        for r in &self.records {
            map.serialize_entry(&r.url, r)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RecordStore {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct StoreVisitor;

        impl<'de> Visitor<'de> for StoreVisitor {
            type Value = RecordStore;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of url to record")
            }

            // Walks entries in file order so insertion order survives a restart.
            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut store = RecordStore::new();
                while let Some((key, mut record)) = access.next_entry::<String, Record>()? {
                    if record.url.is_empty() {
                        record.url = key;
                    }
                    store.upsert_if_absent(record);
                }
                Ok(store)
            }
        }

        deserializer.deserialize_map(StoreVisitor)
    }
}
