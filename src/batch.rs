// src/batch.rs
//! Flat files used by `feeder-batch`.
//!
//! Records TSV, one record per line:
//! `unix_ts \t source \t url \t title`
//!
//! Status file:
//! `unix_ts \t failed \t total` on the first line, then one failed source
//! name per line.

use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use chrono_tz::Tz;

use crate::error::BatchError;
use crate::ingest::normalize_title;
use crate::ingest::types::{localize, Record};

const TSV: &str = "records file";
const STATUS: &str = "status file";

/// Outcome of one batch collection, shown as a banner on rendered pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub timestamp: DateTime<Utc>,
    pub failed: usize,
    pub total: usize,
    pub failed_sources: Vec<String>,
}

impl StatusReport {
    pub fn new(timestamp: DateTime<Utc>, total: usize, failed_sources: Vec<String>) -> Self {
        Self {
            timestamp,
            failed: failed_sources.len(),
            total,
            failed_sources,
        }
    }

    pub fn to_text(&self) -> String {
        let mut out = format!(
            "{}\t{}\t{}\n",
            self.timestamp.timestamp(),
            self.failed,
            self.total
        );
        for name in &self.failed_sources {
            out.push_str(name);
            out.push('\n');
        }
        out
    }

    pub fn parse(s: &str) -> Result<Self, BatchError> {
        let mut lines = s.lines();
        let head = lines.next().ok_or(BatchError::Empty { what: STATUS })?;

        let bad_head = || BatchError::Line {
            what: STATUS,
            line: 1,
            message: "first line must consist of 3 numbers".into(),
        };
        let parts: Vec<&str> = head.split('\t').collect();
        let [ts, failed, total] = parts.as_slice() else {
            return Err(bad_head());
        };
        let ts: i64 = ts.trim().parse().map_err(|_| bad_head())?;
        let failed: usize = failed.trim().parse().map_err(|_| bad_head())?;
        let total: usize = total.trim().parse().map_err(|_| bad_head())?;
        let timestamp = Utc.timestamp_opt(ts, 0).single().ok_or_else(bad_head)?;

        let failed_sources: Vec<String> = lines
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect();
        if failed_sources.len() != failed {
            return Err(BatchError::Line {
                what: STATUS,
                line: 1,
                message: format!(
                    "{failed} failed sources announced, {} listed",
                    failed_sources.len()
                ),
            });
        }

        Ok(Self {
            timestamp,
            failed,
            total,
            failed_sources,
        })
    }
}

/// One TSV line for `record`, without the trailing newline.
pub fn format_tsv_line(record: &Record) -> String {
    let clean = |s: &str| normalize_title(&s.replace('\t', " "));
    format!(
        "{}\t{}\t{}\t{}",
        record.published_at.timestamp(),
        clean(&record.source),
        record.url.trim(),
        clean(&record.title)
    )
}

pub fn format_tsv(records: &[Record]) -> String {
    let mut out = String::new();
    for r in records {
        out.push_str(&format_tsv_line(r));
        out.push('\n');
    }
    out
}

/// Parse a records TSV. Every record gets `tags`; both timestamps are the
/// line's timestamp expressed in `tz`.
pub fn parse_tsv(s: &str, tags: &[String], tz: &Tz) -> Result<Vec<Record>, BatchError> {
    let mut out = Vec::new();
    for (i, line) in s.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let lineno = i + 1;
        let err = |message: String| BatchError::Line {
            what: TSV,
            line: lineno,
            message,
        };

        let parts: Vec<&str> = line.splitn(4, '\t').collect();
        let [ts, source, url, title] = parts.as_slice() else {
            return Err(err(format!("expected 4 fields, got {}", parts.len())));
        };
        let ts: i64 = ts
            .trim()
            .parse()
            .map_err(|_| err(format!("'{ts}' is not a timestamp")))?;
        let at: DateTime<FixedOffset> = Utc
            .timestamp_opt(ts, 0)
            .single()
            .ok_or_else(|| err(format!("'{ts}' is out of range")))?
            .fixed_offset();
        let at = localize(at, tz);

        out.push(Record {
            collected_at: at,
            published_at: at,
            title: title.trim().to_string(),
            url: url.trim().to_string(),
            tags: tags.to_vec(),
            source: source.trim().to_string(),
        });
    }
    Ok(out)
}
