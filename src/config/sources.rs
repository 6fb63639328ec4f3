// src/config/sources.rs
//! Source list loading.
//!
//! Supported formats, chosen by file extension:
//! - `.toml`: `[[source]]` tables with a `type` key
//! - `.json`: an array of objects with a `type` key
//! - anything else: record format, `field: value` lines with a blank line
//!   between records, `#` comments, comma separated `tags`

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use url::Url;

use crate::error::ConfigError;
use crate::ingest::fetch::Transport;

/// Tag every feed source gets in addition to its own.
pub const FEED_KIND_TAG: &str = "rss";
/// Tag every channel source gets in addition to its own.
pub const CHANNEL_KIND_TAG: &str = "telegram";
/// Paths the server routes itself; a tag page under these names is unreachable.
pub const RESERVED_TAGS: &[&str] = &["health", "metrics"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Rss(FeedConfig),
    Telegram(ChannelConfig),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedConfig {
    pub name: String,
    pub url: String,
    pub tags: Vec<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub http1_only: Option<bool>,
}

impl FeedConfig {
    /// Explicit overrides on top of the per-host defaults.
    pub fn transport(&self) -> Transport {
        let mut t = Transport::for_url(&self.url);
        if let Some(agent) = &self.user_agent {
            t.user_agent = Some(agent.clone());
        }
        if let Some(h1) = self.http1_only {
            t.http1_only = h1;
        }
        t
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelConfig {
    pub name: String,
    pub channel: String,
    pub tags: Vec<String>,
}

impl SourceConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::Rss(c) => &c.name,
            Self::Telegram(c) => &c.name,
        }
    }

    pub fn tags(&self) -> &[String] {
        match self {
            Self::Rss(c) => &c.tags,
            Self::Telegram(c) => &c.tags,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let name = self.name();
        if name.trim().is_empty() {
            return Err(ConfigError::invalid(name, "empty field 'name'"));
        }
        match self {
            Self::Rss(c) => {
                let url = Url::parse(&c.url)
                    .map_err(|e| ConfigError::invalid(name, format!("bad url '{}': {e}", c.url)))?;
                if !matches!(url.scheme(), "http" | "https") {
                    return Err(ConfigError::invalid(
                        name,
                        format!("unsupported url scheme '{}'", url.scheme()),
                    ));
                }
            }
            Self::Telegram(c) => {
                let ch = c.channel.trim();
                if ch.is_empty() || ch.contains('/') || ch.contains(char::is_whitespace) {
                    return Err(ConfigError::invalid(
                        name,
                        format!("bad channel handle '{}'", c.channel),
                    ));
                }
            }
        }
        if let Some(tag) = self.tags().iter().find(|t| RESERVED_TAGS.contains(&t.trim())) {
            return Err(ConfigError::invalid(
                name,
                format!("tag '{}' is reserved", tag.trim()),
            ));
        }
        Ok(())
    }

    /// Trim tags, drop empties and duplicates, append the kind tag.
    fn finalize(mut self) -> Self {
        let (tags, kind) = match &mut self {
            Self::Rss(c) => (&mut c.tags, FEED_KIND_TAG),
            Self::Telegram(c) => {
                c.channel = c.channel.trim().trim_start_matches('@').to_string();
                (&mut c.tags, CHANNEL_KIND_TAG)
            }
        };
        let mut seen = HashSet::new();
        let mut clean: Vec<String> = tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && seen.insert(t.clone()))
            .collect();
        if seen.insert(kind.to_string()) {
            clean.push(kind.to_string());
        }
        *tags = clean;
        self
    }
}

/// Load, validate and normalize the source list at `path`.
pub fn load_sources(path: &Path) -> Result<Vec<SourceConfig>, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let raw = match ext.as_str() {
        "toml" => parse_toml(&content)?,
        "json" => serde_json::from_str(&content)?,
        _ => parse_records(&content, path)?,
    };
    finish(raw)
}

fn finish(raw: Vec<SourceConfig>) -> Result<Vec<SourceConfig>, ConfigError> {
    let mut names = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());
    for cfg in raw {
        cfg.validate()?;
        if !names.insert(cfg.name().to_string()) {
            return Err(ConfigError::invalid(cfg.name(), "duplicate source name"));
        }
        out.push(cfg.finalize());
    }
    Ok(out)
}

fn parse_toml(s: &str) -> Result<Vec<SourceConfig>, ConfigError> {
    #[derive(Deserialize)]
    struct TomlSources {
        #[serde(default)]
        source: Vec<SourceConfig>,
    }
    let v: TomlSources = toml::from_str(s)?;
    Ok(v.source)
}

/// Parse the record format. `path` only labels error messages.
pub fn parse_records(s: &str, path: &Path) -> Result<Vec<SourceConfig>, ConfigError> {
    let mut sources = Vec::new();
    let mut record: BTreeMap<String, String> = BTreeMap::new();

    let mut lines = s.lines().enumerate();
    loop {
        let next = lines.next();
        let lineno = next.map(|(i, _)| i + 1).unwrap_or_else(|| s.lines().count() + 1);
        let line = next.map(|(_, l)| l.trim()).unwrap_or_default();

        if line.starts_with('#') {
            continue;
        }
        if next.is_none() || line.is_empty() {
            if !record.is_empty() {
                sources.push(record_to_source(&record, path, lineno)?);
                record.clear();
            }
            if next.is_none() {
                break;
            }
            continue;
        }

        let (field, value) = line
            .split_once(':')
            .ok_or_else(|| ConfigError::syntax(path, lineno, "unknown format"))?;
        record.insert(field.trim().to_string(), value.trim().to_string());
    }

    Ok(sources)
}

fn record_to_source(
    record: &BTreeMap<String, String>,
    path: &Path,
    lineno: usize,
) -> Result<SourceConfig, ConfigError> {
    let name = record
        .get("name")
        .ok_or_else(|| ConfigError::syntax(path, lineno, "missing field 'name'"))?
        .clone();
    let typ = record
        .get("type")
        .ok_or_else(|| ConfigError::syntax(path, lineno, "field 'type' not found"))?;
    let field = |key: &str| {
        record
            .get(key)
            .cloned()
            .ok_or_else(|| ConfigError::invalid(&name, format!("missing field '{key}'")))
    };
    let tags: Vec<String> = field("tags")?.split(',').map(|t| t.to_string()).collect();

    match typ.as_str() {
        "rss" => {
            let http1_only = match record.get("http1_only").map(|v| v.to_ascii_lowercase()) {
                None => None,
                Some(v) if matches!(v.as_str(), "true" | "yes" | "1") => Some(true),
                Some(v) if matches!(v.as_str(), "false" | "no" | "0") => Some(false),
                Some(v) => {
                    return Err(ConfigError::invalid(
                        &name,
                        format!("bad value '{v}' for 'http1_only'"),
                    ))
                }
            };
            Ok(SourceConfig::Rss(FeedConfig {
                url: field("url")?,
                user_agent: record.get("user_agent").cloned(),
                http1_only,
                name,
                tags,
            }))
        }
        "telegram" => Ok(SourceConfig::Telegram(ChannelConfig {
            channel: field("channel")?,
            name,
            tags,
        })),
        other => Err(ConfigError::syntax(
            path,
            lineno,
            format!("unknown type '{other}'"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REC: &str = "\
# news
name: Rust Blog
type: rss
url: https://blog.rust-lang.org/feed.xml
tags: rust, blogs


name: Durov
type: telegram
channel: @durov
tags: news
";

    #[test]
    fn record_format_parses_blocks() {
        let raw = parse_records(REC, Path::new("config.rec")).unwrap();
        let out = finish(raw).unwrap();
        assert_eq!(out.len(), 2);
        match &out[0] {
            SourceConfig::Rss(c) => {
                assert_eq!(c.url, "https://blog.rust-lang.org/feed.xml");
                assert_eq!(c.tags, vec!["rust", "blogs", "rss"]);
            }
            other => panic!("expected rss, got {other:?}"),
        }
        match &out[1] {
            SourceConfig::Telegram(c) => {
                assert_eq!(c.channel, "durov");
                assert_eq!(c.tags, vec!["news", "telegram"]);
            }
            other => panic!("expected telegram, got {other:?}"),
        }
    }

    #[test]
    fn record_format_reports_line_numbers() {
        let err = parse_records("name: a\ntype rss\n", Path::new("c.rec")).unwrap_err();
        assert_eq!(err.to_string(), "an error in line c.rec:2: unknown format");

        let err = parse_records("type: rss\nurl: https://x.test\n", Path::new("c.rec")).unwrap_err();
        assert!(err.to_string().contains("missing field 'name'"), "{err}");

        let err = parse_records("name: a\ntype: gopher\ntags: x\n", Path::new("c.rec")).unwrap_err();
        assert!(err.to_string().contains("unknown type 'gopher'"), "{err}");
    }

    #[test]
    fn toml_and_json_share_the_schema() {
        let toml = r#"
[[source]]
type = "rss"
name = "Reddit Rust"
url = "https://www.reddit.com/r/rust/.rss"
tags = ["rust"]
http1_only = false
"#;
        let out = finish(parse_toml(toml).unwrap()).unwrap();
        let SourceConfig::Rss(feed) = &out[0] else {
            panic!("expected rss");
        };
        let t = feed.transport();
        assert!(t.user_agent.is_some(), "reddit default agent kept");
        assert!(!t.http1_only, "explicit override wins");

        let json = r#"[{"type":"telegram","name":"Demo","channel":"demo","tags":[]}]"#;
        let out = finish(serde_json::from_str(json).unwrap()).unwrap();
        assert_eq!(out[0].tags(), ["telegram".to_string()]);
    }

    #[test]
    fn invalid_entries_are_rejected() {
        let dup = vec![
            SourceConfig::Telegram(ChannelConfig {
                name: "A".into(),
                channel: "a".into(),
                tags: vec![],
            }),
            SourceConfig::Telegram(ChannelConfig {
                name: "A".into(),
                channel: "b".into(),
                tags: vec![],
            }),
        ];
        assert!(matches!(finish(dup), Err(ConfigError::Invalid { .. })));

        let bad_url = vec![SourceConfig::Rss(FeedConfig {
            name: "B".into(),
            url: "ftp://example.com/feed".into(),
            tags: vec![],
            user_agent: None,
            http1_only: None,
        })];
        assert!(matches!(finish(bad_url), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn route_names_cannot_be_tags() {
        for tag in [" health", "metrics"] {
            let raw = vec![SourceConfig::Telegram(ChannelConfig {
                name: "C".into(),
                channel: "c".into(),
                tags: vec!["news".into(), tag.into()],
            })];
            let err = finish(raw).unwrap_err();
            assert!(err.to_string().contains("is reserved"), "{err}");
        }
    }

    #[test]
    fn load_dispatches_on_extension() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("sources.json");
        fs::write(
            &p,
            r#"[{"type":"rss","name":"X","url":"https://x.test/feed","tags":["a"]}]"#,
        )
        .unwrap();
        let out = load_sources(&p).unwrap();
        assert_eq!(out[0].tags(), ["a".to_string(), "rss".to_string()]);

        let missing = load_sources(&dir.path().join("nope.rec")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }
}
