// src/render.rs
//! Page rendering.

use std::fmt::Write as _;

use chrono_tz::Tz;
use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::batch::StatusReport;
use crate::error::RenderError;
use crate::ingest::types::Record;

/// Everything one tag page is rendered from.
#[derive(Debug, Clone, Copy)]
pub struct PageContext<'a> {
    pub tag: &'a str,
    /// Already ordered, newest first.
    pub records: &'a [&'a Record],
    /// All tags, sorted, for navigation.
    pub tags: &'a [String],
    pub status: Option<&'a StatusReport>,
    /// Zone the status time is shown in; records already carry theirs.
    pub tz: Tz,
}

pub trait PageRenderer: Send + Sync {
    fn render(&self, ctx: &PageContext<'_>) -> Result<Vec<u8>, RenderError>;
}

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

const STYLE: &str = "body{font-family:sans-serif;max-width:60em;margin:1em auto;padding:0 1em}\
nav a{margin-right:.6em}nav a.current{font-weight:bold}\
table{border-collapse:collapse;width:100%}td{padding:.2em .5em;vertical-align:top}\
td.date,td.source{white-space:nowrap;color:#666}\
.status{background:#fff3cd;padding:.5em;margin-bottom:1em}";

/// Self-contained HTML page: tag navigation plus one table row per record.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlRenderer;

impl HtmlRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl PageRenderer for HtmlRenderer {
    fn render(&self, ctx: &PageContext<'_>) -> Result<Vec<u8>, RenderError> {
        let missing = |r: &Record, field| RenderError::MissingField {
            tag: ctx.tag.to_string(),
            url: r.url.clone(),
            field,
        };

        let mut out = String::with_capacity(1024 + ctx.records.len() * 256);
        writeln!(out, "<!DOCTYPE html>")?;
        writeln!(out, "<html><head><meta charset=\"utf-8\">")?;
        writeln!(out, "<title>{}</title>", encode_text(ctx.tag))?;
        writeln!(out, "<style>{STYLE}</style>")?;
        writeln!(out, "</head><body>")?;

        write!(out, "<nav>")?;
        for t in ctx.tags {
            let class = if t == ctx.tag { " class=\"current\"" } else { "" };
            write!(
                out,
                "<a href=\"/{}\"{class}>{}</a>",
                encode_double_quoted_attribute(t),
                encode_text(t)
            )?;
        }
        writeln!(out, "</nav>")?;

        if let Some(status) = ctx.status {
            let updated = status.timestamp.with_timezone(&ctx.tz);
            write!(
                out,
                "<div class=\"status\">Updated {} {}: {} of {} sources failed",
                updated.format(DATE_FORMAT),
                updated.format("%Z"),
                status.failed,
                status.total
            )?;
            if !status.failed_sources.is_empty() {
                write!(out, " (")?;
                for (i, name) in status.failed_sources.iter().enumerate() {
                    if i > 0 {
                        write!(out, ", ")?;
                    }
                    write!(out, "{}", encode_text(name))?;
                }
                write!(out, ")")?;
            }
            writeln!(out, "</div>")?;
        }

        writeln!(out, "<table>")?;
        for &r in ctx.records {
            if r.url.trim().is_empty() {
                return Err(missing(r, "url"));
            }
            let title = if r.title.trim().is_empty() { &r.url } else { &r.title };
            writeln!(
                out,
                "<tr><td class=\"date\">{}</td><td class=\"source\">{}</td><td><a href=\"{}\">{}</a></td></tr>",
                r.published_at.format(DATE_FORMAT),
                encode_text(&r.source),
                encode_double_quoted_attribute(&r.url),
                encode_text(title)
            )?;
        }
        writeln!(out, "</table>")?;
        writeln!(out, "</body></html>")?;

        Ok(out.into_bytes())
    }
}
