//! One-shot tools around the same sources and renderer as the server:
//! `collect` writes a records TSV (and optionally a status file), `render`
//! turns a TSV plus status file into a static HTML page.

use std::fs;
use std::io::Write as _;
use std::path::PathBuf;

use anyhow::Context;
use chrono::{TimeDelta, Utc};
use clap::{Parser, Subcommand};

use feeder::batch::{format_tsv, parse_tsv, StatusReport};
use feeder::config::{load_sources, parse_timezone, DEFAULT_PERIOD_DAYS, DEFAULT_TAG, DEFAULT_TIMEZONE};
use feeder::ingest::collect_all;
use feeder::ingest::providers::build_sources;
use feeder::ingest::types::localize;
use feeder::render::{HtmlRenderer, PageContext, PageRenderer};

#[derive(Parser, Debug)]
#[command(name = "feeder-batch", version, about = "Batch collection and static rendering")]
struct Cli {
    /// IANA timezone for written and displayed times
    #[arg(long, global = true, env = "FEEDER_TZ", default_value = DEFAULT_TIMEZONE)]
    tz: String,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Collect every source once and print records as TSV
    Collect {
        #[arg(long, env = "FEEDER_CFG", default_value = "config.rec")]
        cfg: PathBuf,
        /// Write the status file here
        #[arg(long)]
        status: Option<PathBuf>,
        /// Write records here instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
        /// How many days back to collect
        #[arg(long, env = "FEEDER_PERIOD", default_value_t = DEFAULT_PERIOD_DAYS,
              value_parser = clap::value_parser!(i64).range(1..))]
        period: i64,
    },
    /// Render a records TSV into one HTML page on stdout
    Render {
        #[arg(long, default_value = "records.tsv")]
        records: PathBuf,
        #[arg(long)]
        status: Option<PathBuf>,
        /// Tag shown as the page title
        #[arg(long, default_value = DEFAULT_TAG)]
        tag: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    feeder::init_tracing();

    let cli = Cli::parse();
    let tz = parse_timezone(&cli.tz)?;

    match cli.cmd {
        Cmd::Collect {
            cfg,
            status,
            out,
            period,
        } => {
            let configs = load_sources(&cfg)
                .with_context(|| format!("cannot load sources from {}", cfg.display()))?;
            let sources = build_sources(&configs).context("cannot build HTTP client")?;

            let cutoff = localize(Utc::now().fixed_offset() - TimeDelta::days(period), &tz);
            let mut outcome = collect_all(&sources, cutoff, &tz).await;
            outcome.records.sort_by(|a, b| b.published_at.cmp(&a.published_at));

            let tsv = format_tsv(&outcome.records);
            match &out {
                Some(path) => fs::write(path, tsv)
                    .with_context(|| format!("cannot write {}", path.display()))?,
                None => std::io::stdout()
                    .lock()
                    .write_all(tsv.as_bytes())
                    .context("cannot write records")?,
            }

            if let Some(path) = status {
                let report = StatusReport::new(Utc::now(), sources.len(), outcome.failed_names());
                fs::write(&path, report.to_text())
                    .with_context(|| format!("cannot write {}", path.display()))?;
            }
            tracing::info!(
                records = outcome.records.len(),
                failed = outcome.failed.len(),
                total = sources.len(),
                "batch collection finished"
            );
        }
        Cmd::Render {
            records,
            status,
            tag,
        } => {
            let status = match status {
                Some(path) => {
                    let text = fs::read_to_string(&path)
                        .with_context(|| format!("cannot read {}", path.display()))?;
                    Some(StatusReport::parse(&text)?)
                }
                None => None,
            };

            let text = fs::read_to_string(&records)
                .with_context(|| format!("cannot read {}", records.display()))?;
            let tags = vec![tag.clone()];
            let records = parse_tsv(&text, &tags, &tz)?;
            let mut ordered: Vec<_> = records.iter().collect();
            ordered.sort_by(|a, b| b.published_at.cmp(&a.published_at));

            let page = HtmlRenderer::new().render(&PageContext {
                tag: &tag,
                records: &ordered,
                tags: &tags,
                status: status.as_ref(),
                tz,
            })?;
            std::io::stdout()
                .lock()
                .write_all(&page)
                .context("cannot write page")?;
        }
    }
    Ok(())
}
