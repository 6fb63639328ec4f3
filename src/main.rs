//! feeder server entrypoint.
//! Loads sources, restores the snapshot, starts the update scheduler and
//! serves the page cache over HTTP until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::TimeDelta;
use clap::Parser;

use feeder::config::{
    load_sources, parse_timezone, DEFAULT_FREQUENCY_MINUTES, DEFAULT_PERIOD_DAYS, DEFAULT_TAG,
    DEFAULT_TIMEZONE,
};
use feeder::ingest::providers::build_sources;
use feeder::metrics::Metrics;
use feeder::{create_router, AppState, EngineConfig, FeedEngine, HtmlRenderer, UpdateScheduler};

#[derive(Parser, Debug)]
#[command(name = "feeder", version, about = "Feed and channel aggregator")]
struct Cli {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(long, env = "FEEDER_LISTEN")]
    listen: SocketAddr,

    /// Records snapshot file
    #[arg(long, env = "FEEDER_DB", default_value = "records.json")]
    db: PathBuf,

    /// Source list (.toml, .json or record format)
    #[arg(long, env = "FEEDER_CFG", default_value = "config.rec")]
    cfg: PathBuf,

    /// IANA timezone for stored and displayed times
    #[arg(long, env = "FEEDER_TZ", default_value = DEFAULT_TIMEZONE)]
    tz: String,

    /// Minutes between update cycles
    #[arg(long, env = "FEEDER_FREQ", default_value_t = DEFAULT_FREQUENCY_MINUTES,
          value_parser = clap::value_parser!(u64).range(1..))]
    freq: u64,

    /// Retention period in days
    #[arg(long, env = "FEEDER_PERIOD", default_value_t = DEFAULT_PERIOD_DAYS,
          value_parser = clap::value_parser!(i64).range(1..))]
    period: i64,

    /// Tag served at `/`
    #[arg(long, env = "FEEDER_DEFAULT_TAG", default_value = DEFAULT_TAG)]
    default_tag: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    feeder::init_tracing();

    let cli = Cli::parse();
    let tz = parse_timezone(&cli.tz)?;

    let configs = load_sources(&cli.cfg)
        .with_context(|| format!("cannot load sources from {}", cli.cfg.display()))?;
    tracing::info!(count = configs.len(), path = %cli.cfg.display(), "sources loaded");
    let sources = build_sources(&configs).context("cannot build HTTP client")?;

    let metrics = Metrics::init(sources.len(), cli.period)?;

    let engine = FeedEngine::open(
        EngineConfig {
            snapshot_path: cli.db.clone(),
            period: TimeDelta::days(cli.period),
            tz,
        },
        sources,
        Box::new(HtmlRenderer::new()),
    )
    .with_context(|| format!("cannot open records from {}", cli.db.display()))?;
    let engine = Arc::new(engine);

    let state = AppState::new(engine.cache(), cli.default_tag.as_str());
    let app = create_router(state).merge(metrics.router());

    let scheduler =
        UpdateScheduler::start(Arc::clone(&engine), Duration::from_secs(cli.freq * 60));

    let listener = tokio::net::TcpListener::bind(cli.listen)
        .await
        .with_context(|| format!("cannot listen on {}", cli.listen))?;
    tracing::info!(addr = %cli.listen, "serving");

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    tracing::info!("http server stopped; waiting for the update cycle");
    scheduler.stop().await;

    served.context("http server failed")
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
