//! plainwire daemon binary.
//!
//! Reads `plainwire.toml` (or the path given with `--config`), opens the JSON
//! ledger in `data_dir`, and either runs verification cycles, serves the
//! read API, or both.
//!
//! ```text
//! plainwire run --serve     # cycle every interval_minutes, API alongside
//! plainwire once            # one cycle, report printed as JSON
//! plainwire replay          # re-apply pending corrections and exit
//! plainwire serve           # API only, over the ledger as loaded at startup
//! ```

use std::{
  path::PathBuf,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
};

use anyhow::Context as _;
use axum::Router;
use chrono::Utc;
use clap::{Parser, Subcommand};
use plainwire_daemon::{DaemonConfig, HttpOracle, InboxFeed, config::ApiConfig};
use plainwire_pipeline::{CycleContext, Pipeline};
use plainwire_store_json::JsonLedger;
use tokio::{net::TcpListener, sync::Notify};
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

type DaemonPipeline = Pipeline<JsonLedger, HttpOracle, HttpOracle, InboxFeed>;

#[derive(Parser)]
#[command(author, version, about = "plainwire fact-verification daemon")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "plainwire.toml", global = true)]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Run a cycle every `interval_minutes` until stopped.
  Run {
    /// Also serve the read API while cycling.
    #[arg(long)]
    serve: bool,
  },
  /// Run a single cycle and print its report.
  Once,
  /// Re-apply correction records that were never confirmed, then exit.
  Replay,
  /// Serve the read API only.
  Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = DaemonConfig::load(&cli.config)
    .with_context(|| format!("failed to load config from {}", cli.config.display()))?;

  let data_dir = cfg.data_dir();
  let ledger = JsonLedger::open(&data_dir)
    .await
    .with_context(|| format!("failed to open ledger at {}", data_dir.display()))?;

  match cli.command {
    Command::Serve => serve_api(ledger, cfg.api.clone()).await,
    Command::Once => {
      let pipeline = build_pipeline(&cfg, ledger)?;
      let report = pipeline.run_cycle(&CycleContext::new(Utc::now())).await?;
      println!("{}", serde_json::to_string_pretty(&report)?);
      Ok(())
    }
    Command::Replay => {
      let pipeline = build_pipeline(&cfg, ledger)?;
      let summary = pipeline
        .replay_pending(&CycleContext::new(Utc::now()))
        .await?;
      println!("{}", serde_json::to_string_pretty(&summary)?);
      Ok(())
    }
    Command::Run { serve } => {
      if serve {
        let (ledger, api) = (ledger.clone(), cfg.api.clone());
        tokio::spawn(async move {
          if let Err(err) = serve_api(ledger, api).await {
            tracing::error!(error = %format!("{err:#}"), "API server stopped");
          }
        });
      }
      let pipeline = build_pipeline(&cfg, ledger)?;
      run_loop(&pipeline, &cfg).await;
      Ok(())
    }
  }
}

fn build_pipeline(cfg: &DaemonConfig, ledger: JsonLedger) -> anyhow::Result<DaemonPipeline> {
  let registry = cfg.registry().context("invalid source registry")?;
  if registry.len() < 2 {
    tracing::warn!(sources = registry.len(), "fewer than two sources; nothing can be corroborated");
  }
  let oracle = HttpOracle::new(&cfg.oracle).context("failed to build oracle client")?;
  let feed = InboxFeed::new(cfg.inbox_dir());

  Ok(Pipeline::new(
    ledger,
    oracle.clone(),
    oracle,
    feed,
    registry,
    cfg.pipeline.clone(),
  ))
}

/// Cycle until ctrl-c or the kill switch. Ctrl-c during a cycle aborts it
/// at the next step boundary.
async fn run_loop(pipeline: &DaemonPipeline, cfg: &DaemonConfig) {
  let abort = Arc::new(AtomicBool::new(false));
  let shutdown = Arc::new(Notify::new());
  {
    let (abort, shutdown) = (abort.clone(), shutdown.clone());
    tokio::spawn(async move {
      if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown requested");
        abort.store(true, Ordering::SeqCst);
        shutdown.notify_one();
      }
    });
  }

  loop {
    if cfg.kill_switch_engaged() {
      tracing::warn!("kill switch engaged; stopping");
      break;
    }

    let ctx = CycleContext::new(Utc::now()).with_abort(abort.clone());
    let delay = match pipeline.run_cycle(&ctx).await {
      Ok(_) => cfg.interval(),
      Err(err) => {
        tracing::error!(%err, "cycle error");
        cfg.error_backoff()
      }
    };
    if abort.load(Ordering::SeqCst) {
      break;
    }

    tracing::info!(seconds = delay.as_secs(), "sleeping until next cycle");
    tokio::select! {
      _ = tokio::time::sleep(delay) => {}
      _ = shutdown.notified() => break,
    }
  }
  tracing::info!("stopped");
}

async fn serve_api(ledger: JsonLedger, api: ApiConfig) -> anyhow::Result<()> {
  let app = Router::new()
    .nest("/api", plainwire_api::api_router(Arc::new(ledger)))
    .layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", api.host, api.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
