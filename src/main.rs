//! report-digest — daily analyst report digest, binary entrypoint.
//! Loads configuration, wires the pipeline, and runs one batch (or one
//! explicit document) until done or interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use analyst_report_digest::analyze::OpenAiSummarizer;
use analyst_report_digest::clock::{SystemClock, TokioSleeper};
use analyst_report_digest::config::{self, pacing, AppConfig};
use analyst_report_digest::extract::{HttpDocumentFetcher, PdfFirstPageExtractor};
use analyst_report_digest::ingest::naver::NaverResearchSource;
use analyst_report_digest::ingest::ListingOptions;
use analyst_report_digest::notify::telegram::TelegramTransport;
use analyst_report_digest::notify::Notifier;
use analyst_report_digest::pipeline::{Orchestrator, PipelineContext, RunOutcome};
use analyst_report_digest::processor::ItemProcessor;
use analyst_report_digest::telemetry::Metrics;
use analyst_report_digest::CheckpointStore;

#[derive(Debug, Parser)]
#[command(name = "report-digest", version, about)]
struct Cli {
    /// Delete the saved checkpoint and exit.
    #[arg(long)]
    reset_checkpoint: bool,

    /// Process and post a single document URL, skipping discovery.
    #[arg(long, value_name = "URI")]
    document_url: Option<String>,

    /// Pacing config (TOML). Overrides REPORTS_CONFIG_PATH.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Compact logs by default, JSON when LOG_FORMAT=json. RUST_LOG overrides the filter.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("analyst_report_digest=info,report_digest=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env when present; real env wins.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();

    if cli.reset_checkpoint {
        let store = CheckpointStore::new(config::checkpoint_path_from_lookup(|k| {
            std::env::var(k).ok()
        }));
        store.clear()?;
        tracing::info!(path = %store.path().display(), "checkpoint reset");
        return Ok(());
    }

    let mut cfg = AppConfig::from_env()?;
    if let Some(path) = &cli.config {
        cfg.pacing = pacing::load_pacing_from(path)?;
    }
    tracing::info!(
        channel = %cfg.channel,
        test_mode = cfg.test_mode,
        single_file_test = cfg.single_file_test,
        ai_key_len = cfg.ai.key_len(),
        checkpoint = %cfg.checkpoint_path.display(),
        "configuration loaded"
    );

    let metrics = match &cfg.metrics_textfile {
        Some(p) => Some(Metrics::init(p.clone())?),
        None => None,
    };

    let orchestrator = build(&cfg)?;
    let document_url = cli.document_url.clone().or_else(|| cfg.test_document_url.clone());

    let result = tokio::select! {
        res = run(&orchestrator, document_url.as_deref()) => res,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted; last checkpoint kept for the next run");
            Ok(())
        }
    };

    if let Some(m) = &metrics {
        if let Err(e) = m.flush() {
            tracing::warn!(error = %format!("{e:#}"), path = %m.path().display(), "metrics textfile not written");
        }
    }
    result
}

fn build(cfg: &AppConfig) -> Result<Orchestrator> {
    let sleeper = Arc::new(TokioSleeper);
    let transport = Arc::new(
        TelegramTransport::new(cfg.bot_token.clone()).context("building telegram client")?,
    );
    let processor = ItemProcessor::new(
        Arc::new(HttpDocumentFetcher::new()?),
        Arc::new(PdfFirstPageExtractor),
        Arc::new(OpenAiSummarizer::new(cfg.ai.clone())?),
    );

    Ok(Orchestrator::new(PipelineContext {
        channel_id: cfg.channel.clone(),
        source: Arc::new(NaverResearchSource::new()?),
        processor,
        notifier: Notifier::new(transport, sleeper.clone(), cfg.pacing.delivery_delay),
        store: CheckpointStore::new(cfg.checkpoint_path.clone()),
        clock: Arc::new(SystemClock),
        sleeper,
        pacing: cfg.pacing.clone(),
        listing: ListingOptions {
            stop_after_first: cfg.single_file_test,
        },
    }))
}

async fn run(orchestrator: &Orchestrator, document_url: Option<&str>) -> Result<()> {
    if let Some(uri) = document_url {
        tracing::info!(uri, "single document mode");
        let delivered = orchestrator.run_single_document(uri).await?;
        if !delivered {
            tracing::warn!(uri, "document could not be processed");
        }
        return Ok(());
    }

    match orchestrator.run().await? {
        RunOutcome::NoItems => tracing::info!("no new reports"),
        RunOutcome::Completed {
            total,
            delivered_this_run,
            skipped,
        } => tracing::info!(total, delivered_this_run, skipped, "all reports processed"),
        RunOutcome::Suspended {
            completed,
            total,
            error,
        } => tracing::warn!(completed, total, %error, "run ended early; will resume"),
    }
    Ok(())
}
