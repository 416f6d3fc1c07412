// src/config/mod.rs
//! Runtime configuration: environment (optionally from `.env`) plus an
//! optional pacing TOML file.

pub mod ai;
pub mod pacing;

use anyhow::{anyhow, Result};
use std::path::PathBuf;

pub use ai::AiConfig;
pub use pacing::PacingPolicy;

pub const DEFAULT_CHECKPOINT_PATH: &str = "checkpoints/stock_reports_checkpoint.json";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bot_token: String,
    /// Symbolic destination (`@channel` or numeric chat id).
    pub channel: String,
    pub test_mode: bool,
    /// Stop discovery after the first qualifying report.
    pub single_file_test: bool,
    /// Process only this document, bypassing discovery.
    pub test_document_url: Option<String>,
    pub checkpoint_path: PathBuf,
    pub metrics_textfile: Option<PathBuf>,
    pub ai: AiConfig,
    pub pacing: PacingPolicy,
}

impl AppConfig {
    /// Read from the process environment; pacing from the TOML fallback chain.
    pub fn from_env() -> Result<Self> {
        let mut cfg = Self::from_lookup(|k| std::env::var(k).ok())?;
        cfg.pacing = pacing::load_pacing_default()?;
        Ok(cfg)
    }

    /// Build from an arbitrary key lookup. Pacing stays at its defaults.
    pub fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let test_mode = non_empty("TEST_MODE").is_some_and(|v| is_truthy(&v));
        let single_file_test = non_empty("SINGLE_FILE_TEST").is_some_and(|v| is_truthy(&v));

        let channel = if test_mode {
            non_empty("TEST_TARGET_CHANNEL")
                .ok_or_else(|| anyhow!("TEST_MODE is on but TEST_TARGET_CHANNEL is missing"))?
        } else {
            non_empty("STOCK_REPORT_CHANNEL")
                .or_else(|| non_empty("TARGET_CHANNEL"))
                .ok_or_else(|| anyhow!("Missing STOCK_REPORT_CHANNEL / TARGET_CHANNEL env var"))?
        };

        let bot_token = non_empty("TELEGRAM_BOT_TOKEN")
            .ok_or_else(|| anyhow!("Missing TELEGRAM_BOT_TOKEN env var"))?;

        Ok(Self {
            bot_token,
            channel,
            test_mode,
            single_file_test,
            test_document_url: non_empty("TEST_PDF_URL"),
            checkpoint_path: checkpoint_path_from_lookup(&get),
            metrics_textfile: non_empty("METRICS_TEXTFILE").map(PathBuf::from),
            ai: AiConfig::from_lookup(&get),
            pacing: PacingPolicy::default(),
        })
    }
}

/// `CHECKPOINT_PATH`, or the default location. Needs no credentials.
pub fn checkpoint_path_from_lookup<F>(get: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    get("CHECKPOINT_PATH")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CHECKPOINT_PATH))
}

fn is_truthy(v: &str) -> bool {
    matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
