// src/config/pacing.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PATH: &str = "REPORTS_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/pipeline.toml";

/// Pause between listing page fetches.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(1);
/// Pause after each item, delivered or not.
pub const DEFAULT_ITEM_DELAY: Duration = Duration::from_secs(3);
/// Pause after each successful channel message.
pub const DEFAULT_DELIVERY_DELAY: Duration = Duration::from_secs(2);
/// Consecutive pages without a qualifying row before discovery stops.
pub const DEFAULT_EMPTY_PAGE_THRESHOLD: u32 = 5;
/// Hard cap on listing pages per run.
pub const DEFAULT_MAX_PAGES: u32 = 200;

/// Throttle settings for the source and the channel. These are empirical
/// anti-blocking values; change them only with care.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacingPolicy {
    pub page_delay: Duration,
    pub item_delay: Duration,
    pub delivery_delay: Duration,
    pub empty_page_threshold: u32,
    pub max_pages: u32,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            page_delay: DEFAULT_PAGE_DELAY,
            item_delay: DEFAULT_ITEM_DELAY,
            delivery_delay: DEFAULT_DELIVERY_DELAY,
            empty_page_threshold: DEFAULT_EMPTY_PAGE_THRESHOLD,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

impl PacingPolicy {
    /// No delays; thresholds unchanged. Used by tests and smoke runs.
    pub fn immediate() -> Self {
        Self {
            page_delay: Duration::ZERO,
            item_delay: Duration::ZERO,
            delivery_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct PacingFile {
    #[serde(default)]
    pacing: PacingSection,
}

#[derive(Debug, Default, Deserialize)]
struct PacingSection {
    page_delay_ms: Option<u64>,
    item_delay_ms: Option<u64>,
    delivery_delay_ms: Option<u64>,
    empty_page_threshold: Option<u32>,
    max_pages: Option<u32>,
}

/// Load pacing from an explicit TOML file.
pub fn load_pacing_from(path: &Path) -> Result<PacingPolicy> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading pacing config from {}", path.display()))?;
    parse_pacing(&content)
}

/// Load pacing using env var + fallback:
/// 1) $REPORTS_CONFIG_PATH
/// 2) config/pipeline.toml
/// 3) built-in defaults
pub fn load_pacing_default() -> Result<PacingPolicy> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_pacing_from(&pb);
        }
        return Err(anyhow!("REPORTS_CONFIG_PATH points to non-existent path"));
    }
    let default_p = PathBuf::from(DEFAULT_PATH);
    if default_p.exists() {
        return load_pacing_from(&default_p);
    }
    Ok(PacingPolicy::default())
}

fn parse_pacing(s: &str) -> Result<PacingPolicy> {
    let file: PacingFile = toml::from_str(s).context("parsing pacing toml")?;
    let sec = file.pacing;
    let mut p = PacingPolicy::default();

    if let Some(ms) = sec.page_delay_ms {
        p.page_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = sec.item_delay_ms {
        p.item_delay = Duration::from_millis(ms);
    }
    if let Some(ms) = sec.delivery_delay_ms {
        p.delivery_delay = Duration::from_millis(ms);
    }
    // A zero threshold would stop before the first page.
    if let Some(n) = sec.empty_page_threshold.filter(|n| *n > 0) {
        p.empty_page_threshold = n;
    }
    if let Some(n) = sec.max_pages.filter(|n| *n > 0) {
        p.max_pages = n;
    }
    Ok(p)
}
