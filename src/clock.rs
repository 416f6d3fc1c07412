// src/clock.rs
//! Injected time: wall clock for the target date, sleeper for pacing.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, Utc};

/// Listing dates are published in Korea Standard Time (UTC+9, no DST).
pub const SOURCE_UTC_OFFSET_SECS: i32 = 9 * 3600;

/// Date format used by the listing (`YY.MM.DD`).
pub const SOURCE_DATE_FORMAT: &str = "%y.%m.%d";

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, d: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
    }
}

/// Records requested sleeps and returns immediately.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    pub calls: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.calls
            .lock()
            .map(|g| g.clone())
            .unwrap_or_default()
    }

    pub fn total(&self) -> Duration {
        self.recorded().into_iter().sum()
    }
}

#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, d: Duration) {
        if let Ok(mut g) = self.calls.lock() {
            g.push(d);
        }
    }
}

/// The day whose reports make up the batch: yesterday in the source's timezone.
pub fn target_date(now: DateTime<Utc>) -> String {
    let yesterday = match FixedOffset::east_opt(SOURCE_UTC_OFFSET_SECS) {
        Some(offset) => (now.with_timezone(&offset) - ChronoDuration::days(1)).date_naive(),
        None => (now - ChronoDuration::days(1)).date_naive(),
    };
    yesterday.format(SOURCE_DATE_FORMAT).to_string()
}
