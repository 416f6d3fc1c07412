// src/notify/mod.rs
pub mod telegram;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use thiserror::Error;

use crate::clock::Sleeper;
use crate::report::ProcessedReport;

/// Telegram rejects messages over 4096 characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;
const MAX_SUMMARY_CHARS: usize = 3500;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("rate limited; retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("transport error: {0}")]
    Failed(String),
    /// Not a per-message problem (e.g. credentials rejected); the run should stop.
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// A resolved destination, reused for every message in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelHandle {
    pub chat_id: String,
    pub title: Option<String>,
}

#[async_trait::async_trait]
pub trait MessagingTransport: Send + Sync {
    async fn resolve(&self, channel_id: &str) -> Result<ChannelHandle, TransportError>;
    async fn send(&self, channel: &ChannelHandle, text: &str) -> Result<(), TransportError>;
    fn name(&self) -> &'static str;
}

/// Delivers messages with the single-retry rate-limit policy and fixed
/// post-send pacing.
pub struct Notifier {
    transport: Arc<dyn MessagingTransport>,
    sleeper: Arc<dyn Sleeper>,
    delivery_delay: Duration,
}

impl Notifier {
    pub fn new(
        transport: Arc<dyn MessagingTransport>,
        sleeper: Arc<dyn Sleeper>,
        delivery_delay: Duration,
    ) -> Self {
        Self {
            transport,
            sleeper,
            delivery_delay,
        }
    }

    pub async fn resolve(&self, channel_id: &str) -> Result<ChannelHandle, TransportError> {
        let transport = self.transport.as_ref();
        let handle = self
            .retry_once("resolve", || transport.resolve(channel_id))
            .await?;
        tracing::info!(
            channel = channel_id,
            chat_id = %handle.chat_id,
            title = handle.title.as_deref().unwrap_or("-"),
            transport = self.transport.name(),
            "channel resolved"
        );
        Ok(handle)
    }

    pub async fn deliver(&self, channel: &ChannelHandle, text: &str) -> Result<(), TransportError> {
        let transport = self.transport.as_ref();
        self.retry_once("send", || transport.send(channel, text))
            .await?;
        self.sleeper.sleep(self.delivery_delay).await;
        Ok(())
    }

    /// On a rate-limit signal wait exactly the requested time and try once
    /// more. Whatever the second attempt returns is final.
    async fn retry_once<T, F, Fut>(&self, op: &'static str, attempt: F) -> Result<T, TransportError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        match attempt().await {
            Err(TransportError::RateLimited { retry_after_secs }) => {
                counter!("delivery_rate_limited_total").increment(1);
                tracing::warn!(op, retry_after_secs, "rate limited; retrying once");
                self.sleeper
                    .sleep(Duration::from_secs(retry_after_secs))
                    .await;
                attempt().await
            }
            other => other,
        }
    }
}

/// Escape characters that Telegram's legacy Markdown treats as markup.
pub fn escape_markdown(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if matches!(ch, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    // A backslash cut off from the character it escaped would escape the ellipsis.
    if out.ends_with('\\') {
        out.pop();
    }
    out.push('…');
    out
}

/// Report card in legacy Markdown. The summary is escaped first and then cut
/// to whatever room the rest of the card leaves, so the PDF link always fits.
pub fn format_report(report: &ProcessedReport) -> String {
    let it = &report.item;
    let company = escape_markdown(&it.company);
    let issuer = escape_markdown(&it.issuer);
    let title = escape_markdown(&it.title);
    let date = escape_markdown(&it.published);
    let views = escape_markdown(&it.view_count);
    let render = |summary: &str| {
        format!(
            "📊 *{company} 투자 리포트*\n\n\
             🏢 *연구사*: {issuer}\n\
             📋 *제목*: {title}\n\
             📅 *날짜*: {date}\n\
             👁️ *조회수*: {views}\n\n\
             📝 *요약*:\n{summary}\n\n\
             🔗 *원본 PDF*: [다운로드]({uri})",
            uri = it.document_uri,
        )
    };

    let frame = render("").chars().count();
    let room = MAX_MESSAGE_CHARS.saturating_sub(frame).min(MAX_SUMMARY_CHARS);
    let summary = truncate_chars(&escape_markdown(&report.summary), room);
    truncate_chars(&render(&summary), MAX_MESSAGE_CHARS)
}

pub fn no_items_notice() -> String {
    "📊 어제 등록된 새로운 투자 리포트가 없습니다.".to_string()
}

pub fn completion_notice(total: usize) -> String {
    format!("✅ 어제 등록된 {total}개 투자 리포트 처리 완료!")
}
