// src/processor.rs
//! Turns one discovered report into a summarized `ProcessedReport`.

use std::sync::Arc;

use anyhow::{anyhow, Result};

use crate::analyze::{Summarizer, SummaryRequest};
use crate::extract::{DocumentFetcher, ExtractError, TextExtractor};
use crate::report::{ProcessedReport, ReportItem};

/// Shorter first pages are treated as scans or broken extraction.
pub const MIN_TEXT_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    FetchFailed(String),
    ExtractionFailed(String),
    TextTooShort(usize),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::FetchFailed(e) => write!(f, "document fetch failed: {e}"),
            SkipReason::ExtractionFailed(e) => write!(f, "text extraction failed: {e}"),
            SkipReason::TextTooShort(n) => {
                write!(f, "extracted text too short ({n} < {MIN_TEXT_CHARS} chars)")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Ready(ProcessedReport),
    Skipped(SkipReason),
}

pub struct ItemProcessor {
    fetcher: Arc<dyn DocumentFetcher>,
    extractor: Arc<dyn TextExtractor>,
    summarizer: Arc<dyn Summarizer>,
}

impl ItemProcessor {
    pub fn new(
        fetcher: Arc<dyn DocumentFetcher>,
        extractor: Arc<dyn TextExtractor>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            summarizer,
        }
    }

    /// Item-local failures come back as `Skipped`; `Err` means the run
    /// itself cannot continue.
    pub async fn process(&self, item: &ReportItem) -> Result<ItemOutcome> {
        tracing::info!(company = %item.company, uri = %item.document_uri, "downloading report");

        let payload = match self.fetcher.fetch(&item.document_uri).await {
            Ok(p) => p,
            Err(e) => {
                return Ok(ItemOutcome::Skipped(SkipReason::FetchFailed(format!(
                    "{e:#}"
                ))))
            }
        };
        tracing::debug!(bytes = payload.len(), "report downloaded");

        let text = match self.extractor.first_page_text(payload).await {
            Ok(t) => t,
            Err(ExtractError::Cancelled) => return Err(anyhow!("text extraction cancelled")),
            Err(e) => {
                return Ok(ItemOutcome::Skipped(SkipReason::ExtractionFailed(
                    e.to_string(),
                )))
            }
        };

        let text_length = text.chars().count();
        tracing::debug!(
            text_length,
            preview = %text.chars().take(200).collect::<String>(),
            "first page extracted"
        );
        if text_length < MIN_TEXT_CHARS {
            return Ok(ItemOutcome::Skipped(SkipReason::TextTooShort(text_length)));
        }

        tracing::debug!(
            provider = self.summarizer.provider_name(),
            company = %item.company,
            "requesting summary"
        );
        let summary = self
            .summarizer
            .summarize(SummaryRequest {
                text: &text,
                company: &item.company,
                title: &item.title,
                issuer: &item.issuer,
            })
            .await;

        Ok(ItemOutcome::Ready(ProcessedReport {
            item: item.clone(),
            extracted_text: text,
            summary,
            text_length,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyze::FixedSummarizer;
    use crate::report::sample_item;
    use async_trait::async_trait;

    struct BytesFetcher(Option<Vec<u8>>);

    #[async_trait]
    impl DocumentFetcher for BytesFetcher {
        async fn fetch(&self, _uri: &str) -> Result<Vec<u8>> {
            self.0.clone().ok_or_else(|| anyhow!("HTTP 404"))
        }
    }

    /// Treats the payload as UTF-8 text.
    struct Utf8Extractor;

    #[async_trait]
    impl TextExtractor for Utf8Extractor {
        async fn first_page_text(&self, payload: Vec<u8>) -> Result<String, ExtractError> {
            String::from_utf8(payload).map_err(|e| ExtractError::Unreadable(e.to_string()))
        }
    }

    fn processor(body: Option<&str>) -> ItemProcessor {
        ItemProcessor::new(
            Arc::new(BytesFetcher(body.map(|b| b.as_bytes().to_vec()))),
            Arc::new(Utf8Extractor),
            Arc::new(FixedSummarizer {
                fixed: "요약".into(),
            }),
        )
    }

    #[tokio::test]
    async fn fetch_failure_is_a_skip() {
        let out = processor(None).process(&sample_item(0)).await.unwrap();
        assert!(matches!(out, ItemOutcome::Skipped(SkipReason::FetchFailed(_))));
    }

    #[tokio::test]
    async fn short_text_is_a_skip() {
        let text = "x".repeat(40);
        let out = processor(Some(&text)).process(&sample_item(0)).await.unwrap();
        assert_eq!(out, ItemOutcome::Skipped(SkipReason::TextTooShort(40)));
    }

    #[tokio::test]
    async fn length_counts_chars_not_bytes() {
        // 49 Hangul syllables are 147 bytes but still too short.
        let text = "가".repeat(49);
        let out = processor(Some(&text)).process(&sample_item(0)).await.unwrap();
        assert_eq!(out, ItemOutcome::Skipped(SkipReason::TextTooShort(49)));
    }

    #[tokio::test]
    async fn long_enough_text_is_summarized() {
        let text = "투자의견 매수, 목표주가 상향. ".repeat(5);
        let item = sample_item(3);
        let out = processor(Some(&text)).process(&item).await.unwrap();
        match out {
            ItemOutcome::Ready(r) => {
                assert_eq!(r.item, item);
                assert_eq!(r.summary, "요약");
                assert_eq!(r.text_length, text.chars().count());
            }
            other => panic!("expected Ready, got {other:?}"),
        }
    }

    struct CancelledExtractor;

    #[async_trait]
    impl TextExtractor for CancelledExtractor {
        async fn first_page_text(&self, _payload: Vec<u8>) -> Result<String, ExtractError> {
            Err(ExtractError::Cancelled)
        }
    }

    #[tokio::test]
    async fn cancelled_extraction_is_fatal() {
        let p = ItemProcessor::new(
            Arc::new(BytesFetcher(Some(vec![1, 2, 3]))),
            Arc::new(CancelledExtractor),
            Arc::new(FixedSummarizer { fixed: "x".into() }),
        );
        assert!(p.process(&sample_item(0)).await.is_err());
    }
}
