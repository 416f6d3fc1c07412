// src/extract.rs
//! Document download and first-page text extraction.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::ingest::naver::BROWSER_USER_AGENT;

#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>>;
}

pub struct HttpDocumentFetcher {
    client: reqwest::Client,
}

impl HttpDocumentFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("building document http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(&self, uri: &str) -> Result<Vec<u8>> {
        let bytes = self
            .client
            .get(uri)
            .send()
            .await
            .context("document get")?
            .error_for_status()
            .context("document non-2xx")?
            .bytes()
            .await
            .context("document body")?;
        Ok(bytes.to_vec())
    }
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unreadable document: {0}")]
    Unreadable(String),
    #[error("document has no pages")]
    NoPages,
    /// The extraction worker was cancelled (runtime shutting down).
    #[error("extraction cancelled")]
    Cancelled,
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Text of the first logical page only.
    async fn first_page_text(&self, payload: Vec<u8>) -> Result<String, ExtractError>;
}

/// PDF extractor backed by `lopdf`; parsing runs on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfFirstPageExtractor;

#[async_trait]
impl TextExtractor for PdfFirstPageExtractor {
    async fn first_page_text(&self, payload: Vec<u8>) -> Result<String, ExtractError> {
        match tokio::task::spawn_blocking(move || pdf_first_page_text(&payload)).await {
            Ok(res) => res,
            Err(e) if e.is_cancelled() => Err(ExtractError::Cancelled),
            // A parser panic on one malformed file is that file's problem.
            Err(e) => Err(ExtractError::Unreadable(format!("parser panicked: {e}"))),
        }
    }
}

pub fn pdf_first_page_text(payload: &[u8]) -> Result<String, ExtractError> {
    let doc = lopdf::Document::load_mem(payload)
        .map_err(|e| ExtractError::Unreadable(e.to_string()))?;
    let first = doc
        .get_pages()
        .keys()
        .next()
        .copied()
        .ok_or(ExtractError::NoPages)?;
    let text = doc
        .extract_text(&[first])
        .map_err(|e| ExtractError::Unreadable(e.to_string()))?;
    Ok(text.trim().to_string())
}
