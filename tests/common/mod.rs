// tests/common/mod.rs
// Hand-written collaborators for pipeline-level tests.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use analyst_report_digest::analyze::FixedSummarizer;
use analyst_report_digest::clock::{FixedClock, RecordingSleeper};
use analyst_report_digest::config::PacingPolicy;
use analyst_report_digest::extract::{DocumentFetcher, ExtractError, TextExtractor};
use analyst_report_digest::ingest::types::{ListingError, ListingRow, ListingSource};
use analyst_report_digest::ingest::ListingOptions;
use analyst_report_digest::notify::{ChannelHandle, MessagingTransport, Notifier, TransportError};
use analyst_report_digest::pipeline::{Orchestrator, PipelineContext};
use analyst_report_digest::processor::ItemProcessor;
use analyst_report_digest::{CheckpointStore, ReportItem};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

/// 2025-10-16 09:00 KST, so the target date is `25.10.15`.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 16, 0, 0, 0).unwrap()
}

pub const TARGET: &str = "25.10.15";

pub fn row(n: usize, date: &str) -> ListingRow {
    ListingRow {
        company: format!("Company {n}"),
        title: format!("Report {n}"),
        issuer: "Sample Securities".into(),
        document_link: Some(format!("https://docs.test/{n}.pdf")),
        date: date.into(),
        view_count: "10".into(),
        nid: Some(format!("{n}")),
    }
}

pub fn item(n: usize) -> ReportItem {
    row(n, TARGET).into_item().unwrap()
}

/// Page `n` (1-based) returns `pages[n-1]`; pages past the end are empty tables.
pub struct StubListing {
    pub pages: Vec<Vec<ListingRow>>,
    pub calls: Mutex<Vec<u32>>,
    pub fail_on: Option<u32>,
}

impl StubListing {
    pub fn new(pages: Vec<Vec<ListingRow>>) -> Self {
        Self {
            pages,
            calls: Mutex::new(vec![]),
            fail_on: None,
        }
    }

    pub fn calls(&self) -> Vec<u32> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ListingSource for StubListing {
    async fn fetch_page(&self, page: u32) -> Result<Option<Vec<ListingRow>>, ListingError> {
        self.calls.lock().unwrap().push(page);
        if self.fail_on == Some(page) {
            return Err(ListingError::Status { page, status: 500 });
        }
        Ok(Some(
            self.pages
                .get(page as usize - 1)
                .cloned()
                .unwrap_or_default(),
        ))
    }
    fn name(&self) -> &'static str {
        "stub-listing"
    }
}

/// Serves the URI itself padded to a given length as the "document".
pub struct StubFetcher {
    pub text_len: HashMap<String, usize>,
    pub default_len: usize,
    pub fetched: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new(default_len: usize) -> Self {
        Self {
            text_len: HashMap::new(),
            default_len,
            fetched: Mutex::new(vec![]),
        }
    }

    pub fn with_len(mut self, uri: &str, len: usize) -> Self {
        self.text_len.insert(uri.to_string(), len);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentFetcher for StubFetcher {
    async fn fetch(&self, uri: &str) -> anyhow::Result<Vec<u8>> {
        self.fetched.lock().unwrap().push(uri.to_string());
        let len = self.text_len.get(uri).copied().unwrap_or(self.default_len);
        Ok("r".repeat(len).into_bytes())
    }
}

pub struct Utf8Extractor;

#[async_trait]
impl TextExtractor for Utf8Extractor {
    async fn first_page_text(&self, payload: Vec<u8>) -> Result<String, ExtractError> {
        String::from_utf8(payload).map_err(|e| ExtractError::Unreadable(e.to_string()))
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Ok,
    RateLimited(u64),
    Fail,
    Unexpected,
}

impl Reply {
    fn into_result(self) -> Result<(), TransportError> {
        match self {
            Reply::Ok => Ok(()),
            Reply::RateLimited(s) => Err(TransportError::RateLimited {
                retry_after_secs: s,
            }),
            Reply::Fail => Err(TransportError::Failed("boom".into())),
            Reply::Unexpected => Err(TransportError::Unexpected(anyhow::anyhow!("token revoked"))),
        }
    }
}

/// Scripted transport: replies are consumed in order, then everything is Ok.
#[derive(Default)]
pub struct StubTransport {
    pub resolve_script: Mutex<VecDeque<Reply>>,
    pub send_script: Mutex<VecDeque<Reply>>,
    pub resolve_calls: Mutex<usize>,
    pub send_attempts: Mutex<usize>,
    pub sent: Mutex<Vec<String>>,
}

impl StubTransport {
    pub fn with_sends(replies: Vec<Reply>) -> Self {
        Self {
            send_script: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn with_resolves(replies: Vec<Reply>) -> Self {
        Self {
            resolve_script: Mutex::new(replies.into()),
            ..Self::default()
        }
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn send_attempts(&self) -> usize {
        *self.send_attempts.lock().unwrap()
    }

    pub fn resolve_calls(&self) -> usize {
        *self.resolve_calls.lock().unwrap()
    }
}

#[async_trait]
impl MessagingTransport for StubTransport {
    async fn resolve(&self, channel_id: &str) -> Result<ChannelHandle, TransportError> {
        *self.resolve_calls.lock().unwrap() += 1;
        let reply = self.resolve_script.lock().unwrap().pop_front().unwrap_or(Reply::Ok);
        reply.into_result().map(|_| ChannelHandle {
            chat_id: "-100123".into(),
            title: Some(channel_id.to_string()),
        })
    }

    async fn send(&self, _channel: &ChannelHandle, text: &str) -> Result<(), TransportError> {
        *self.send_attempts.lock().unwrap() += 1;
        let reply = self.send_script.lock().unwrap().pop_front().unwrap_or(Reply::Ok);
        let res = reply.into_result();
        if res.is_ok() {
            self.sent.lock().unwrap().push(text.to_string());
        }
        res
    }

    fn name(&self) -> &'static str {
        "stub-transport"
    }
}

pub struct Harness {
    pub listing: Arc<StubListing>,
    pub fetcher: Arc<StubFetcher>,
    pub transport: Arc<StubTransport>,
    pub sleeper: Arc<RecordingSleeper>,
    pub store: CheckpointStore,
    pub _dir: tempfile::TempDir,
}

impl Harness {
    pub fn new(listing: StubListing, fetcher: StubFetcher, transport: StubTransport) -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self {
            listing: Arc::new(listing),
            fetcher: Arc::new(fetcher),
            transport: Arc::new(transport),
            sleeper: Arc::new(RecordingSleeper::new()),
            store: CheckpointStore::new(dir.path().join("cp.json")),
            _dir: dir,
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        let pacing = PacingPolicy::default();
        Orchestrator::new(PipelineContext {
            channel_id: "@reports".into(),
            source: self.listing.clone(),
            processor: ItemProcessor::new(
                self.fetcher.clone(),
                Arc::new(Utf8Extractor),
                Arc::new(FixedSummarizer {
                    fixed: "요약 본문".into(),
                }),
            ),
            notifier: Notifier::new(
                self.transport.clone(),
                self.sleeper.clone(),
                pacing.delivery_delay,
            ),
            store: self.store.clone(),
            clock: Arc::new(FixedClock(now())),
            sleeper: self.sleeper.clone(),
            pacing,
            listing: ListingOptions::default(),
        })
    }

    /// Messages that were report cards (not status notices).
    pub fn report_messages(&self) -> Vec<String> {
        self.transport
            .sent()
            .into_iter()
            .filter(|m| m.contains("투자 리포트*"))
            .collect()
    }
}
