// src/ingest/naver.rs
use async_trait::async_trait;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use url::Url;

use crate::ingest::normalize_cell;
use crate::ingest::types::{ListingError, ListingRow, ListingSource};

pub const NAVER_LIST_URL: &str = "https://finance.naver.com/research/company_list.naver";
pub const NAVER_PDF_BASE: &str = "https://stock.pstatic.net";
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0";

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").expect("table selector"));
static TR: Lazy<Selector> = Lazy::new(|| Selector::parse("tr").expect("tr selector"));
static TD: Lazy<Selector> = Lazy::new(|| Selector::parse("td").expect("td selector"));
static A: Lazy<Selector> = Lazy::new(|| Selector::parse("a").expect("a selector"));

/// Naver Finance "company research" list.
pub struct NaverResearchSource {
    client: reqwest::Client,
    list_url: String,
    pdf_base: Url,
}

impl NaverResearchSource {
    pub fn new() -> anyhow::Result<Self> {
        Self::with_urls(NAVER_LIST_URL, NAVER_PDF_BASE)
    }

    /// Point at another host (tests, mirrors).
    pub fn with_urls(list_url: &str, pdf_base: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            list_url: list_url.to_string(),
            pdf_base: Url::parse(pdf_base)?,
        })
    }

    fn page_url(&self, page: u32) -> String {
        format!("{}?&page={page}", self.list_url)
    }
}

#[async_trait]
impl ListingSource for NaverResearchSource {
    async fn fetch_page(&self, page: u32) -> Result<Option<Vec<ListingRow>>, ListingError> {
        let resp = self
            .client
            .get(self.page_url(page))
            .send()
            .await
            .map_err(|e| ListingError::Request {
                page,
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ListingError::Status {
                page,
                status: status.as_u16(),
            });
        }

        // reqwest decodes using the charset from Content-Type (the list is EUC-KR).
        let body = resp.text().await.map_err(|e| ListingError::Request {
            page,
            message: e.to_string(),
        })?;
        Ok(parse_listing_html(&body, &self.pdf_base))
    }

    fn name(&self) -> &'static str {
        "naver-research"
    }
}

/// Parse the first table of a listing page. `None` when there is no table.
///
/// Expected row layout (six cells): company, title, issuer, PDF link, date,
/// views. Rows with any other cell count (headers, separators) are ignored.
pub fn parse_listing_html(html: &str, pdf_base: &Url) -> Option<Vec<ListingRow>> {
    let doc = Html::parse_document(html);
    let table = doc.select(&TABLE).next()?;

    let rows = table
        .select(&TR)
        .skip(1)
        .filter_map(|tr| {
            let cells: Vec<ElementRef> = tr.select(&TD).collect();
            if cells.len() != 6 {
                return None;
            }
            let document_link = cells[3]
                .select(&A)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| pdf_base.join(href.trim()).ok())
                .map(|u| u.to_string());
            let nid = cells[1]
                .select(&A)
                .next()
                .and_then(|a| a.value().attr("href"))
                .and_then(nid_from_href);

            Some(ListingRow {
                company: cell_text(&cells[0]),
                title: cell_text(&cells[1]),
                issuer: cell_text(&cells[2]),
                document_link,
                date: cell_text(&cells[4]),
                view_count: cell_text(&cells[5]),
                nid,
            })
        })
        .collect();

    Some(rows)
}

fn cell_text(el: &ElementRef) -> String {
    normalize_cell(&el.text().collect::<String>())
}

/// `company_read.naver?nid=84213&page=1` → `84213`.
fn nid_from_href(href: &str) -> Option<String> {
    let query = href.split_once('?')?.1;
    query
        .split('&')
        .filter_map(|kv| kv.split_once('='))
        .find(|(k, _)| *k == "nid")
        .map(|(_, v)| v.to_string())
        .filter(|v| !v.is_empty())
}
