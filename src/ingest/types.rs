// src/ingest/types.rs
use thiserror::Error;

use crate::report::ReportItem;

/// One table row as the listing shows it. Fields are raw text; nothing is
/// validated until `into_item`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingRow {
    pub company: String,
    pub title: String,
    pub issuer: String,
    /// Absolute document URL, if the row carried a link.
    pub document_link: Option<String>,
    pub date: String,
    pub view_count: String,
    /// Listing-side identifier (`nid`), when the title link carries one.
    pub nid: Option<String>,
}

impl ListingRow {
    /// A row qualifies for `target_date` on exact date match with a usable link.
    pub fn qualifies(&self, target_date: &str) -> bool {
        self.date == target_date
            && self
                .document_link
                .as_deref()
                .is_some_and(|l| !l.trim().is_empty())
    }

    /// Validate field presence and convert. `None` when the row is unusable.
    pub fn into_item(self) -> Option<ReportItem> {
        let document_uri = self.document_link?.trim().to_string();
        if document_uri.is_empty()
            || self.company.trim().is_empty()
            || self.title.trim().is_empty()
        {
            return None;
        }
        let source_id = self
            .nid
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| document_uri.clone());
        Some(ReportItem {
            source_id,
            company: self.company.trim().to_string(),
            title: self.title.trim().to_string(),
            issuer: self.issuer.trim().to_string(),
            document_uri,
            published: self.date,
            view_count: self.view_count.trim().to_string(),
        })
    }
}

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("listing page {page} returned HTTP {status}")]
    Status { page: u32, status: u16 },
    #[error("listing page {page} request failed: {message}")]
    Request { page: u32, message: String },
}

/// A paginated listing. `Ok(None)` means the page had no parsable table.
#[async_trait::async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_page(&self, page: u32) -> Result<Option<Vec<ListingRow>>, ListingError>;
    fn name(&self) -> &'static str;
}
