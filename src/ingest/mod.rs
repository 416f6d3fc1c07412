// src/ingest/mod.rs
pub mod naver;
pub mod types;

use crate::clock::Sleeper;
use crate::config::PacingPolicy;
use crate::ingest::types::{ListingError, ListingSource};
use crate::report::ReportItem;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

/// One-time metrics registration.
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("listing_pages_total", "Listing pages fetched.");
        describe_counter!(
            "reports_listed_total",
            "Reports discovered for the target date."
        );
        describe_counter!("listing_errors_total", "Listing page fetch errors.");
        describe_gauge!(
            "listing_last_page",
            "Last page number visited by the most recent discovery."
        );
    });
}

/// Normalize a table cell: decode leftover entities, collapse whitespace, trim.
pub fn normalize_cell(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("whitespace regex"));
    re_ws.replace_all(&decoded, " ").trim().to_string()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ListingOptions {
    /// Return as soon as one qualifying report is found.
    pub stop_after_first: bool,
}

/// Walk listing pages until `empty_page_threshold` consecutive pages have no
/// report for `target_date`.
///
/// The listing is newest-first and exposes no page count, so a run of empty
/// pages is the stop signal. Any page fetch error aborts discovery and
/// nothing collected so far is returned.
pub async fn list_items(
    source: &dyn ListingSource,
    target_date: &str,
    pacing: &PacingPolicy,
    sleeper: &dyn Sleeper,
    options: ListingOptions,
) -> Result<Vec<ReportItem>, ListingError> {
    ensure_metrics_described();

    let mut items = Vec::new();
    let mut consecutive_empty_pages = 0u32;
    let mut page = 1u32;

    loop {
        if page > pacing.max_pages {
            tracing::warn!(
                source = source.name(),
                max_pages = pacing.max_pages,
                "listing page cap reached; stopping discovery"
            );
            break;
        }
        if page > 1 {
            sleeper.sleep(pacing.page_delay).await;
        }

        let rows = match source.fetch_page(page).await {
            Ok(rows) => rows,
            Err(e) => {
                counter!("listing_errors_total").increment(1);
                tracing::error!(error = %e, page, source = source.name(), "listing fetch failed");
                return Err(e);
            }
        };
        counter!("listing_pages_total").increment(1);
        gauge!("listing_last_page").set(page as f64);

        let mut found_on_page = 0usize;
        match rows {
            None => tracing::info!(page, "no listing table on page"),
            Some(rows) => {
                for row in rows {
                    if !row.qualifies(target_date) {
                        continue;
                    }
                    let Some(item) = row.into_item() else {
                        tracing::debug!(page, "qualifying row missing required fields");
                        continue;
                    };
                    tracing::info!(page, company = %item.company, title = %item.title, "found report");
                    items.push(item);
                    found_on_page += 1;

                    if options.stop_after_first {
                        tracing::info!("single-file mode: stopping after first report");
                        counter!("reports_listed_total").increment(1);
                        return Ok(items);
                    }
                }
            }
        }

        if found_on_page == 0 {
            consecutive_empty_pages += 1;
            tracing::info!(
                page,
                consecutive_empty = consecutive_empty_pages,
                "no reports for target date on page"
            );
            if consecutive_empty_pages >= pacing.empty_page_threshold {
                tracing::info!(
                    threshold = pacing.empty_page_threshold,
                    "stopping after consecutive empty pages"
                );
                break;
            }
        } else {
            consecutive_empty_pages = 0;
        }

        page += 1;
    }

    counter!("reports_listed_total").increment(items.len() as u64);
    tracing::info!(
        total = items.len(),
        pages = page.min(pacing.max_pages),
        target_date,
        "discovery finished"
    );
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::RecordingSleeper;
    use crate::ingest::types::ListingRow;
    use std::sync::Mutex;

    #[test]
    fn normalize_cell_collapses_ws_and_entities() {
        assert_eq!(normalize_cell("  KB&nbsp;증권 \n\t "), "KB 증권");
        assert_eq!(normalize_cell("\n"), "");
    }

    fn row(date: &str, link: Option<&str>) -> ListingRow {
        ListingRow {
            company: "Samsung".into(),
            title: "Memory upcycle".into(),
            issuer: "KB".into(),
            document_link: link.map(str::to_string),
            date: date.into(),
            view_count: "10".into(),
            nid: None,
        }
    }

    struct PagedStub {
        pages: Vec<Result<Option<Vec<ListingRow>>, u16>>,
        calls: Mutex<Vec<u32>>,
    }

    #[async_trait::async_trait]
    impl ListingSource for PagedStub {
        async fn fetch_page(&self, page: u32) -> Result<Option<Vec<ListingRow>>, ListingError> {
            self.calls.lock().unwrap().push(page);
            match self.pages.get(page as usize - 1) {
                Some(Ok(rows)) => Ok(rows.clone()),
                Some(Err(status)) => Err(ListingError::Status {
                    page,
                    status: *status,
                }),
                None => Ok(Some(vec![])),
            }
        }
        fn name(&self) -> &'static str {
            "stub"
        }
    }

    #[tokio::test]
    async fn empty_table_and_missing_table_both_count_as_empty() {
        let stub = PagedStub {
            pages: vec![Ok(None), Ok(Some(vec![row("25.10.14", Some("x"))]))],
            calls: Mutex::new(vec![]),
        };
        let sleeper = RecordingSleeper::new();
        let pacing = PacingPolicy {
            empty_page_threshold: 2,
            ..PacingPolicy::default()
        };
        let out = list_items(&stub, "25.10.15", &pacing, &sleeper, ListingOptions::default())
            .await
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(*stub.calls.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn row_without_link_does_not_qualify() {
        let stub = PagedStub {
            pages: vec![Ok(Some(vec![row("25.10.15", None), row("25.10.15", Some(" "))]))],
            calls: Mutex::new(vec![]),
        };
        let sleeper = RecordingSleeper::new();
        let pacing = PacingPolicy {
            empty_page_threshold: 1,
            ..PacingPolicy::default()
        };
        let out = list_items(&stub, "25.10.15", &pacing, &sleeper, ListingOptions::default())
            .await
            .unwrap();
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn fetch_error_discards_collected_items() {
        let stub = PagedStub {
            pages: vec![
                Ok(Some(vec![row("25.10.15", Some("https://x/1.pdf"))])),
                Err(503),
            ],
            calls: Mutex::new(vec![]),
        };
        let sleeper = RecordingSleeper::new();
        let res = list_items(
            &stub,
            "25.10.15",
            &PacingPolicy::default(),
            &sleeper,
            ListingOptions::default(),
        )
        .await;
        assert!(matches!(
            res,
            Err(ListingError::Status {
                page: 2,
                status: 503
            })
        ));
    }

    #[tokio::test]
    async fn max_pages_caps_discovery() {
        let many: Vec<_> = (0..10)
            .map(|_| Ok(Some(vec![row("25.10.15", Some("https://x/a.pdf"))])))
            .collect();
        let stub = PagedStub {
            pages: many,
            calls: Mutex::new(vec![]),
        };
        let sleeper = RecordingSleeper::new();
        let pacing = PacingPolicy {
            max_pages: 3,
            ..PacingPolicy::default()
        };
        let out = list_items(&stub, "25.10.15", &pacing, &sleeper, ListingOptions::default())
            .await
            .unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(stub.calls.lock().unwrap().len(), 3);
    }
}
