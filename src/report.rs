//! Core records: a discovered report, one day's batch, and a processed report.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One report reference discovered on the listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReportItem {
    /// Stable key for resume (listing `nid`, or the document URI as fallback).
    pub source_id: String,
    pub company: String,
    pub title: String,
    /// Research firm that issued the report.
    pub issuer: String,
    pub document_uri: String,
    /// Source-native date string, e.g. `25.10.15`.
    pub published: String,
    pub view_count: String,
}

/// A report after extraction and summarization. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedReport {
    pub item: ReportItem,
    pub extracted_text: String,
    pub summary: String,
    pub text_length: usize,
}

/// One day's items plus which of them were already delivered or given up on.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Batch {
    pub date_key: String,
    pub items: Vec<ReportItem>,
    /// Delivered to the channel.
    pub completed: BTreeSet<usize>,
    /// Attempted but not deliverable (unreadable document, rejected message).
    /// Terminal: never retried within the batch.
    #[serde(default)]
    pub skipped: BTreeSet<usize>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Batch {
    pub fn new(date_key: impl Into<String>, items: Vec<ReportItem>, now: DateTime<Utc>) -> Self {
        Self {
            date_key: date_key.into(),
            items,
            completed: BTreeSet::new(),
            skipped: BTreeSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Indices neither delivered nor skipped, ascending.
    pub fn outstanding(&self) -> Vec<usize> {
        (0..self.items.len())
            .filter(|i| !self.completed.contains(i) && !self.skipped.contains(i))
            .collect()
    }

    /// Returns false (and changes nothing) for an index outside the item list.
    pub fn mark_completed(&mut self, index: usize, now: DateTime<Utc>) -> bool {
        if index >= self.items.len() {
            return false;
        }
        self.skipped.remove(&index);
        self.completed.insert(index);
        self.updated_at = now;
        true
    }

    /// Same contract as `mark_completed`. A delivered index stays delivered.
    pub fn mark_skipped(&mut self, index: usize, now: DateTime<Utc>) -> bool {
        if index >= self.items.len() || self.completed.contains(&index) {
            return false;
        }
        self.skipped.insert(index);
        self.updated_at = now;
        true
    }

    /// Every item was delivered.
    pub fn is_complete(&self) -> bool {
        self.completed.len() == self.items.len()
    }

    /// Every item was delivered or skipped; nothing is left to attempt.
    pub fn is_settled(&self) -> bool {
        self.completed.len() + self.skipped.len() == self.items.len()
    }

    /// Both sets reference existing items and do not overlap.
    pub fn is_consistent(&self) -> bool {
        let n = self.items.len();
        self.completed.iter().all(|&i| i < n)
            && self.skipped.iter().all(|&i| i < n)
            && self.completed.is_disjoint(&self.skipped)
    }
}

#[cfg(test)]
pub(crate) fn sample_item(n: usize) -> ReportItem {
    ReportItem {
        source_id: format!("nid-{n}"),
        company: format!("Company {n}"),
        title: format!("Report {n}"),
        issuer: "Sample Securities".to_string(),
        document_uri: format!("https://stock.pstatic.net/stock-research/company/{n}.pdf"),
        published: "25.10.15".to_string(),
        view_count: "42".to_string(),
    }
}
