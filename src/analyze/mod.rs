// src/analyze/mod.rs
pub mod summarizer;

pub use summarizer::{FixedSummarizer, OpenAiSummarizer, Summarizer, SummaryRequest};
