// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod checkpoint;
pub mod clock;
pub mod config;
pub mod extract;
pub mod ingest;
pub mod notify;
pub mod pipeline;
pub mod processor;
pub mod report;
pub mod telemetry;

// LLM summarization
pub mod analyze;

// ---- Re-exports for stable public API ----
pub use crate::checkpoint::CheckpointStore;
pub use crate::pipeline::{Orchestrator, PipelineContext, PipelineError, RunOutcome};
pub use crate::report::{Batch, ProcessedReport, ReportItem};
