//! # Batch Orchestrator
//! Drives one run: resolve the channel, obtain today's batch (resumed or
//! freshly discovered), process and deliver outstanding reports in listing
//! order, checkpoint after each settled report, and close the batch once
//! every report is delivered or skipped.
//!
//! States: `ResolveChannel → ObtainBatch → (NoItems | Processing) → Done`,
//! with `Processing → Suspended` on an unmodeled error. A suspended run
//! leaves the last saved checkpoint for the next launch. Skipped reports
//! are terminal: they are logged, recorded in the batch and never retried.

use std::sync::Arc;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use thiserror::Error;

use crate::checkpoint::CheckpointStore;
use crate::clock::{target_date, Clock, Sleeper};
use crate::config::PacingPolicy;
use crate::ingest::types::{ListingError, ListingSource};
use crate::ingest::{list_items, ListingOptions};
use crate::notify::{
    completion_notice, format_report, no_items_notice, ChannelHandle, Notifier, TransportError,
};
use crate::processor::{ItemOutcome, ItemProcessor, SkipReason};
use crate::report::{Batch, ReportItem};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Pipeline runs started.");
        describe_counter!("reports_delivered_total", "Reports posted to the channel.");
        describe_counter!(
            "reports_skipped_total",
            "Reports skipped because fetch or extraction failed."
        );
        describe_counter!(
            "delivery_failures_total",
            "Report messages the transport did not accept."
        );
        describe_gauge!("pipeline_last_run_ts", "Unix ts when the pipeline last ran.");
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ResolveChannel,
    ObtainBatch,
    NoItems,
    Processing,
    Suspended,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    NoItems,
    /// Every report settled; the completion notice went out and the
    /// checkpoint was cleared. `skipped` counts the whole batch.
    Completed {
        total: usize,
        delivered_this_run: usize,
        skipped: usize,
    },
    /// The run hit an error it cannot classify as item-local.
    Suspended {
        completed: usize,
        total: usize,
        error: String,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("could not resolve channel: {0}")]
    ChannelResolution(TransportError),
    #[error("report discovery failed: {0}")]
    Listing(#[from] ListingError),
    #[error("checkpoint write failed: {0:#}")]
    Checkpoint(anyhow::Error),
    #[error("report processing failed: {0:#}")]
    Processing(anyhow::Error),
    #[error("delivery failed: {0}")]
    Delivery(TransportError),
}

/// Everything one run needs, built once and owned by the orchestrator.
pub struct PipelineContext {
    pub channel_id: String,
    pub source: Arc<dyn ListingSource>,
    pub processor: ItemProcessor,
    pub notifier: Notifier,
    pub store: CheckpointStore,
    pub clock: Arc<dyn Clock>,
    pub sleeper: Arc<dyn Sleeper>,
    pub pacing: PacingPolicy,
    pub listing: ListingOptions,
}

pub struct Orchestrator {
    ctx: PipelineContext,
}

impl Orchestrator {
    pub fn new(ctx: PipelineContext) -> Self {
        Self { ctx }
    }

    pub fn store(&self) -> &CheckpointStore {
        &self.ctx.store
    }

    fn enter(&self, stage: Stage) {
        tracing::debug!(?stage, "pipeline stage");
    }

    pub async fn run(&self) -> Result<RunOutcome, PipelineError> {
        ensure_metrics_described();
        counter!("pipeline_runs_total").increment(1);
        gauge!("pipeline_last_run_ts").set(self.ctx.clock.now().timestamp().max(0) as f64);

        self.enter(Stage::ResolveChannel);
        let channel = self
            .ctx
            .notifier
            .resolve(&self.ctx.channel_id)
            .await
            .map_err(PipelineError::ChannelResolution)?;

        self.enter(Stage::ObtainBatch);
        let target = target_date(self.ctx.clock.now());
        let mut batch = match self.ctx.store.load(&target) {
            Some(b) => b,
            None => {
                tracing::info!(target_date = %target, "discovering reports");
                let items = list_items(
                    self.ctx.source.as_ref(),
                    &target,
                    &self.ctx.pacing,
                    self.ctx.sleeper.as_ref(),
                    self.ctx.listing,
                )
                .await?;

                if items.is_empty() {
                    self.enter(Stage::NoItems);
                    tracing::info!(target_date = %target, "no reports for target date");
                    self.announce(&channel, &no_items_notice()).await;
                    return Ok(RunOutcome::NoItems);
                }

                let b = Batch::new(target, items, self.ctx.clock.now());
                // Persist the listing so an interruption on the first item
                // does not force rediscovery.
                self.ctx.store.save(&b).map_err(PipelineError::Checkpoint)?;
                b
            }
        };

        Ok(self.process_batch(&channel, &mut batch).await)
    }

    async fn process_batch(&self, channel: &ChannelHandle, batch: &mut Batch) -> RunOutcome {
        let total = batch.items.len();
        let mut delivered = 0usize;

        let outstanding = batch.outstanding();
        if !outstanding.is_empty() {
            self.enter(Stage::Processing);
            tracing::info!(
                outstanding = outstanding.len(),
                total,
                "processing reports"
            );
        }

        for index in outstanding {
            let item = batch.items[index].clone();
            tracing::info!(
                index,
                position = index + 1,
                total,
                company = %item.company,
                "processing report"
            );

            let outcome = match self.ctx.processor.process(&item).await {
                Ok(o) => o,
                Err(e) => return self.suspend(batch, format!("{e:#}")),
            };

            match outcome {
                ItemOutcome::Skipped(reason) => {
                    counter!("reports_skipped_total").increment(1);
                    log_skip(index, &item, &reason);
                    batch.mark_skipped(index, self.ctx.clock.now());
                }
                ItemOutcome::Ready(report) => {
                    match self.ctx.notifier.deliver(channel, &format_report(&report)).await {
                        Ok(()) => {
                            batch.mark_completed(index, self.ctx.clock.now());
                            delivered += 1;
                            counter!("reports_delivered_total").increment(1);
                            tracing::info!(
                                index,
                                company = %report.item.company,
                                completed = batch.completed.len(),
                                total,
                                "report delivered"
                            );
                        }
                        Err(TransportError::Unexpected(e)) => {
                            return self.suspend(batch, format!("{e:#}"));
                        }
                        Err(e) => {
                            counter!("delivery_failures_total").increment(1);
                            tracing::warn!(
                                index,
                                company = %report.item.company,
                                error = %e,
                                "report not delivered; skipping"
                            );
                            batch.mark_skipped(index, self.ctx.clock.now());
                        }
                    }
                }
            }

            if let Err(e) = self.ctx.store.save(batch) {
                return self.suspend(batch, format!("{e:#}"));
            }
            self.ctx.sleeper.sleep(self.ctx.pacing.item_delay).await;
        }

        debug_assert!(batch.is_settled());
        self.enter(Stage::Done);
        self.announce(channel, &completion_notice(total)).await;
        if let Err(e) = self.ctx.store.clear() {
            // The next run sees a settled checkpoint and only re-announces.
            tracing::error!(error = %format!("{e:#}"), "could not clear finished checkpoint");
        }
        tracing::info!(
            total,
            delivered_this_run = delivered,
            skipped = batch.skipped.len(),
            "batch complete"
        );
        RunOutcome::Completed {
            total,
            delivered_this_run: delivered,
            skipped: batch.skipped.len(),
        }
    }

    fn suspend(&self, batch: &Batch, why: String) -> RunOutcome {
        self.enter(Stage::Suspended);
        tracing::error!(
            error = %why,
            completed = batch.completed.len(),
            total = batch.items.len(),
            "run suspended; resume from last checkpoint"
        );
        RunOutcome::Suspended {
            completed: batch.completed.len(),
            total: batch.items.len(),
            error: why,
        }
    }

    /// Status notices are best-effort.
    async fn announce(&self, channel: &ChannelHandle, text: &str) {
        if let Err(e) = self.ctx.notifier.deliver(channel, text).await {
            tracing::warn!(error = %e, "status notice not delivered");
        }
    }

    /// Process and post one explicit document, bypassing discovery and the
    /// checkpoint. Returns whether a report was delivered.
    pub async fn run_single_document(&self, uri: &str) -> Result<bool, PipelineError> {
        let channel = self
            .ctx
            .notifier
            .resolve(&self.ctx.channel_id)
            .await
            .map_err(PipelineError::ChannelResolution)?;

        let item = ReportItem {
            source_id: uri.to_string(),
            company: "테스트 회사".to_string(),
            title: "테스트 리포트".to_string(),
            issuer: "테스트 연구사".to_string(),
            document_uri: uri.to_string(),
            published: target_date(self.ctx.clock.now()),
            view_count: "0".to_string(),
        };

        match self
            .ctx
            .processor
            .process(&item)
            .await
            .map_err(PipelineError::Processing)?
        {
            ItemOutcome::Ready(report) => {
                self.ctx
                    .notifier
                    .deliver(&channel, &format_report(&report))
                    .await
                    .map_err(PipelineError::Delivery)?;
                tracing::info!(uri, "single document delivered");
                Ok(true)
            }
            ItemOutcome::Skipped(reason) => {
                log_skip(0, &item, &reason);
                Ok(false)
            }
        }
    }
}

fn log_skip(index: usize, item: &ReportItem, reason: &SkipReason) {
    tracing::warn!(
        index,
        company = %item.company,
        uri = %item.document_uri,
        reason = %reason,
        "report skipped"
    );
}
