//! Bounded-concurrency execution of detail extractions.
//!
//! Submission never waits for capacity. Each task waits on the capacity gate
//! itself, so the walker keeps opening tabs while at most
//! `max_concurrent_tabs` task bodies run. The task registry is owned by the
//! scheduler and consumed by [`DetailScheduler::join`], which is the single
//! point after which no task can be added.
use std::panic::AssertUnwindSafe;

use crawl_logging::{clip, crawl_error, crawl_info, crawl_warn};
use futures_util::FutureExt;
use tokio::task::JoinSet;

use crate::browser::BrowserError;
use crate::context::RunContext;
use crate::fields::extract_fields;
use crate::tab::{prepare, DetailTabHandle};
use crate::types::{JobRecord, ListingRow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Collected,
    Failed(String),
    Panicked,
}

/// Totals over every task a scheduler ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JoinReport {
    pub collected: usize,
    pub failed: usize,
    pub panicked: usize,
}

pub struct DetailScheduler {
    ctx: RunContext,
    tasks: JoinSet<TaskOutcome>,
}

impl DetailScheduler {
    pub fn new(ctx: RunContext) -> Self {
        Self {
            ctx,
            tasks: JoinSet::new(),
        }
    }

    /// Launches the extraction for one opened tab and returns immediately.
    pub fn submit(&mut self, tab: DetailTabHandle, listing: ListingRow) {
        let ctx = self.ctx.clone();
        self.tasks.spawn(run_detail_task(ctx, tab, listing));
    }

    /// Tasks not yet joined, including ones still waiting for a permit.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Waits for every submitted task. Individual failures are counted, never
    /// propagated.
    pub async fn join(mut self) -> JoinReport {
        let mut report = JoinReport::default();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(TaskOutcome::Collected) => report.collected += 1,
                Ok(TaskOutcome::Failed(_)) => report.failed += 1,
                Ok(TaskOutcome::Panicked) => report.panicked += 1,
                Err(err) => {
                    crawl_error!("detail task aborted: {}", err);
                    report.panicked += 1;
                }
            }
        }
        report
    }
}

async fn run_detail_task(
    ctx: RunContext,
    tab: DetailTabHandle,
    listing: ListingRow,
) -> TaskOutcome {
    let title = listing.title.clone();
    let outcome = match ctx.gate().acquire_owned().await {
        Ok(_permit) => {
            match AssertUnwindSafe(collect_detail(&ctx, &tab, listing))
                .catch_unwind()
                .await
            {
                Ok(Ok(())) => TaskOutcome::Collected,
                Ok(Err(err)) => TaskOutcome::Failed(err.to_string()),
                Err(_) => TaskOutcome::Panicked,
            }
        }
        Err(_) => TaskOutcome::Failed("capacity gate closed".to_string()),
    };

    tab.close().await;

    match &outcome {
        TaskOutcome::Collected => {}
        TaskOutcome::Failed(reason) => {
            let failed = ctx.counters.record_failure();
            crawl_warn!("detail failed for {} ({} so far): {}", clip(&title, 15), failed, reason);
            ctx.emit_progress();
        }
        TaskOutcome::Panicked => {
            let failed = ctx.counters.record_failure();
            crawl_error!(
                "detail task panicked for {} ({} failed so far)",
                clip(&title, 15),
                failed
            );
            ctx.emit_progress();
        }
    }
    outcome
}

async fn collect_detail(
    ctx: &RunContext,
    handle: &DetailTabHandle,
    listing: ListingRow,
) -> Result<(), BrowserError> {
    let tab = handle
        .tab()
        .ok_or_else(|| BrowserError::Protocol(format!("tab {} already closed", handle.id())))?;

    prepare(tab, &ctx.settings).await;
    let documents = tab.snapshot().await?;
    let detail = extract_fields(&documents);
    let record = JobRecord::new(listing, detail);

    crawl_info!(
        "collected {} | address: {} | fax: {}",
        clip(&record.title, 15),
        record.address,
        record.fax
    );
    ctx.results.push(record);
    ctx.emit_progress();
    Ok(())
}
