use crawl_logging::{clip, crawl_info, crawl_warn};

use crate::browser::ListingPage;
use crate::context::RunContext;
use crate::scheduler::DetailScheduler;
use crate::tab::open_detail;
use crate::types::{EngineEvent, ListingRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkState {
    AwaitingList,
    RowScan { rows: usize },
    PageAdvance,
    Done(WalkEnd),
}

/// Why the walk stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkEnd {
    TargetReached,
    /// No result rows appeared on the current page.
    NoRows,
    LastPage,
    PaginationFailed,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkSummary {
    pub pages_visited: u32,
    pub rows_skipped: usize,
    pub end: WalkEnd,
}

/// Walks result pages and hands every opened detail tab to the scheduler
/// until the target is scheduled, the pages run out or a stop is requested.
pub struct PaginationWalker<'a> {
    listing: &'a dyn ListingPage,
    ctx: &'a RunContext,
    page: u32,
    pages_visited: u32,
    rows_skipped: usize,
}

impl<'a> PaginationWalker<'a> {
    pub fn new(listing: &'a dyn ListingPage, ctx: &'a RunContext) -> Self {
        Self {
            listing,
            ctx,
            page: 1,
            pages_visited: 0,
            rows_skipped: 0,
        }
    }

    pub async fn walk(mut self, scheduler: &mut DetailScheduler) -> WalkSummary {
        let mut state = WalkState::AwaitingList;
        loop {
            state = match state {
                WalkState::AwaitingList => self.await_list().await,
                WalkState::RowScan { rows } => self.scan_rows(rows, scheduler).await,
                WalkState::PageAdvance => self.advance().await,
                WalkState::Done(end) => {
                    crawl_info!(
                        "walk ended after {} pages: {:?} (scheduled {}, skipped {})",
                        self.pages_visited,
                        end,
                        self.ctx.counters.scheduled(),
                        self.rows_skipped
                    );
                    return WalkSummary {
                        pages_visited: self.pages_visited,
                        rows_skipped: self.rows_skipped,
                        end,
                    };
                }
            };
        }
    }

    async fn await_list(&mut self) -> WalkState {
        if self.ctx.is_stopped() {
            return WalkState::Done(WalkEnd::Stopped);
        }
        if self.ctx.counters.is_satisfied() {
            return WalkState::Done(WalkEnd::TargetReached);
        }

        let progress = self.ctx.progress();
        crawl_info!(
            "--- page {} (scheduled {}, collected {}) ---",
            self.page,
            progress.scheduled,
            progress.completed
        );
        self.ctx.emit(EngineEvent::PageStarted {
            page: self.page,
            progress,
        });

        let timeout = self.ctx.settings.timing.row_wait_timeout();
        match self.listing.wait_for_rows(timeout).await {
            Ok(0) => {
                crawl_info!("page {} has no result rows", self.page);
                WalkState::Done(WalkEnd::NoRows)
            }
            Ok(rows) => {
                self.pages_visited += 1;
                crawl_info!("page {} lists {} rows", self.page, rows);
                WalkState::RowScan { rows }
            }
            Err(err) => {
                crawl_warn!("page {}: result rows never appeared ({})", self.page, err);
                WalkState::Done(WalkEnd::NoRows)
            }
        }
    }

    /// Visits rows by position; a row that fails is skipped, never fatal.
    async fn scan_rows(&mut self, rows: usize, scheduler: &mut DetailScheduler) -> WalkState {
        let timing = &self.ctx.settings.timing;

        for index in 0..rows {
            if self.ctx.counters.is_satisfied() {
                break;
            }
            if self.ctx.is_stopped() {
                return WalkState::Done(WalkEnd::Stopped);
            }

            let row = match self.listing.read_row(index).await {
                Ok(raw) => ListingRow::from_raw(raw),
                Err(err) => {
                    crawl_warn!("page {} row {}: unreadable ({})", self.page, index, err);
                    self.rows_skipped += 1;
                    continue;
                }
            };

            let Some(tab) = open_detail(self.listing, index, timing.new_tab_timeout()).await else {
                crawl_warn!("[skip] click failed or no tab opened: {}", row.title);
                self.rows_skipped += 1;
                continue;
            };

            if self.ctx.counters.try_schedule().is_none() {
                tab.close().await;
                break;
            }
            crawl_info!("[scheduled] {} (tab {})", clip(&row.title, 10), tab.id());
            scheduler.submit(tab, row);
            self.ctx.emit_progress();

            tokio::time::sleep(timing.submit_jitter()).await;
        }

        if self.ctx.counters.is_satisfied() {
            crawl_info!("target of {} tasks scheduled", self.ctx.counters.target());
            WalkState::Done(WalkEnd::TargetReached)
        } else {
            WalkState::PageAdvance
        }
    }

    async fn advance(&mut self) -> WalkState {
        if self.ctx.is_stopped() {
            return WalkState::Done(WalkEnd::Stopped);
        }

        let timing = &self.ctx.settings.timing;
        match self.listing.advance_page(timing.page_advance_timeout()).await {
            Ok(true) => {
                crawl_info!(">> moving to page {}", self.page + 1);
                tokio::time::sleep(timing.page_settle()).await;
                self.page += 1;
                WalkState::AwaitingList
            }
            Ok(false) => {
                crawl_info!("no next-page control; end of the listing");
                WalkState::Done(WalkEnd::LastPage)
            }
            Err(err) => {
                crawl_warn!("could not move past page {}: {}", self.page, err);
                WalkState::Done(WalkEnd::PaginationFailed)
            }
        }
    }
}
