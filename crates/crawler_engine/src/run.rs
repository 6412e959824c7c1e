//! One crawl from browser launch to spreadsheet.
use std::sync::Arc;

use crawl_logging::{crawl_info, crawl_warn};
use tokio_util::sync::CancellationToken;

use crate::browser::{BrowserLauncher, BrowserSession, ListingPage, LoadMilestone};
use crate::context::RunContext;
use crate::export::{finalize, SpreadsheetWriter};
use crate::progress::ProgressSink;
use crate::scheduler::DetailScheduler;
use crate::settings::CrawlSettings;
use crate::types::{CrawlError, EngineEvent, RunReport};
use crate::walker::{PaginationWalker, WalkEnd};

fn validate_start_url(raw: &str) -> Result<(), CrawlError> {
    let invalid = |reason: String| CrawlError::InvalidStartUrl {
        url: raw.to_string(),
        reason,
    };
    let url = url::Url::parse(raw).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme {other}"))),
    }
}

/// Opens the listing tab and loads the start page.
///
/// A full load is tried first; if it fails or times out, a lighter
/// DOM-ready navigation follows after a short pause. When both fail the run
/// still continues and the row wait decides whether the page is usable.
async fn open_listing(
    session: &dyn BrowserSession,
    settings: &CrawlSettings,
) -> Result<Box<dyn ListingPage>, CrawlError> {
    let listing = session
        .new_listing_page()
        .await
        .map_err(CrawlError::ListingPage)?;

    let timing = &settings.timing;
    let url = settings.start_url.as_str();
    if let Err(err) = listing
        .navigate(url, LoadMilestone::Load, timing.navigation_timeout())
        .await
    {
        crawl_warn!("initial load of {} failed ({}); retrying", url, err);
        tokio::time::sleep(timing.navigation_retry_backoff()).await;
        if let Err(err) = listing
            .navigate(url, LoadMilestone::DomContentLoaded, timing.navigation_timeout())
            .await
        {
            crawl_warn!("retry of {} failed too ({}); continuing", url, err);
        }
    }
    Ok(listing)
}

async fn close_session(session: &dyn BrowserSession) {
    if let Err(err) = session.shutdown().await {
        crawl_warn!("browser shutdown: {}", err);
    }
}

/// Runs a full crawl for `target` records and writes the spreadsheet.
///
/// Only a failed launch, an unusable start URL or a listing tab that cannot
/// be opened end the run with an error. Everything after that is contained:
/// the report carries whatever was collected, and the export outcome.
pub async fn run_crawl(
    launcher: &dyn BrowserLauncher,
    settings: Arc<CrawlSettings>,
    target: usize,
    stop: CancellationToken,
    sink: Arc<dyn ProgressSink>,
    writer: &dyn SpreadsheetWriter,
) -> Result<RunReport, CrawlError> {
    validate_start_url(&settings.start_url)?;
    crawl_info!(
        "crawl starting: target {}, up to {} tabs at once",
        target,
        settings.max_concurrent_tabs.max(1)
    );
    sink.emit(EngineEvent::Notice("launching browser".to_string()));

    let session = launcher
        .launch(&settings)
        .await
        .map_err(CrawlError::Launch)?;

    let listing = match open_listing(session.as_ref(), &settings).await {
        Ok(listing) => listing,
        Err(err) => {
            close_session(session.as_ref()).await;
            return Err(err);
        }
    };
    sink.emit(EngineEvent::Notice("listing page opened".to_string()));

    let ctx = RunContext::new(settings.clone(), target, stop, sink);
    let mut scheduler = DetailScheduler::new(ctx.clone());
    let walk = PaginationWalker::new(listing.as_ref(), &ctx)
        .walk(&mut scheduler)
        .await;

    crawl_info!(
        "waiting for {} outstanding detail tasks",
        scheduler.in_flight()
    );
    ctx.emit(EngineEvent::Notice("waiting for open tabs".to_string()));
    let joined = scheduler.join().await;
    crawl_info!(
        "all tasks settled: {} collected, {} failed, {} panicked",
        joined.collected,
        joined.failed,
        joined.panicked
    );

    let finalized = finalize(&ctx.results, &settings.export, writer);
    close_session(session.as_ref()).await;

    let report = RunReport {
        progress: ctx.progress(),
        pages_visited: walk.pages_visited,
        rows_skipped: walk.rows_skipped,
        stopped_early: walk.end == WalkEnd::Stopped,
        records: finalized.records,
        export: finalized.export.map_err(|e| e.to_string()),
    };
    Ok(report)
}

/// Opens the listing once and reads how many postings it reports.
pub async fn query_total_count(
    launcher: &dyn BrowserLauncher,
    settings: &CrawlSettings,
) -> Result<Option<u64>, CrawlError> {
    validate_start_url(&settings.start_url)?;
    let session = launcher.launch(settings).await.map_err(CrawlError::Launch)?;

    let counted = async {
        let listing = open_listing(session.as_ref(), settings).await?;
        if let Err(err) = listing
            .wait_for_rows(settings.timing.row_wait_timeout())
            .await
        {
            crawl_warn!("listing rows not visible before counting: {}", err);
        }
        listing.total_count().await.map_err(CrawlError::ListingPage)
    }
    .await;

    close_session(session.as_ref()).await;
    if let Ok(total) = &counted {
        match total {
            Some(total) => crawl_info!("listing reports {} postings", total),
            None => crawl_info!("listing shows no total count"),
        }
    }
    counted
}
