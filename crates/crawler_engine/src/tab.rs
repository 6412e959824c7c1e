use std::time::Duration;

use crawl_logging::{crawl_debug, crawl_trace, crawl_warn};

use crate::browser::{DetailTab, ListingPage, LoadMilestone};
use crate::settings::CrawlSettings;

/// Owns one detail tab and guarantees it is closed exactly once.
///
/// [`DetailTabHandle::close`] is the normal path. If a handle is dropped
/// without it, `Drop` spawns the close on the runtime the tab was opened on.
pub struct DetailTabHandle {
    tab: Option<Box<dyn DetailTab>>,
    id: String,
    runtime: Option<tokio::runtime::Handle>,
}

impl DetailTabHandle {
    pub fn new(tab: Box<dyn DetailTab>) -> Self {
        let id = tab.id();
        Self {
            tab: Some(tab),
            id,
            runtime: tokio::runtime::Handle::try_current().ok(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// The open tab. Only `None` after [`Self::close`] consumed the handle.
    pub fn tab(&self) -> Option<&dyn DetailTab> {
        self.tab.as_deref()
    }

    /// Closes the tab. Close errors are logged, never returned: the handle is
    /// gone either way.
    pub async fn close(mut self) {
        if let Some(tab) = self.tab.take() {
            match tab.close().await {
                Ok(()) => crawl_trace!("tab {} closed", self.id),
                Err(err) => crawl_warn!("closing tab {} failed: {}", self.id, err),
            }
        }
    }
}

impl Drop for DetailTabHandle {
    fn drop(&mut self) {
        let Some(tab) = self.tab.take() else {
            return;
        };
        let id = std::mem::take(&mut self.id);
        match &self.runtime {
            Some(runtime) => {
                runtime.spawn(async move {
                    if let Err(err) = tab.close().await {
                        crawl_warn!("drop cleanup of tab {} failed: {}", id, err);
                    }
                });
            }
            None => crawl_warn!("tab {} dropped outside a runtime and left open", id),
        }
    }
}

/// Opens the detail tab for the row at `index`.
///
/// `None` means the row could not be processed; the caller skips it.
pub async fn open_detail(
    listing: &dyn ListingPage,
    index: usize,
    timeout: Duration,
) -> Option<DetailTabHandle> {
    match listing.open_row_in_new_tab(index, timeout).await {
        Ok(tab) => Some(DetailTabHandle::new(tab)),
        Err(err) => {
            crawl_warn!("row {}: no detail tab ({})", index, err);
            None
        }
    }
}

/// Lets a fresh tab settle and loads its lazy company-info panel.
///
/// Nothing here is fatal: a tab that never reports ready is still scraped
/// as-is, and the panel step is optional.
pub async fn prepare(tab: &dyn DetailTab, settings: &CrawlSettings) {
    let timing = &settings.timing;
    if let Err(err) = tab
        .wait_until(LoadMilestone::DomContentLoaded, timing.tab_ready_timeout())
        .await
    {
        crawl_warn!("tab {} not ready: {}", tab.id(), err);
    }
    tokio::time::sleep(timing.tab_settle()).await;

    match tab.activate_panel(&settings.company_panel_labels).await {
        Ok(true) => tokio::time::sleep(timing.panel_settle()).await,
        Ok(false) => crawl_trace!("tab {}: no company panel control", tab.id()),
        Err(err) => crawl_debug!("tab {}: company panel skipped ({})", tab.id(), err),
    }
}
