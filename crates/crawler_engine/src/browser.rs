//! Narrow interface to the browser automation layer.
//!
//! The pipeline only talks to these traits; `crate::chrome` implements them
//! on top of chromiumoxide and the tests implement them in memory.
use std::time::Duration;

use crate::document::DocumentSet;
use crate::settings::CrawlSettings;
use crate::types::RawListingRow;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrowserError {
    #[error("launch failed: {0}")]
    Launch(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
    #[error("timed out after {timeout:?} waiting for {what}")]
    Timeout { what: String, timeout: Duration },
    #[error("element not found: {0}")]
    ElementMissing(String),
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl BrowserError {
    pub fn timeout(what: impl Into<String>, timeout: Duration) -> Self {
        Self::Timeout {
            what: what.into(),
            timeout,
        }
    }
}

/// How long a navigation waits before it counts as done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMilestone {
    /// Full load event, network mostly quiet.
    Load,
    /// Document parsed; scripts may still be fetching.
    DomContentLoaded,
}

#[async_trait::async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, settings: &CrawlSettings)
        -> Result<Box<dyn BrowserSession>, BrowserError>;
}

#[async_trait::async_trait]
pub trait BrowserSession: Send + Sync {
    /// Opens the tab the listing is browsed in.
    async fn new_listing_page(&self) -> Result<Box<dyn ListingPage>, BrowserError>;

    async fn shutdown(&self) -> Result<(), BrowserError>;
}

/// The paginated search-result page.
#[async_trait::async_trait]
pub trait ListingPage: Send + Sync {
    async fn navigate(
        &self,
        url: &str,
        until: LoadMilestone,
        timeout: Duration,
    ) -> Result<(), BrowserError>;

    /// Waits until at least one result row is attached and returns the row count.
    async fn wait_for_rows(&self, timeout: Duration) -> Result<usize, BrowserError>;

    /// Reads the inline attributes of the row at `index` on the current page.
    async fn read_row(&self, index: usize) -> Result<RawListingRow, BrowserError>;

    /// Ctrl-clicks the title of the row at `index` and returns the tab it opened.
    async fn open_row_in_new_tab(
        &self,
        index: usize,
        timeout: Duration,
    ) -> Result<Box<dyn DetailTab>, BrowserError>;

    /// Clicks the next-page control. Returns `false` when there is none.
    ///
    /// Waiting for the next page to load is best effort and bounded by `timeout`.
    async fn advance_page(&self, timeout: Duration) -> Result<bool, BrowserError>;

    /// Total number of postings the board reports, if shown.
    async fn total_count(&self) -> Result<Option<u64>, BrowserError>;
}

/// A tab showing one posting's detail page.
#[async_trait::async_trait]
pub trait DetailTab: Send + Sync {
    /// Short identifier for log lines.
    fn id(&self) -> String;

    async fn wait_until(&self, milestone: LoadMilestone, timeout: Duration)
        -> Result<(), BrowserError>;

    /// Clicks the first visible control whose text contains one of `labels`.
    /// Returns whether anything was clicked.
    async fn activate_panel(&self, labels: &[String]) -> Result<bool, BrowserError>;

    /// Markup and text of the main document and every readable frame.
    async fn snapshot(&self) -> Result<DocumentSet, BrowserError>;

    async fn close(&self) -> Result<(), BrowserError>;
}
