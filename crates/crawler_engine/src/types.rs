use std::fmt;
use std::path::PathBuf;

use crate::sanitize::clean_or;

/// Placeholder for listing attributes the row did not carry.
pub const MISSING: &str = "N/A";

/// Placeholder for detail fields no extraction strategy resolved.
pub const NOT_FOUND: &str = "정보 없음";

/// Raw attribute text as read from one listing row, before normalization.
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Deserialize)]
pub struct RawListingRow {
    pub title: Option<String>,
    pub company: Option<String>,
    #[serde(default)]
    pub salary_parts: Vec<String>,
    pub location_detail: Option<String>,
    pub location: Option<String>,
    pub schedule: Option<String>,
}

/// The cheap inline fields of one search-result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRow {
    pub title: String,
    pub company: String,
    pub salary: String,
    pub location: String,
    pub schedule: String,
}

impl ListingRow {
    /// Normalizes raw row text: trims every attribute, joins salary fragments
    /// with `" / "`, prefers the nested location text over the container and
    /// substitutes [`MISSING`] for anything absent or blank.
    pub fn from_raw(raw: RawListingRow) -> Self {
        let salary_parts: Vec<&str> = raw
            .salary_parts
            .iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect();
        let salary = if salary_parts.is_empty() {
            MISSING.to_string()
        } else {
            collapse_whitespace(&salary_parts.join(" / "))
        };

        let location = raw
            .location_detail
            .as_deref()
            .filter(|detail| !detail.trim().is_empty())
            .or(raw.location.as_deref());

        Self {
            title: or_missing(raw.title.as_deref()),
            company: or_missing(raw.company.as_deref()),
            salary,
            location: or_missing(location),
            schedule: or_missing(raw.schedule.as_deref()),
        }
    }
}

fn or_missing(value: Option<&str>) -> String {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => text.to_string(),
        _ => MISSING.to_string(),
    }
}

/// Collapses every run of whitespace into a single space and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Fields scraped from a detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailFields {
    pub industry: String,
    pub employees: String,
    pub fax: String,
    pub address: String,
}

impl Default for DetailFields {
    fn default() -> Self {
        Self {
            industry: NOT_FOUND.to_string(),
            employees: NOT_FOUND.to_string(),
            fax: NOT_FOUND.to_string(),
            address: NOT_FOUND.to_string(),
        }
    }
}

/// One output row: listing attributes merged with detail fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub title: String,
    pub company: String,
    pub salary: String,
    pub location: String,
    pub schedule: String,
    pub industry: String,
    pub employees: String,
    pub fax: String,
    pub address: String,
}

impl JobRecord {
    pub fn new(listing: ListingRow, detail: DetailFields) -> Self {
        Self {
            title: listing.title,
            company: listing.company,
            salary: listing.salary,
            location: listing.location,
            schedule: listing.schedule,
            industry: detail.industry,
            employees: detail.employees,
            fax: detail.fax,
            address: detail.address,
        }
    }

    /// Field values in export column order.
    pub fn values(&self) -> [&str; 9] {
        [
            &self.title,
            &self.company,
            &self.salary,
            &self.location,
            &self.schedule,
            &self.industry,
            &self.employees,
            &self.fax,
            &self.address,
        ]
    }

    /// Spreadsheet-safe copy. A field left empty by cleaning gets its
    /// sentinel back.
    pub fn sanitized(&self) -> Self {
        let listing = |value: &str| clean_or(value, MISSING);
        let detail = |value: &str| clean_or(value, NOT_FOUND);
        Self {
            title: listing(&self.title),
            company: listing(&self.company),
            salary: listing(&self.salary),
            location: listing(&self.location),
            schedule: listing(&self.schedule),
            industry: detail(&self.industry),
            employees: detail(&self.employees),
            fax: detail(&self.fax),
            address: detail(&self.address),
        }
    }
}

/// Live counters for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CrawlProgress {
    pub target: usize,
    pub scheduled: usize,
    pub completed: usize,
    pub failed: usize,
}

/// Where a finished run put its spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub row_count: usize,
    pub path: PathBuf,
    pub used_fallback: bool,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub progress: CrawlProgress,
    pub pages_visited: u32,
    pub rows_skipped: usize,
    pub stopped_early: bool,
    pub records: Vec<JobRecord>,
    /// Export outcome; the records above are kept even when this is an error.
    pub export: Result<ExportSummary, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Human-readable milestone for status displays.
    Notice(String),
    PageStarted {
        page: u32,
        progress: CrawlProgress,
    },
    Progress(CrawlProgress),
    TotalCount(Option<u64>),
    RunFinished(Box<RunReport>),
    RunFailed {
        kind: FailureKind,
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    BrowserLaunch,
    ListingPage,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::BrowserLaunch => write!(f, "browser launch failed"),
            FailureKind::ListingPage => write!(f, "listing page unavailable"),
        }
    }
}

/// Fatal run errors. Everything else is contained inside the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum CrawlError {
    #[error("start url {url:?} is not usable: {reason}")]
    InvalidStartUrl { url: String, reason: String },
    #[error("could not launch the browser: {0}")]
    Launch(#[source] crate::BrowserError),
    #[error("could not open the listing page: {0}")]
    ListingPage(#[source] crate::BrowserError),
}

impl CrawlError {
    pub fn kind(&self) -> FailureKind {
        match self {
            CrawlError::Launch(_) => FailureKind::BrowserLaunch,
            CrawlError::InvalidStartUrl { .. } | CrawlError::ListingPage(_) => {
                FailureKind::ListingPage
            }
        }
    }
}
