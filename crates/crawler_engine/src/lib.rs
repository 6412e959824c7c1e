//! Crawler engine: browser automation, detail extraction, bounded
//! concurrency and spreadsheet export.
mod browser;
mod chrome;
mod context;
mod document;
mod engine;
mod export;
mod fields;
mod persist;
mod progress;
mod run;
mod sanitize;
mod scheduler;
mod settings;
mod strategies;
mod tab;
mod types;
mod walker;

pub use browser::{
    BrowserError, BrowserLauncher, BrowserSession, DetailTab, ListingPage, LoadMilestone,
};
pub use chrome::{launch_args, opened_tab, parse_count, ChromeLauncher, TargetEntry};
pub use context::{ResultSet, RunContext, SchedulingCounters};
pub use document::{DocumentSet, PageDocument};
pub use engine::EngineHandle;
pub use export::{
    finalize, ExportError, ExportTable, Finalized, SpreadsheetWriter, XlsxWriter, COLUMNS,
};
pub use fields::{extract_fields, Field};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use progress::{ChannelProgressSink, NullProgressSink, ProgressSink};
pub use run::{query_total_count, run_crawl};
pub use sanitize::{clean_or, clean_text, MAX_CELL_CHARS, TRUNCATION_MARKER};
pub use scheduler::{DetailScheduler, JoinReport, TaskOutcome};
pub use settings::{CrawlSettings, ExportOptions, ListingSelectors, Timing, DEFAULT_START_URL};
pub use strategies::{is_blocked, BLOCKED_KEYWORDS, REGIONS};
pub use tab::{open_detail, prepare, DetailTabHandle};
pub use types::{
    collapse_whitespace, CrawlError, CrawlProgress, DetailFields, EngineEvent, ExportSummary,
    FailureKind, JobRecord, ListingRow, RawListingRow, RunReport, MISSING, NOT_FOUND,
};
pub use walker::{PaginationWalker, WalkEnd, WalkState, WalkSummary};
