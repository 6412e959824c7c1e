#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use crawler_engine::{
    BrowserError, BrowserLauncher, BrowserSession, CrawlSettings, DetailTab, DocumentSet,
    EngineEvent, ExportError, ExportTable, ListingPage, LoadMilestone, PersistError,
    ProgressSink, RawListingRow, SpreadsheetWriter, Timing,
};
use tokio_util::sync::CancellationToken;

static INIT: Once = Once::new();

pub fn init_logging() {
    INIT.call_once(crawl_logging::initialize_for_tests);
}

/// Settings with every delay removed.
pub fn fast_settings() -> CrawlSettings {
    CrawlSettings {
        timing: Timing {
            navigation_timeout_ms: 1_000,
            navigation_retry_backoff_ms: 0,
            row_wait_timeout_ms: 1_000,
            new_tab_timeout_ms: 1_000,
            tab_ready_timeout_ms: 1_000,
            tab_settle_ms: 0,
            panel_settle_ms: 0,
            page_advance_timeout_ms: 1_000,
            page_settle_ms: 0,
            submit_jitter_min_ms: 0,
            submit_jitter_max_ms: 0,
            poll_interval_ms: 1,
        },
        ..CrawlSettings::default()
    }
}

#[derive(Debug, Clone, Default)]
pub enum TabBehaviour {
    #[default]
    Collect,
    FailSnapshot,
    Panic,
}

/// What clicking the company-info control does on a fake tab.
#[derive(Debug, Clone, Default)]
pub enum PanelBehaviour {
    #[default]
    Absent,
    /// The click reveals this extra document.
    Opens(String),
    Fails,
}

#[derive(Debug, Clone)]
pub struct FakeRow {
    pub raw: RawListingRow,
    pub open_fails: bool,
    pub markup: String,
    pub behaviour: TabBehaviour,
    pub panel: PanelBehaviour,
    pub never_ready: bool,
}

impl FakeRow {
    pub fn titled(title: &str) -> Self {
        Self {
            raw: RawListingRow {
                title: Some(title.to_string()),
                company: Some(format!("{title} 주식회사")),
                ..RawListingRow::default()
            },
            open_fails: false,
            markup: "<html><body><table><tr><th>업종</th><td>제조업</td></tr></table></body></html>"
                .to_string(),
            behaviour: TabBehaviour::Collect,
            panel: PanelBehaviour::Absent,
            never_ready: false,
        }
    }

    pub fn with_panel(mut self, panel: PanelBehaviour) -> Self {
        self.panel = panel;
        self
    }

    pub fn never_ready(mut self) -> Self {
        self.never_ready = true;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.open_fails = true;
        self
    }

    pub fn behaving(mut self, behaviour: TabBehaviour) -> Self {
        self.behaviour = behaviour;
        self
    }
}

pub fn page(prefix: &str, rows: usize) -> Vec<FakeRow> {
    (0..rows)
        .map(|i| FakeRow::titled(&format!("{prefix}-{i}")))
        .collect()
}

/// Everything the fakes observed during a run.
#[derive(Default)]
pub struct BrowserLog {
    pub opened: AtomicUsize,
    pub closes: Mutex<HashMap<String, usize>>,
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    pub advance_calls: AtomicUsize,
    pub navigations: Mutex<Vec<LoadMilestone>>,
    pub shutdowns: AtomicUsize,
    pub panel_clicks: AtomicUsize,
}

impl BrowserLog {
    pub fn close_counts(&self) -> HashMap<String, usize> {
        self.closes.lock().unwrap().clone()
    }
}

pub struct ListingScript {
    pub pages: Vec<Vec<FakeRow>>,
    pub total: Option<u64>,
    pub fail_load: bool,
    pub fail_listing: bool,
    pub fail_launch: bool,
    /// Cancelled when the walker asks for the next page.
    pub stop_on_advance: Option<CancellationToken>,
    /// Time each snapshot takes, to make tasks overlap.
    pub snapshot_delay: Duration,
}

impl ListingScript {
    pub fn pages(pages: Vec<Vec<FakeRow>>) -> Self {
        Self {
            pages,
            total: None,
            fail_load: false,
            fail_listing: false,
            fail_launch: false,
            stop_on_advance: None,
            snapshot_delay: Duration::ZERO,
        }
    }
}

pub struct FakeLauncher {
    script: Arc<ListingScript>,
    pub log: Arc<BrowserLog>,
}

impl FakeLauncher {
    pub fn new(script: ListingScript) -> Self {
        Self {
            script: Arc::new(script),
            log: Arc::new(BrowserLog::default()),
        }
    }
}

#[async_trait::async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(
        &self,
        _settings: &CrawlSettings,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        if self.script.fail_launch {
            return Err(BrowserError::Launch("no browser installed".to_string()));
        }
        Ok(Box::new(FakeSession {
            script: self.script.clone(),
            log: self.log.clone(),
        }))
    }
}

struct FakeSession {
    script: Arc<ListingScript>,
    log: Arc<BrowserLog>,
}

#[async_trait::async_trait]
impl BrowserSession for FakeSession {
    async fn new_listing_page(&self) -> Result<Box<dyn ListingPage>, BrowserError> {
        if self.script.fail_listing {
            return Err(BrowserError::Protocol("target crashed".to_string()));
        }
        Ok(Box::new(FakeListing {
            script: self.script.clone(),
            log: self.log.clone(),
            current: AtomicUsize::new(0),
        }))
    }

    async fn shutdown(&self) -> Result<(), BrowserError> {
        self.log.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeListing {
    script: Arc<ListingScript>,
    log: Arc<BrowserLog>,
    current: AtomicUsize,
}

impl FakeListing {
    fn row(&self, index: usize) -> Result<&FakeRow, BrowserError> {
        self.script
            .pages
            .get(self.current.load(Ordering::SeqCst))
            .and_then(|rows| rows.get(index))
            .ok_or_else(|| BrowserError::ElementMissing(format!("row {index}")))
    }
}

#[async_trait::async_trait]
impl ListingPage for FakeListing {
    async fn navigate(
        &self,
        _url: &str,
        until: LoadMilestone,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        self.log.navigations.lock().unwrap().push(until);
        if self.script.fail_load && until == LoadMilestone::Load {
            return Err(BrowserError::timeout("listing page load", timeout));
        }
        Ok(())
    }

    async fn wait_for_rows(&self, _timeout: Duration) -> Result<usize, BrowserError> {
        Ok(self
            .script
            .pages
            .get(self.current.load(Ordering::SeqCst))
            .map_or(0, Vec::len))
    }

    async fn read_row(&self, index: usize) -> Result<RawListingRow, BrowserError> {
        Ok(self.row(index)?.raw.clone())
    }

    async fn open_row_in_new_tab(
        &self,
        index: usize,
        timeout: Duration,
    ) -> Result<Box<dyn DetailTab>, BrowserError> {
        let row = self.row(index)?;
        if row.open_fails {
            return Err(BrowserError::timeout("new detail tab", timeout));
        }
        self.log.opened.fetch_add(1, Ordering::SeqCst);
        let mut tab = FakeTab::new(
            &format!("p{}r{}", self.current.load(Ordering::SeqCst), index),
            self.log.clone(),
        );
        tab.markup = row.markup.clone();
        tab.behaviour = row.behaviour.clone();
        tab.panel = row.panel.clone();
        tab.never_ready = row.never_ready;
        tab.delay = self.script.snapshot_delay;
        Ok(Box::new(tab))
    }

    async fn advance_page(&self, _timeout: Duration) -> Result<bool, BrowserError> {
        self.log.advance_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(stop) = &self.script.stop_on_advance {
            stop.cancel();
        }
        let next = self.current.load(Ordering::SeqCst) + 1;
        if next < self.script.pages.len() {
            self.current.store(next, Ordering::SeqCst);
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn total_count(&self) -> Result<Option<u64>, BrowserError> {
        Ok(self.script.total)
    }
}

pub struct FakeTab {
    pub id: String,
    pub markup: String,
    pub behaviour: TabBehaviour,
    pub panel: PanelBehaviour,
    pub never_ready: bool,
    pub delay: Duration,
    pub log: Arc<BrowserLog>,
    panel_open: AtomicBool,
}

impl FakeTab {
    pub fn new(id: &str, log: Arc<BrowserLog>) -> Self {
        Self {
            id: id.to_string(),
            markup: "<html><body></body></html>".to_string(),
            behaviour: TabBehaviour::Collect,
            panel: PanelBehaviour::Absent,
            never_ready: false,
            delay: Duration::ZERO,
            log,
            panel_open: AtomicBool::new(false),
        }
    }
}

struct ActiveGuard<'a>(&'a BrowserLog);

impl<'a> ActiveGuard<'a> {
    fn enter(log: &'a BrowserLog) -> Self {
        let now = log.active.fetch_add(1, Ordering::SeqCst) + 1;
        log.max_active.fetch_max(now, Ordering::SeqCst);
        Self(log)
    }
}

impl Drop for ActiveGuard<'_> {
    fn drop(&mut self) {
        self.0.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl DetailTab for FakeTab {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn wait_until(
        &self,
        _milestone: LoadMilestone,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        if self.never_ready {
            return Err(BrowserError::timeout("detail tab ready", timeout));
        }
        Ok(())
    }

    async fn activate_panel(&self, _labels: &[String]) -> Result<bool, BrowserError> {
        match &self.panel {
            PanelBehaviour::Absent => Ok(false),
            PanelBehaviour::Opens(_) => {
                self.log.panel_clicks.fetch_add(1, Ordering::SeqCst);
                self.panel_open.store(true, Ordering::SeqCst);
                Ok(true)
            }
            PanelBehaviour::Fails => {
                Err(BrowserError::Protocol("click intercepted by overlay".to_string()))
            }
        }
    }

    async fn snapshot(&self) -> Result<DocumentSet, BrowserError> {
        let _active = ActiveGuard::enter(&self.log);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match self.behaviour {
            TabBehaviour::Collect => match &self.panel {
                PanelBehaviour::Opens(extra) if self.panel_open.load(Ordering::SeqCst) => {
                    Ok(DocumentSet::from_markup([self.markup.clone(), extra.clone()]))
                }
                _ => Ok(DocumentSet::from_markup([self.markup.clone()])),
            },
            TabBehaviour::FailSnapshot => {
                Err(BrowserError::Protocol("target closed".to_string()))
            }
            TabBehaviour::Panic => panic!("detail page script crashed"),
        }
    }

    async fn close(&self) -> Result<(), BrowserError> {
        *self
            .log
            .closes
            .lock()
            .unwrap()
            .entry(self.id.clone())
            .or_insert(0) += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<EngineEvent>>,
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Keeps written tables in memory; names in `locked` fail as locked files.
#[derive(Default)]
pub struct MemoryWriter {
    pub locked: HashSet<String>,
    pub written: Mutex<Vec<(String, ExportTable)>>,
}

impl MemoryWriter {
    pub fn locking(names: &[&str]) -> Self {
        Self {
            locked: names.iter().map(|n| n.to_string()).collect(),
            written: Mutex::new(Vec::new()),
        }
    }
}

impl SpreadsheetWriter for MemoryWriter {
    fn write(
        &self,
        dir: &Path,
        file_name: &str,
        _sheet_name: &str,
        table: &ExportTable,
    ) -> Result<PathBuf, ExportError> {
        let path = dir.join(file_name);
        if self.locked.contains(file_name) {
            return Err(ExportError::Persist(PersistError::Locked { path }));
        }
        self.written
            .lock()
            .unwrap()
            .push((file_name.to_string(), table.clone()));
        Ok(path)
    }
}
