//! Per-run shared state.
//!
//! A [`RunContext`] is created for each run and handed to every component,
//! so independent runs never share counters, gates or results.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::progress::ProgressSink;
use crate::settings::CrawlSettings;
use crate::types::{CrawlProgress, EngineEvent, JobRecord};

/// Append-only bag of completed records, shared by all extraction tasks.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    records: Arc<Mutex<Vec<JobRecord>>>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record and returns the new length.
    pub fn push(&self, record: JobRecord) -> usize {
        let mut records = self.records.lock().unwrap_or_else(|poison| poison.into_inner());
        records.push(record);
        records.len()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies the records collected so far.
    pub fn snapshot(&self) -> Vec<JobRecord> {
        self.records
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }
}

/// `scheduled` only ever moves towards `target` and never past it.
#[derive(Debug)]
pub struct SchedulingCounters {
    target: usize,
    scheduled: AtomicUsize,
    failed: AtomicUsize,
}

impl SchedulingCounters {
    pub fn new(target: usize) -> Self {
        Self {
            target,
            scheduled: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn scheduled(&self) -> usize {
        self.scheduled.load(Ordering::SeqCst)
    }

    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    pub fn is_satisfied(&self) -> bool {
        self.scheduled() >= self.target
    }

    /// Claims one scheduling slot. Returns `None` once the target is reached.
    pub fn try_schedule(&self) -> Option<usize> {
        self.scheduled
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current < self.target).then_some(current + 1)
            })
            .ok()
            .map(|previous| previous + 1)
    }

    pub(crate) fn record_failure(&self) -> usize {
        self.failed.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Everything shared across the walker, the scheduler and its tasks for one run.
#[derive(Clone)]
pub struct RunContext {
    pub settings: Arc<CrawlSettings>,
    pub counters: Arc<SchedulingCounters>,
    pub results: ResultSet,
    gate: Arc<Semaphore>,
    stop: CancellationToken,
    sink: Arc<dyn ProgressSink>,
}

impl RunContext {
    pub fn new(
        settings: Arc<CrawlSettings>,
        target: usize,
        stop: CancellationToken,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        let capacity = settings.max_concurrent_tabs.max(1);
        Self {
            settings,
            counters: Arc::new(SchedulingCounters::new(target)),
            results: ResultSet::new(),
            gate: Arc::new(Semaphore::new(capacity)),
            stop,
            sink,
        }
    }

    /// The capacity gate detail tasks acquire a permit from.
    pub fn gate(&self) -> Arc<Semaphore> {
        self.gate.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }

    pub fn progress(&self) -> CrawlProgress {
        CrawlProgress {
            target: self.counters.target(),
            scheduled: self.counters.scheduled(),
            completed: self.results.len(),
            failed: self.counters.failed(),
        }
    }

    pub fn emit(&self, event: EngineEvent) {
        self.sink.emit(event);
    }

    pub fn emit_progress(&self) {
        self.sink.emit(EngineEvent::Progress(self.progress()));
    }
}
