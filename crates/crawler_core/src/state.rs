use crate::view_model::AppViewModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Running,
    /// Stop requested; open tabs are still finishing.
    Stopping,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    pub target: usize,
    pub scheduled: usize,
    pub completed: usize,
    pub failed: usize,
}

/// How a crawl ended, as far as the user is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Saved {
        rows: usize,
        path: String,
        used_fallback: bool,
        stopped_early: bool,
    },
    /// Crawl finished but the spreadsheet could not be written.
    ExportFailed { rows: usize, reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    session: SessionState,
    target_input: String,
    default_target: usize,
    total_available: Option<u64>,
    counting: bool,
    progress: ProgressSnapshot,
    current_page: Option<u32>,
    status: String,
    outcome: Option<RunOutcome>,
    dirty: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(100)
    }
}

impl AppState {
    /// `default_target` is used when the target input is left empty.
    pub fn new(default_target: usize) -> Self {
        Self {
            session: SessionState::Idle,
            target_input: String::new(),
            default_target,
            total_available: None,
            counting: false,
            progress: ProgressSnapshot::default(),
            current_page: None,
            status: String::new(),
            outcome: None,
            dirty: false,
        }
    }

    pub fn view(&self) -> AppViewModel {
        AppViewModel {
            session: self.session,
            target_input: self.target_input.clone(),
            default_target: self.default_target,
            total_available: self.total_available,
            counting: self.counting,
            progress: self.progress,
            current_page: self.current_page,
            status: self.status.clone(),
            outcome: self.outcome.clone(),
            can_start: matches!(self.session, SessionState::Idle | SessionState::Finished),
        }
    }

    pub fn session(&self) -> SessionState {
        self.session
    }

    /// Returns whether anything changed since the last call, and resets the flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn target_input(&self) -> &str {
        &self.target_input
    }

    pub(crate) fn default_target(&self) -> usize {
        self.default_target
    }

    pub(crate) fn set_target_input(&mut self, input: String) {
        if self.target_input != input {
            self.target_input = input;
            self.mark_dirty();
        }
    }

    pub(crate) fn start_run(&mut self, target: usize) {
        self.session = SessionState::Running;
        self.progress = ProgressSnapshot {
            target,
            ..ProgressSnapshot::default()
        };
        self.current_page = None;
        self.outcome = None;
        self.status = format!("crawling {target} postings");
        self.mark_dirty();
    }

    pub(crate) fn request_stop(&mut self) {
        self.session = SessionState::Stopping;
        self.status = "stopping after open tabs finish".to_string();
        self.mark_dirty();
    }

    pub(crate) fn finish_run(&mut self, outcome: RunOutcome) {
        self.session = SessionState::Finished;
        self.status = match &outcome {
            RunOutcome::Saved { rows, path, .. } => format!("saved {rows} rows to {path}"),
            RunOutcome::ExportFailed { rows, reason } => {
                format!("{rows} rows collected but not saved: {reason}")
            }
            RunOutcome::Failed { reason } => format!("crawl failed: {reason}"),
        };
        self.outcome = Some(outcome);
        self.mark_dirty();
    }

    pub(crate) fn set_counting(&mut self, counting: bool) {
        self.counting = counting;
        self.mark_dirty();
    }

    pub(crate) fn is_counting(&self) -> bool {
        self.counting
    }

    pub(crate) fn set_total_available(&mut self, total: Option<u64>) {
        self.total_available = total;
        self.counting = false;
        self.mark_dirty();
    }

    pub(crate) fn set_progress(&mut self, progress: ProgressSnapshot) {
        if self.progress != progress {
            self.progress = progress;
            self.mark_dirty();
        }
    }

    pub(crate) fn set_page(&mut self, page: u32) {
        self.current_page = Some(page);
        self.mark_dirty();
    }

    pub(crate) fn set_status(&mut self, status: String) {
        self.status = status;
        self.mark_dirty();
    }
}

/// Reads the target-count input. Empty input means `default_target`.
pub fn parse_target(input: &str, default_target: usize) -> Result<usize, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(default_target);
    }
    match trimmed.replace(',', "").parse::<usize>() {
        Ok(0) => Err("target must be at least 1".to_string()),
        Ok(target) => Ok(target),
        Err(_) => Err(format!("{trimmed:?} is not a number")),
    }
}
