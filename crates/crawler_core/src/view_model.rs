use crate::{ProgressSnapshot, RunOutcome, SessionState};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppViewModel {
    pub session: SessionState,
    pub target_input: String,
    pub default_target: usize,
    pub total_available: Option<u64>,
    pub counting: bool,
    pub progress: ProgressSnapshot,
    pub current_page: Option<u32>,
    pub status: String,
    pub outcome: Option<RunOutcome>,
    /// A new crawl may be started.
    pub can_start: bool,
}

impl AppViewModel {
    /// One-line summary of the running crawl, e.g.
    /// `page 3 | scheduled 24/100 | collected 20 | failed 1`.
    pub fn progress_line(&self) -> String {
        let p = &self.progress;
        let page = self
            .current_page
            .map(|page| format!("page {page} | "))
            .unwrap_or_default();
        format!(
            "{page}scheduled {}/{} | collected {} | failed {}",
            p.scheduled, p.target, p.completed, p.failed
        )
    }
}
