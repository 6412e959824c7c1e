#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User edited the target-count input.
    TargetEdited(String),
    /// User asked to start a crawl with the current target.
    StartClicked,
    /// User asked the running crawl to stop after open tabs finish.
    StopClicked,
    /// User asked how many postings the board currently lists.
    CountRequested,
    /// Engine answered a count request.
    TotalCountReceived(Option<u64>),
    /// Engine began reading a result page.
    PageStarted { page: u32 },
    /// Engine counters changed.
    Progress(crate::ProgressSnapshot),
    /// Engine status text.
    Notice(String),
    /// Engine finished a crawl, successfully or not.
    RunFinished(crate::RunOutcome),
    /// Engine could not run the crawl at all.
    RunFailed { reason: String },
    /// User wants to leave.
    QuitRequested,
    /// Render tick from the message pump.
    Tick,
}
