use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crawl_logging::{crawl_info, crawl_warn};
use crawler_core::{Effect, Msg, ProgressSnapshot, RunOutcome};
use crawler_engine::{CrawlProgress, EngineEvent, EngineHandle, RunReport};

/// Turns core effects into engine commands and engine events into core messages.
pub struct EffectRunner {
    engine: EngineHandle,
}

impl EffectRunner {
    pub fn new(engine: EngineHandle, msg_tx: mpsc::Sender<Msg>) -> Self {
        let runner = Self { engine };
        runner.spawn_event_loop(msg_tx);
        runner
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::QueryTotalCount => self.engine.query_total_count(),
                Effect::StartCrawl { target } => {
                    crawl_info!("StartCrawl target={}", target);
                    self.engine.start_crawl(target);
                }
                Effect::StopCrawl => self.engine.stop(),
            }
        }
    }

    fn spawn_event_loop(&self, msg_tx: mpsc::Sender<Msg>) {
        let engine = self.engine.clone();
        thread::spawn(move || loop {
            let Some(event) = engine.recv_timeout(Duration::from_millis(50)) else {
                continue;
            };
            if msg_tx.send(map_event(event)).is_err() {
                break;
            }
        });
    }
}

fn map_event(event: EngineEvent) -> Msg {
    match event {
        EngineEvent::Notice(text) => Msg::Notice(text),
        EngineEvent::PageStarted { page, .. } => Msg::PageStarted { page },
        EngineEvent::Progress(progress) => Msg::Progress(snapshot(progress)),
        EngineEvent::TotalCount(total) => Msg::TotalCountReceived(total),
        EngineEvent::RunFinished(report) => Msg::RunFinished(outcome(&report)),
        EngineEvent::RunFailed { kind, message } => {
            crawl_warn!("run failed ({}): {}", kind, message);
            Msg::RunFailed {
                reason: format!("{kind}: {message}"),
            }
        }
    }
}

fn snapshot(progress: CrawlProgress) -> ProgressSnapshot {
    ProgressSnapshot {
        target: progress.target,
        scheduled: progress.scheduled,
        completed: progress.completed,
        failed: progress.failed,
    }
}

fn outcome(report: &RunReport) -> RunOutcome {
    match &report.export {
        Ok(summary) => RunOutcome::Saved {
            rows: summary.row_count,
            path: summary.path.display().to_string(),
            used_fallback: summary.used_fallback,
            stopped_early: report.stopped_early,
        },
        Err(reason) => RunOutcome::ExportFailed {
            rows: report.records.len(),
            reason: reason.clone(),
        },
    }
}
