//! Non-interactive commands: a full run and a count query.
use anyhow::bail;
use crawler_core::{Msg, RunOutcome, SessionState};
use crawler_engine::CrawlSettings;

use super::session::Session;

pub fn run_batch(settings: CrawlSettings, target: usize) -> anyhow::Result<()> {
    if target == 0 {
        bail!("target must be at least 1");
    }
    println!("Collecting {target} postings. Progress is logged to ./crawler.log");

    let mut session = Session::new(settings);
    session.start(target.to_string());
    session.pump_until(|view| view.session == SessionState::Finished, |_| {});

    let view = session.view();
    match view.outcome {
        Some(RunOutcome::Saved {
            rows,
            path,
            used_fallback,
            stopped_early,
        }) => {
            if used_fallback {
                println!("The main results file was open elsewhere; saved a backup instead.");
            }
            if stopped_early {
                println!("Stopped early.");
            }
            println!("Done: {rows} postings saved to {path}");
            Ok(())
        }
        Some(RunOutcome::ExportFailed { rows, reason }) => {
            bail!("{rows} postings collected but the spreadsheet could not be saved: {reason}")
        }
        Some(RunOutcome::Failed { reason }) => bail!("crawl failed: {reason}"),
        None => bail!("crawl ended without a result"),
    }
}

pub fn run_count(settings: CrawlSettings) -> anyhow::Result<()> {
    let mut session = Session::new(settings);
    session.dispatch(Msg::CountRequested);
    session.pump_until(|view| !view.counting, |_| {});

    match session.view().total_available {
        Some(total) => println!("{total} postings are currently listed."),
        None => println!("The listing did not show a total count."),
    }
    Ok(())
}
