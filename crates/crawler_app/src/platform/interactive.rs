//! Menu-driven terminal front-end.
use std::io;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use crawler_core::{parse_target, AppViewModel, Msg, RunOutcome, SessionState};
use crawler_engine::CrawlSettings;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Select};

use super::session::Session;

const MENU: [&str; 3] = ["Check total postings", "Start crawl", "Quit"];

pub fn run_interactive(settings: CrawlSettings) -> anyhow::Result<()> {
    let default_target = settings.target_count;
    let mut session = Session::new(settings);
    let theme = ColorfulTheme::default();

    loop {
        let prompt = match session.view().total_available {
            Some(total) => format!("Worknet crawler ({total} postings listed)"),
            None => "Worknet crawler".to_string(),
        };
        let choice = Select::with_theme(&theme)
            .with_prompt(prompt)
            .items(&MENU)
            .default(1)
            .interact()?;

        match choice {
            0 => count(&mut session),
            1 => {
                let input: String = Input::with_theme(&theme)
                    .with_prompt("How many postings?")
                    .default(default_target.to_string())
                    .validate_with(|input: &String| {
                        parse_target(input, default_target).map(|_| ())
                    })
                    .interact_text()?;
                crawl(&mut session, input);
            }
            _ => {
                session.dispatch(Msg::QuitRequested);
                return Ok(());
            }
        }
    }
}

fn count(session: &mut Session) {
    println!("Opening the listing to read the total...");
    session.dispatch(Msg::CountRequested);
    session.pump_until(|view| !view.counting, |_| {});
    match session.view().total_available {
        Some(total) => println!("{total} postings are currently listed."),
        None => println!("The listing did not show a total count."),
    }
}

fn crawl(session: &mut Session, target_input: String) {
    if !session.view().can_start {
        println!("A crawl is already running.");
        return;
    }
    session.start(target_input);
    if session.view().session != SessionState::Running {
        println!("{}", session.view().status);
        return;
    }

    println!("Crawling. Press Enter to stop early.");
    let listener = listen_for_stop(session.sender());

    let mut last_line = String::new();
    session.pump_until(
        |view| view.session == SessionState::Finished,
        |view| {
            let line = view.progress_line();
            if line != last_line {
                println!("  {line}");
                last_line = line;
            }
        },
    );

    print_outcome(&session.view());
    if !listener.is_finished() {
        println!("Press Enter to return to the menu.");
    }
    let _ = listener.join();
}

/// One line on stdin asks the crawl to stop. The thread always consumes
/// exactly one line, so the menu never competes with it. A line read after
/// the crawl finished becomes a stop request for an idle session, which
/// [`Session::start`] applies before the next crawl begins.
fn listen_for_stop(msg_tx: mpsc::Sender<Msg>) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut line = String::new();
        if io::stdin().read_line(&mut line).is_ok() {
            let _ = msg_tx.send(Msg::StopClicked);
        }
    })
}

fn print_outcome(view: &AppViewModel) {
    match &view.outcome {
        Some(RunOutcome::Saved {
            rows,
            path,
            used_fallback,
            stopped_early,
        }) => {
            let note = match (stopped_early, used_fallback) {
                (true, true) => " (stopped early, backup file)",
                (true, false) => " (stopped early)",
                (false, true) => " (backup file)",
                (false, false) => "",
            };
            println!("Saved {rows} postings to {path}{note}");
        }
        Some(_) | None => println!("{}", view.status),
    }
}
