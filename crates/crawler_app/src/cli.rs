use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::platform::config::Overrides;

/// Collects job postings from the Work24 board into a spreadsheet.
#[derive(Debug, Parser)]
#[command(name = "worknet_crawler", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// RON settings file (defaults to ./crawler.ron when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run the browser without a window
    #[arg(long, global = true)]
    pub headless: bool,

    /// Detail tabs processed at the same time
    #[arg(long, global = true, value_name = "N")]
    pub capacity: Option<usize>,

    /// Directory the spreadsheet is written to
    #[arg(long, global = true, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Chrome or Chromium executable to launch
    #[arg(long, global = true, value_name = "PATH")]
    pub browser: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Crawl postings and save them (the default)
    Run {
        /// Number of postings to collect [default: from settings, 100]
        #[arg(short, long)]
        target: Option<usize>,

        /// Exit without waiting for Enter
        #[arg(long)]
        no_pause: bool,
    },
    /// Menu-driven front-end with live progress
    Interactive,
    /// Print how many postings the board lists
    Count,
}

impl Cli {
    /// The subcommand to run; a bare invocation is a plain run.
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run {
            target: None,
            no_pause: false,
        })
    }

    pub fn overrides(&self) -> Overrides {
        Overrides {
            headless: self.headless,
            capacity: self.capacity,
            output_dir: self.output_dir.clone(),
            browser: self.browser.clone(),
        }
    }

    /// Only the command-line run waits for Enter before exiting.
    pub fn pause_on_exit(&self) -> bool {
        matches!(self.command(), Command::Run { no_pause: false, .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn bare_invocation_is_a_pausing_run() {
        let cli = Cli::try_parse_from(["worknet_crawler"]).unwrap();
        assert_eq!(
            cli.command(),
            Command::Run {
                target: None,
                no_pause: false
            }
        );
        assert!(cli.pause_on_exit());
    }

    #[test]
    fn run_flags_and_global_overrides() {
        let cli = Cli::try_parse_from([
            "worknet_crawler",
            "run",
            "--target",
            "250",
            "--no-pause",
            "--headless",
            "--capacity",
            "4",
        ])
        .unwrap();

        assert_eq!(
            cli.command(),
            Command::Run {
                target: Some(250),
                no_pause: true
            }
        );
        assert!(!cli.pause_on_exit());
        let overrides = cli.overrides();
        assert!(overrides.headless);
        assert_eq!(overrides.capacity, Some(4));
    }

    #[test]
    fn interactive_and_count_do_not_pause() {
        let cli = Cli::try_parse_from(["worknet_crawler", "interactive"]).unwrap();
        assert!(!cli.pause_on_exit());
        let cli = Cli::try_parse_from(["worknet_crawler", "count", "--output-dir", "out"]).unwrap();
        assert_eq!(cli.command(), Command::Count);
        assert_eq!(cli.overrides().output_dir, Some(PathBuf::from("out")));
    }
}
