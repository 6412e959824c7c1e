mod cli;
mod platform;

use clap::Parser;
use crawl_logging::crawl_info;

use cli::{Cli, Command};
use platform::logging::{self, LogDestination};
use platform::{batch, config, fatal, interactive};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let pause = cli.pause_on_exit();

    let result = run(&cli);
    if let Err(err) = &result {
        fatal::record_fatal(err);
    }
    if pause {
        fatal::wait_for_enter();
    }
    result
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let command = cli.command();
    let destination = match command {
        Command::Run { .. } => LogDestination::Both,
        Command::Interactive => LogDestination::File,
        Command::Count => LogDestination::Terminal,
    };
    logging::initialize(destination, cli.verbose);

    let settings = config::load_settings(cli.config.as_deref())?;
    let settings = config::apply_overrides(settings, &cli.overrides());
    crawl_info!(
        "start url {} | capacity {} | output {}",
        settings.start_url,
        settings.max_concurrent_tabs,
        settings.export.output_dir.display()
    );

    match command {
        Command::Run { target, .. } => {
            let target = target.unwrap_or(settings.target_count);
            batch::run_batch(settings, target)
        }
        Command::Interactive => interactive::run_interactive(settings),
        Command::Count => batch::run_count(settings),
    }
}
