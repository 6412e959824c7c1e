//! What the command-line run does on the way out.
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use chrono::Local;
use crawl_logging::{crawl_error, crawl_warn};

pub const ERROR_LOG_FILE: &str = "error_log.txt";

/// Logs a fatal error and appends it, timestamped, to [`ERROR_LOG_FILE`].
pub fn record_fatal(err: &anyhow::Error) {
    crawl_error!("fatal: {:#}", err);
    if let Err(io_err) = append_error(Path::new(ERROR_LOG_FILE), err) {
        crawl_warn!("could not write {}: {}", ERROR_LOG_FILE, io_err);
    }
}

fn append_error(path: &Path, err: &anyhow::Error) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(
        file,
        "[{}] {:#}",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        err
    )
}

/// Keeps a double-clicked console window open until the user has read it.
pub fn wait_for_enter() {
    print!("Press Enter to exit...");
    let _ = io::stdout().flush();
    let mut line = String::new();
    let _ = io::stdin().read_line(&mut line);
}
