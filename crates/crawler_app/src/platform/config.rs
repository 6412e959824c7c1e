//! Crawl settings from an optional RON file plus command-line overrides.
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use crawl_logging::crawl_info;
use crawler_engine::CrawlSettings;

/// Read from the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILE: &str = "crawler.ron";

/// Command-line values that win over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub headless: bool,
    pub capacity: Option<usize>,
    pub output_dir: Option<PathBuf>,
    pub browser: Option<PathBuf>,
}

/// Loads settings from `explicit`, or from [`DEFAULT_CONFIG_FILE`] if it
/// exists, or falls back to built-in defaults.
///
/// An explicitly named file that is missing or malformed is an error; a
/// missing default file is not.
pub fn load_settings(explicit: Option<&Path>) -> anyhow::Result<CrawlSettings> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let default = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !default.exists() {
                return Ok(CrawlSettings::default());
            }
            default
        }
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("reading settings from {}", path.display()))?;
    let settings = parse_settings(&content)
        .with_context(|| format!("parsing settings in {}", path.display()))?;
    crawl_info!("settings loaded from {}", path.display());
    Ok(settings)
}

pub fn parse_settings(content: &str) -> anyhow::Result<CrawlSettings> {
    Ok(ron::from_str(content)?)
}

pub fn apply_overrides(mut settings: CrawlSettings, overrides: &Overrides) -> CrawlSettings {
    if overrides.headless {
        settings.headless = true;
    }
    if let Some(capacity) = overrides.capacity {
        settings.max_concurrent_tabs = capacity.max(1);
    }
    if let Some(dir) = &overrides.output_dir {
        settings.export.output_dir = dir.clone();
    }
    if let Some(browser) = &overrides.browser {
        settings.browser_executable = Some(browser.clone());
    }
    settings
}
