use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_START_URL: &str =
    "https://www.work24.go.kr/wk/a/b/1200/retriveDtlEmpSrchList.do";

/// Everything a run needs to know, loadable from a RON file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlSettings {
    pub start_url: String,
    pub target_count: usize,
    /// Upper bound on detail tabs being processed at the same time.
    pub max_concurrent_tabs: usize,
    pub headless: bool,
    pub browser_executable: Option<PathBuf>,
    pub user_agent: String,
    pub window_width: u32,
    pub window_height: u32,
    pub blocked_url_patterns: Vec<String>,
    pub stealth_script: String,
    /// Visible texts of the control that loads the company info panel.
    pub company_panel_labels: Vec<String>,
    pub selectors: ListingSelectors,
    pub timing: Timing,
    pub export: ExportOptions,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            start_url: DEFAULT_START_URL.to_string(),
            target_count: 100,
            max_concurrent_tabs: 12,
            headless: false,
            browser_executable: None,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            window_width: 1600,
            window_height: 900,
            blocked_url_patterns: [
                "png", "jpg", "jpeg", "gif", "webp", "svg", "woff", "woff2", "ttf", "eot",
            ]
            .iter()
            .map(|ext| format!("*.{ext}"))
            .collect(),
            stealth_script:
                "Object.defineProperty(navigator, 'webdriver', {get: () => undefined})"
                    .to_string(),
            company_panel_labels: vec!["기업정보".to_string()],
            selectors: ListingSelectors::default(),
            timing: Timing::default(),
            export: ExportOptions::default(),
        }
    }
}

/// CSS selectors for the search-result table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListingSelectors {
    pub row: String,
    pub title: String,
    pub title_fallback: String,
    pub company: String,
    pub salary_fragment: String,
    pub location_detail: String,
    pub location: String,
    pub schedule: String,
    pub next_page: String,
    pub total_count: String,
}

impl Default for ListingSelectors {
    fn default() -> Self {
        Self {
            row: r#"tr[id^="list"]"#.to_string(),
            title: "a.t3_sb".to_string(),
            title_fallback: "td.link a".to_string(),
            company: ".cp_name".to_string(),
            salary_fragment: "li.dollar span.item.b1_sb".to_string(),
            location_detail: "li.site p".to_string(),
            location: "li.site".to_string(),
            schedule: "li.time".to_string(),
            next_page: ".btn_page.next".to_string(),
            total_count: "span.txt_total".to_string(),
        }
    }
}

/// Timeouts and settle delays, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub navigation_timeout_ms: u64,
    pub navigation_retry_backoff_ms: u64,
    pub row_wait_timeout_ms: u64,
    pub new_tab_timeout_ms: u64,
    pub tab_ready_timeout_ms: u64,
    pub tab_settle_ms: u64,
    pub panel_settle_ms: u64,
    pub page_advance_timeout_ms: u64,
    pub page_settle_ms: u64,
    pub submit_jitter_min_ms: u64,
    pub submit_jitter_max_ms: u64,
    /// Poll interval for readiness and new-tab checks.
    pub poll_interval_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 30_000,
            navigation_retry_backoff_ms: 1_000,
            row_wait_timeout_ms: 5_000,
            new_tab_timeout_ms: 5_000,
            tab_ready_timeout_ms: 15_000,
            tab_settle_ms: 300,
            panel_settle_ms: 500,
            page_advance_timeout_ms: 5_000,
            page_settle_ms: 2_000,
            submit_jitter_min_ms: 400,
            submit_jitter_max_ms: 800,
            poll_interval_ms: 100,
        }
    }
}

impl Timing {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn navigation_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.navigation_retry_backoff_ms)
    }

    pub fn row_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.row_wait_timeout_ms)
    }

    pub fn new_tab_timeout(&self) -> Duration {
        Duration::from_millis(self.new_tab_timeout_ms)
    }

    pub fn tab_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.tab_ready_timeout_ms)
    }

    pub fn tab_settle(&self) -> Duration {
        Duration::from_millis(self.tab_settle_ms)
    }

    pub fn panel_settle(&self) -> Duration {
        Duration::from_millis(self.panel_settle_ms)
    }

    pub fn page_advance_timeout(&self) -> Duration {
        Duration::from_millis(self.page_advance_timeout_ms)
    }

    pub fn page_settle(&self) -> Duration {
        Duration::from_millis(self.page_settle_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Random pause between two tab submissions, uniform over the configured range.
    pub fn submit_jitter(&self) -> Duration {
        use rand::Rng;

        let low = self.submit_jitter_min_ms.min(self.submit_jitter_max_ms);
        let high = self.submit_jitter_min_ms.max(self.submit_jitter_max_ms);
        Duration::from_millis(rand::thread_rng().gen_range(low..=high))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    pub file_name: String,
    /// Used once when `file_name` is locked by another program.
    pub fallback_file_name: String,
    pub sheet_name: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            file_name: "worknet_results.xlsx".to_string(),
            fallback_file_name: "worknet_results_backup.xlsx".to_string(),
            sheet_name: "results".to_string(),
        }
    }
}
