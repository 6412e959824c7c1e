//! chromiumoxide implementation of the browser traits.
//!
//! DOM reads go through small `evaluate` scripts that return JSON, so one
//! protocol round trip serves a whole row or a whole tab snapshot.
use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EnableParams, SetBlockedUrLsParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    AddScriptToEvaluateOnNewDocumentParams, NavigateParams,
};
use chromiumoxide::cdp::browser_protocol::target::GetTargetsParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::{Browser, BrowserConfig, Page};
use crawl_logging::{crawl_debug, crawl_info, crawl_trace, crawl_warn};
use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::browser::{
    BrowserError, BrowserLauncher, BrowserSession, DetailTab, ListingPage, LoadMilestone,
};
use crate::document::{DocumentSet, PageDocument};
use crate::settings::CrawlSettings;
use crate::types::RawListingRow;

/// Ctrl opens a link in a background tab; macOS uses Cmd instead.
const NEW_TAB_MODIFIER: i64 = if cfg!(target_os = "macos") { 4 } else { 2 };

fn protocol(err: CdpError) -> BrowserError {
    BrowserError::Protocol(err.to_string())
}

/// Quotes `value` as a JavaScript string literal.
fn js_str(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

async fn eval<T: DeserializeOwned>(page: &Page, script: String) -> Result<T, BrowserError> {
    page.evaluate(script)
        .await
        .map_err(protocol)?
        .into_value::<T>()
        .map_err(|e| BrowserError::Protocol(format!("unexpected script result: {e}")))
}

async fn with_timeout<T, F>(what: &str, timeout: Duration, fut: F) -> Result<T, BrowserError>
where
    F: Future<Output = Result<T, BrowserError>>,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| BrowserError::timeout(what, timeout))?
}

/// Polls `document.readyState` until `milestone` is reached.
async fn wait_for_ready_state(
    page: &Page,
    milestone: LoadMilestone,
    timeout: Duration,
    poll: Duration,
) -> Result<(), BrowserError> {
    let check = match milestone {
        LoadMilestone::Load => "document.readyState === 'complete'",
        LoadMilestone::DomContentLoaded => "document.readyState !== 'loading'",
    };
    with_timeout("document ready state", timeout, async {
        loop {
            match eval::<bool>(page, check.to_string()).await {
                Ok(true) => return Ok(()),
                Ok(false) => {}
                // The execution context is replaced while a navigation commits.
                Err(err) => crawl_trace!("ready state probe failed: {}", err),
            }
            tokio::time::sleep(poll).await;
        }
    })
    .await
}

/// Blocks heavy static resources on `page`. Best effort.
async fn block_resources(page: &Page, patterns: &[String]) {
    if patterns.is_empty() {
        return;
    }
    if let Err(err) = page.execute(EnableParams::default()).await {
        crawl_debug!("network domain unavailable: {}", err);
        return;
    }
    if let Err(err) = page
        .execute(SetBlockedUrLsParams::new(patterns.to_vec()))
        .await
    {
        crawl_debug!("resource blocking not applied: {}", err);
    }
}

/// User agent override, masking script and resource blocking for `page`.
/// Applies to documents loaded after this returns.
async fn disguise(page: &Page, settings: &CrawlSettings) {
    if let Err(err) = page
        .execute(SetUserAgentOverrideParams::new(settings.user_agent.clone()))
        .await
    {
        crawl_warn!("user agent override failed: {}", err);
    }
    if !settings.stealth_script.is_empty() {
        if let Err(err) = page
            .execute(AddScriptToEvaluateOnNewDocumentParams::new(
                settings.stealth_script.clone(),
            ))
            .await
        {
            crawl_warn!("automation masking script not installed: {}", err);
        }
    }
    block_resources(page, &settings.blocked_url_patterns).await;
}

fn target_key(page: &Page) -> String {
    page.target_id().inner().clone()
}

/// A browser target as listed by `Target.getTargets`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEntry {
    pub id: String,
    pub kind: String,
    pub opener: Option<String>,
}

/// The page target `opener` opened that is not among `known`.
///
/// Targets opened by anything else, such as a popup from a detail tab, are
/// never mistaken for the row's tab.
pub fn opened_tab<'a>(
    targets: &'a [TargetEntry],
    known: &HashSet<String>,
    opener: &str,
) -> Option<&'a TargetEntry> {
    targets.iter().find(|target| {
        target.kind == "page"
            && !known.contains(&target.id)
            && target.opener.as_deref() == Some(opener)
    })
}

/// Command-line switches for every launch. The user agent is set here so
/// tabs opened by the page use it from their first request.
pub fn launch_args(settings: &CrawlSettings) -> Vec<String> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
    ];
    if !settings.user_agent.is_empty() {
        args.push(format!("--user-agent={}", settings.user_agent));
    }
    args
}

pub struct ChromeLauncher;

#[async_trait::async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(
        &self,
        settings: &CrawlSettings,
    ) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let mut builder =
            BrowserConfig::builder().window_size(settings.window_width, settings.window_height);
        for arg in launch_args(settings) {
            builder = builder.arg(arg);
        }
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(executable) = &settings.browser_executable {
            builder = builder.chrome_executable(executable);
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    crawl_trace!("browser handler: {}", err);
                }
            }
            crawl_debug!("browser handler finished");
        });

        crawl_info!(
            "browser launched ({})",
            if settings.headless { "headless" } else { "visible" }
        );
        Ok(Box::new(ChromeSession {
            browser: Arc::new(Mutex::new(browser)),
            handler: Mutex::new(Some(handler_task)),
            settings: Arc::new(settings.clone()),
        }))
    }
}

pub struct ChromeSession {
    browser: Arc<Mutex<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    settings: Arc<CrawlSettings>,
}

#[async_trait::async_trait]
impl BrowserSession for ChromeSession {
    async fn new_listing_page(&self) -> Result<Box<dyn ListingPage>, BrowserError> {
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(protocol)?;
        disguise(&page, &self.settings).await;

        Ok(Box::new(ChromeListingPage {
            page,
            browser: self.browser.clone(),
            settings: self.settings.clone(),
        }))
    }

    async fn shutdown(&self) -> Result<(), BrowserError> {
        let closed = self.browser.lock().await.close().await;
        if let Some(handler) = self.handler.lock().await.take() {
            handler.abort();
        }
        closed.map(|_| ()).map_err(protocol)
    }
}

pub struct ChromeListingPage {
    page: Page,
    browser: Arc<Mutex<Browser>>,
    settings: Arc<CrawlSettings>,
}

impl ChromeListingPage {
    async fn targets(&self) -> Result<Vec<TargetEntry>, BrowserError> {
        let response = self
            .browser
            .lock()
            .await
            .execute(GetTargetsParams::default())
            .await
            .map_err(protocol)?;
        Ok(response
            .result
            .target_infos
            .iter()
            .map(|info| TargetEntry {
                id: info.target_id.inner().clone(),
                kind: info.r#type.clone(),
                opener: info.opener_id.as_ref().map(|id| id.inner().clone()),
            })
            .collect())
    }

    /// Waits until the tab this listing opened shows up as a page.
    async fn find_opened_page(&self, known: &HashSet<String>) -> Result<Page, BrowserError> {
        let opener = target_key(&self.page);
        let poll = self.settings.timing.poll_interval();
        loop {
            let targets = self.targets().await?;
            if let Some(entry) = opened_tab(&targets, known, &opener) {
                let pages = self.browser.lock().await.pages().await.map_err(protocol)?;
                if let Some(page) = pages.into_iter().find(|page| target_key(page) == entry.id) {
                    return Ok(page);
                }
            }
            tokio::time::sleep(poll).await;
        }
    }

    async fn ctrl_click_title(&self, index: usize) -> Result<(), BrowserError> {
        let selectors = &self.settings.selectors;
        let rows = self
            .page
            .find_elements(selectors.row.as_str())
            .await
            .map_err(protocol)?;
        let row = rows
            .get(index)
            .ok_or_else(|| BrowserError::ElementMissing(format!("row {index}")))?;

        let link = match row.find_element(selectors.title.as_str()).await {
            Ok(link) => link,
            Err(_) => row
                .find_element(selectors.title_fallback.as_str())
                .await
                .map_err(|_| BrowserError::ElementMissing(format!("title link in row {index}")))?,
        };
        link.scroll_into_view().await.map_err(protocol)?;
        let point = link.clickable_point().await.map_err(protocol)?;

        for kind in [
            DispatchMouseEventType::MousePressed,
            DispatchMouseEventType::MouseReleased,
        ] {
            let params = DispatchMouseEventParams::builder()
                .r#type(kind)
                .x(point.x)
                .y(point.y)
                .button(MouseButton::Left)
                .click_count(1)
                .modifiers(NEW_TAB_MODIFIER)
                .build()
                .map_err(BrowserError::Protocol)?;
            self.page.execute(params).await.map_err(protocol)?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ListingPage for ChromeListingPage {
    async fn navigate(
        &self,
        url: &str,
        until: LoadMilestone,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        crawl_debug!("navigating to {} (until {:?})", url, until);
        match until {
            LoadMilestone::Load => {
                with_timeout("listing page load", timeout, async {
                    self.page
                        .goto(url)
                        .await
                        .map(|_| ())
                        .map_err(|e| BrowserError::Navigation(e.to_string()))
                })
                .await
            }
            LoadMilestone::DomContentLoaded => {
                self.page
                    .execute(NavigateParams::new(url))
                    .await
                    .map_err(|e| BrowserError::Navigation(e.to_string()))?;
                wait_for_ready_state(
                    &self.page,
                    LoadMilestone::DomContentLoaded,
                    timeout,
                    self.settings.timing.poll_interval(),
                )
                .await
            }
        }
    }

    async fn wait_for_rows(&self, timeout: Duration) -> Result<usize, BrowserError> {
        let script = format!(
            "document.querySelectorAll({}).length",
            js_str(&self.settings.selectors.row)
        );
        let poll = self.settings.timing.poll_interval();
        with_timeout("result rows", timeout, async {
            loop {
                let rows = eval::<usize>(&self.page, script.clone()).await.unwrap_or(0);
                if rows > 0 {
                    return Ok(rows);
                }
                tokio::time::sleep(poll).await;
            }
        })
        .await
    }

    async fn read_row(&self, index: usize) -> Result<RawListingRow, BrowserError> {
        let s = &self.settings.selectors;
        let script = format!(
            r#"(() => {{
    const row = document.querySelectorAll({row})[{index}];
    if (!row) return {{ missing: true }};
    const text = (sel) => {{
        const el = row.querySelector(sel);
        return el ? el.textContent : null;
    }};
    const title = row.querySelector({title}) || row.querySelector({title_fallback});
    return {{
        missing: false,
        row: {{
            title: title ? title.textContent : null,
            company: text({company}),
            salary_parts: Array.from(row.querySelectorAll({salary})).map(el => el.textContent),
            location_detail: text({location_detail}),
            location: text({location}),
            schedule: text({schedule}),
        }},
    }};
}})()"#,
            row = js_str(&s.row),
            title = js_str(&s.title),
            title_fallback = js_str(&s.title_fallback),
            company = js_str(&s.company),
            salary = js_str(&s.salary_fragment),
            location_detail = js_str(&s.location_detail),
            location = js_str(&s.location),
            schedule = js_str(&s.schedule),
        );

        #[derive(serde::Deserialize)]
        struct RowProbe {
            missing: bool,
            #[serde(default)]
            row: RawListingRow,
        }

        let probe: RowProbe = eval(&self.page, script).await?;
        if probe.missing {
            return Err(BrowserError::ElementMissing(format!("row {index}")));
        }
        Ok(probe.row)
    }

    async fn open_row_in_new_tab(
        &self,
        index: usize,
        timeout: Duration,
    ) -> Result<Box<dyn DetailTab>, BrowserError> {
        let known: HashSet<String> =
            self.targets().await?.into_iter().map(|target| target.id).collect();
        self.ctrl_click_title(index).await?;

        let page = with_timeout("new detail tab", timeout, self.find_opened_page(&known)).await?;

        // The tab started loading before it could be set up; load it again
        // under the masking script and resource blocking.
        disguise(&page, &self.settings).await;
        match tokio::time::timeout(self.settings.timing.tab_ready_timeout(), page.reload()).await {
            Ok(Ok(_)) => {}
            Ok(Err(err)) => crawl_debug!("detail tab reload failed: {}", err),
            Err(_) => crawl_debug!("detail tab reload still loading; continuing"),
        }
        let poll = self.settings.timing.poll_interval();
        let id: String = target_key(&page).chars().take(8).collect();
        crawl_trace!("row {} opened tab {}", index, id);
        Ok(Box::new(ChromeDetailTab {
            page,
            id,
            poll,
        }))
    }

    async fn advance_page(&self, timeout: Duration) -> Result<bool, BrowserError> {
        let selector = &self.settings.selectors.next_page;
        let exists: bool = eval(
            &self.page,
            format!("document.querySelector({}) !== null", js_str(selector)),
        )
        .await?;
        if !exists {
            return Ok(false);
        }

        let next = self
            .page
            .find_element(selector.as_str())
            .await
            .map_err(protocol)?;
        next.click().await.map_err(protocol)?;

        // Some boards repaint the table in place, so no navigation is fine.
        if tokio::time::timeout(timeout, self.page.wait_for_navigation())
            .await
            .is_err()
        {
            crawl_debug!("no navigation within {:?} after next-page click", timeout);
        }
        Ok(true)
    }

    async fn total_count(&self) -> Result<Option<u64>, BrowserError> {
        let script = format!(
            "(() => {{ const el = document.querySelector({}); \
             return el ? el.textContent : ''; }})()",
            js_str(&self.settings.selectors.total_count)
        );
        let text: String = eval(&self.page, script).await?;
        Ok(parse_count(&text))
    }
}

/// Reads a count like `"1,234건"` as 1234.
pub fn parse_count(text: &str) -> Option<u64> {
    let digits: String = text.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

pub struct ChromeDetailTab {
    page: Page,
    id: String,
    poll: Duration,
}

const SNAPSHOT_SCRIPT: &str = r#"(() => {
    const docs = [];
    const visit = (doc) => {
        try {
            docs.push({
                markup: doc.documentElement ? doc.documentElement.outerHTML : '',
                text: doc.body ? doc.body.innerText : '',
            });
        } catch (e) {
            return;
        }
        for (const frame of Array.from(doc.querySelectorAll('iframe, frame'))) {
            try {
                if (frame.contentDocument) visit(frame.contentDocument);
            } catch (e) {}
        }
    };
    visit(document);
    return docs;
})()"#;

#[async_trait::async_trait]
impl DetailTab for ChromeDetailTab {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn wait_until(
        &self,
        milestone: LoadMilestone,
        timeout: Duration,
    ) -> Result<(), BrowserError> {
        wait_for_ready_state(&self.page, milestone, timeout, self.poll).await
    }

    async fn activate_panel(&self, labels: &[String]) -> Result<bool, BrowserError> {
        let labels = serde_json::to_string(labels)
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;
        let script = format!(
            r#"(() => {{
    const labels = {labels};
    const visible = (el) => !!(el.offsetWidth || el.offsetHeight || el.getClientRects().length);
    for (const el of Array.from(document.querySelectorAll('a, li, button'))) {{
        const text = el.textContent || '';
        if (visible(el) && labels.some(label => text.includes(label))) {{
            el.click();
            return true;
        }}
    }}
    return false;
}})()"#
        );
        eval(&self.page, script).await
    }

    async fn snapshot(&self) -> Result<DocumentSet, BrowserError> {
        let documents: Vec<PageDocument> = eval(&self.page, SNAPSHOT_SCRIPT.to_string()).await?;
        if documents.is_empty() {
            return Err(BrowserError::ElementMissing("document element".to_string()));
        }
        Ok(DocumentSet::new(documents))
    }

    async fn close(&self) -> Result<(), BrowserError> {
        self.page.clone().close().await.map_err(protocol)
    }
}
