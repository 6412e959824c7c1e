use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use crawl_logging::{crawl_error, crawl_info, crawl_warn};
use tokio_util::sync::CancellationToken;

use crate::browser::BrowserLauncher;
use crate::chrome::ChromeLauncher;
use crate::export::{SpreadsheetWriter, XlsxWriter};
use crate::progress::{ChannelProgressSink, ProgressSink};
use crate::run::{query_total_count, run_crawl};
use crate::settings::CrawlSettings;
use crate::types::{EngineEvent, FailureKind};

enum EngineCommand {
    StartCrawl { target: usize },
    QueryTotalCount,
    Stop,
}

/// Front door to the crawler: commands in, [`EngineEvent`]s out.
///
/// The engine lives on its own thread with its own tokio runtime, so callers
/// stay synchronous. At most one crawl runs at a time. Clones share the
/// same engine and event stream.
#[derive(Clone)]
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: Arc<Mutex<mpsc::Receiver<EngineEvent>>>,
}

struct EngineParts {
    settings: Arc<CrawlSettings>,
    launcher: Arc<dyn BrowserLauncher>,
    writer: Arc<dyn SpreadsheetWriter>,
    events: mpsc::Sender<EngineEvent>,
    /// Stop token of the crawl in progress, if any.
    active: Arc<Mutex<Option<CancellationToken>>>,
}

impl EngineHandle {
    /// An engine driving a real Chrome and writing `.xlsx` files.
    pub fn new(settings: CrawlSettings) -> Self {
        Self::with_parts(settings, Arc::new(ChromeLauncher), Arc::new(XlsxWriter))
    }

    pub fn with_parts(
        settings: CrawlSettings,
        launcher: Arc<dyn BrowserLauncher>,
        writer: Arc<dyn SpreadsheetWriter>,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let parts = EngineParts {
            settings: Arc::new(settings),
            launcher,
            writer,
            events: event_tx,
            active: Arc::new(Mutex::new(None)),
        };

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    crawl_error!("engine runtime could not start: {}", err);
                    let _ = parts.events.send(EngineEvent::RunFailed {
                        kind: FailureKind::BrowserLaunch,
                        message: format!("async runtime unavailable: {err}"),
                    });
                    return;
                }
            };
            while let Ok(command) = cmd_rx.recv() {
                handle_command(&runtime, &parts, command);
            }
        });

        Self {
            cmd_tx,
            event_rx: Arc::new(Mutex::new(event_rx)),
        }
    }

    pub fn start_crawl(&self, target: usize) {
        let _ = self.cmd_tx.send(EngineCommand::StartCrawl { target });
    }

    pub fn query_total_count(&self) {
        let _ = self.cmd_tx.send(EngineCommand::QueryTotalCount);
    }

    /// Asks the running crawl to stop scheduling. Tabs already open still
    /// finish and the partial results are exported.
    pub fn stop(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Stop);
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.events().try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        match self.events().recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(mpsc::RecvTimeoutError::Timeout) => None,
            // Engine thread is gone; wait out the timeout instead of spinning.
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                thread::sleep(timeout);
                None
            }
        }
    }

    fn events(&self) -> std::sync::MutexGuard<'_, mpsc::Receiver<EngineEvent>> {
        self.event_rx
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }
}

fn lock_active(
    active: &Mutex<Option<CancellationToken>>,
) -> std::sync::MutexGuard<'_, Option<CancellationToken>> {
    active.lock().unwrap_or_else(|poison| poison.into_inner())
}

fn handle_command(
    runtime: &tokio::runtime::Runtime,
    parts: &EngineParts,
    command: EngineCommand,
) {
    match command {
        EngineCommand::StartCrawl { target } => {
            let stop = {
                let mut active = lock_active(&parts.active);
                if active.is_some() {
                    crawl_warn!("start ignored: a crawl is already running");
                    let _ = parts.events.send(EngineEvent::Notice(
                        "a crawl is already running".to_string(),
                    ));
                    return;
                }
                let token = CancellationToken::new();
                *active = Some(token.clone());
                token
            };

            let settings = parts.settings.clone();
            let launcher = parts.launcher.clone();
            let writer = parts.writer.clone();
            let events = parts.events.clone();
            let active = parts.active.clone();
            runtime.spawn(async move {
                let sink: Arc<dyn ProgressSink> =
                    Arc::new(ChannelProgressSink::new(events.clone()));
                let result = run_crawl(
                    launcher.as_ref(),
                    settings,
                    target,
                    stop,
                    sink,
                    writer.as_ref(),
                )
                .await;
                lock_active(&active).take();

                let event = match result {
                    Ok(report) => EngineEvent::RunFinished(Box::new(report)),
                    Err(err) => {
                        crawl_error!("crawl failed: {}", err);
                        EngineEvent::RunFailed {
                            kind: err.kind(),
                            message: err.to_string(),
                        }
                    }
                };
                let _ = events.send(event);
            });
        }
        EngineCommand::QueryTotalCount => {
            let settings = parts.settings.clone();
            let launcher = parts.launcher.clone();
            let events = parts.events.clone();
            runtime.spawn(async move {
                let total = match query_total_count(launcher.as_ref(), &settings).await {
                    Ok(total) => total,
                    Err(err) => {
                        crawl_warn!("total count unavailable: {}", err);
                        let _ = events.send(EngineEvent::Notice(format!(
                            "total count unavailable: {err}"
                        )));
                        None
                    }
                };
                let _ = events.send(EngineEvent::TotalCount(total));
            });
        }
        EngineCommand::Stop => match lock_active(&parts.active).as_ref() {
            Some(token) => {
                crawl_info!("stop requested; finishing open tabs");
                token.cancel();
                let _ = parts
                    .events
                    .send(EngineEvent::Notice("stopping after open tabs finish".to_string()));
            }
            None => crawl_info!("stop requested but no crawl is running"),
        },
    }
}
