mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{
    fast_settings, init_logging, page, FakeLauncher, FakeRow, FakeTab, ListingScript,
    MemoryWriter, PanelBehaviour, RecordingSink, TabBehaviour,
};
use crawler_engine::{
    run_crawl, CrawlError, CrawlSettings, DetailTabHandle, EngineEvent, FailureKind, LoadMilestone,
    RunReport, MISSING,
};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

async fn crawl(
    launcher: &FakeLauncher,
    settings: CrawlSettings,
    target: usize,
    stop: CancellationToken,
) -> (Result<RunReport, CrawlError>, Arc<RecordingSink>, MemoryWriter) {
    init_logging();
    let sink = Arc::new(RecordingSink::default());
    let writer = MemoryWriter::default();
    let result = run_crawl(
        launcher,
        Arc::new(settings),
        target,
        stop,
        sink.clone(),
        &writer,
    )
    .await;
    (result, sink, writer)
}

fn assert_every_tab_closed_once(launcher: &FakeLauncher) {
    let closes = launcher.log.close_counts();
    assert_eq!(closes.len(), launcher.log.opened.load(Ordering::SeqCst));
    assert!(closes.values().all(|count| *count == 1), "{closes:?}");
}

#[tokio::test]
async fn stops_scheduling_mid_page_at_target() {
    let launcher = FakeLauncher::new(ListingScript::pages(vec![
        page("a", 3),
        page("b", 3),
        page("c", 3),
    ]));

    let (result, _, writer) = crawl(&launcher, fast_settings(), 5, CancellationToken::new()).await;
    let report = result.unwrap();

    assert_eq!(report.progress.scheduled, 5);
    assert_eq!(report.records.len(), 5);
    assert_eq!(report.pages_visited, 2);
    assert_eq!(launcher.log.advance_calls.load(Ordering::SeqCst), 1);
    assert_eq!(launcher.log.opened.load(Ordering::SeqCst), 5);
    assert!(!report.stopped_early);

    let written = writer.written.lock().unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].0, "worknet_results.xlsx");
    assert_eq!(written[0].1.rows.len(), 5);
}

#[tokio::test]
async fn failing_task_is_contained() {
    let mut rows = page("a", 5);
    rows[2] = rows[2].clone().behaving(TabBehaviour::FailSnapshot);
    let launcher = FakeLauncher::new(ListingScript::pages(vec![rows]));

    let (result, _, _) = crawl(&launcher, fast_settings(), 5, CancellationToken::new()).await;
    let report = result.unwrap();

    assert_eq!(report.records.len(), 4);
    assert_eq!(report.progress.scheduled, 5);
    assert_eq!(report.progress.failed, 1);
    assert!(report.export.is_ok());
    assert_every_tab_closed_once(&launcher);
}

#[tokio::test]
async fn panicking_task_still_closes_its_tab() {
    let mut rows = page("a", 5);
    rows[0] = rows[0].clone().behaving(TabBehaviour::Panic);
    let launcher = FakeLauncher::new(ListingScript::pages(vec![rows]));

    let (result, _, _) = crawl(&launcher, fast_settings(), 5, CancellationToken::new()).await;
    let report = result.unwrap();

    assert_eq!(report.records.len(), 4);
    assert_eq!(report.progress.failed, 1);
    assert_every_tab_closed_once(&launcher);
}

#[tokio::test]
async fn rows_without_a_tab_are_skipped() {
    let mut rows = page("a", 4);
    rows[1] = rows[1].clone().failing_open();
    let launcher = FakeLauncher::new(ListingScript::pages(vec![rows]));

    let (result, _, _) = crawl(&launcher, fast_settings(), 10, CancellationToken::new()).await;
    let report = result.unwrap();

    assert_eq!(report.rows_skipped, 1);
    assert_eq!(report.progress.scheduled, 3);
    assert_eq!(report.records.len(), 3);
    let titles: Vec<&str> = report.records.iter().map(|r| r.title.as_str()).collect();
    assert!(!titles.contains(&"a-1"));
}

#[tokio::test]
async fn empty_listing_ends_gracefully() {
    let launcher = FakeLauncher::new(ListingScript::pages(vec![]));

    let (result, _, writer) = crawl(&launcher, fast_settings(), 10, CancellationToken::new()).await;
    let report = result.unwrap();

    assert_eq!(report.pages_visited, 0);
    assert!(report.records.is_empty());
    assert_eq!(writer.written.lock().unwrap()[0].1.rows.len(), 0);
    assert_eq!(launcher.log.shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn last_page_ends_walk_below_target() {
    let launcher = FakeLauncher::new(ListingScript::pages(vec![page("a", 2), page("b", 1)]));

    let (result, _, _) = crawl(&launcher, fast_settings(), 50, CancellationToken::new()).await;
    let report = result.unwrap();

    assert_eq!(report.records.len(), 3);
    assert_eq!(report.pages_visited, 2);
    assert_eq!(launcher.log.advance_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn stop_request_keeps_collected_records() {
    let stop = CancellationToken::new();
    let mut script = ListingScript::pages(vec![page("a", 3), page("b", 3)]);
    script.stop_on_advance = Some(stop.clone());
    let launcher = FakeLauncher::new(script);

    let (result, _, writer) = crawl(&launcher, fast_settings(), 10, stop).await;
    let report = result.unwrap();

    assert!(report.stopped_early);
    assert_eq!(report.records.len(), 3);
    assert_eq!(writer.written.lock().unwrap()[0].1.rows.len(), 3);
    assert_every_tab_closed_once(&launcher);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_extractions_never_exceed_capacity() {
    let mut script = ListingScript::pages(vec![page("a", 8)]);
    script.snapshot_delay = Duration::from_millis(30);
    let launcher = FakeLauncher::new(script);
    let settings = CrawlSettings {
        max_concurrent_tabs: 2,
        ..fast_settings()
    };

    let (result, _, _) = crawl(&launcher, settings, 8, CancellationToken::new()).await;
    let report = result.unwrap();

    assert_eq!(report.records.len(), 8);
    let max_active = launcher.log.max_active.load(Ordering::SeqCst);
    assert!(max_active <= 2, "saw {max_active} extractions at once");
    assert_eq!(launcher.log.active.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn listing_attributes_are_normalized() {
    let mut row = FakeRow::titled("  데이터 엔지니어  ");
    row.raw.salary_parts = vec!["월급 300만원".to_string(), "  ".to_string(), "협의 가능".to_string()];
    row.raw.location_detail = Some(" 서울 마포구 ".to_string());
    row.raw.location = Some("서울 마포구 외 2곳".to_string());
    let launcher = FakeLauncher::new(ListingScript::pages(vec![vec![row]]));

    let (result, _, _) = crawl(&launcher, fast_settings(), 1, CancellationToken::new()).await;
    let record = result.unwrap().records.remove(0);

    assert_eq!(record.title, "데이터 엔지니어");
    assert_eq!(record.salary, "월급 300만원 / 협의 가능");
    assert_eq!(record.location, "서울 마포구");
    assert_eq!(record.schedule, MISSING);
    assert_eq!(record.industry, "제조업");
}

#[tokio::test]
async fn failed_full_load_is_retried_lighter() {
    let mut script = ListingScript::pages(vec![page("a", 1)]);
    script.fail_load = true;
    let launcher = FakeLauncher::new(script);

    let (result, _, _) = crawl(&launcher, fast_settings(), 1, CancellationToken::new()).await;

    assert_eq!(result.unwrap().records.len(), 1);
    assert_eq!(
        *launcher.log.navigations.lock().unwrap(),
        vec![LoadMilestone::Load, LoadMilestone::DomContentLoaded]
    );
}

#[tokio::test]
async fn launch_failure_is_fatal() {
    let mut script = ListingScript::pages(vec![page("a", 1)]);
    script.fail_launch = true;
    let launcher = FakeLauncher::new(script);

    let (result, _, writer) = crawl(&launcher, fast_settings(), 1, CancellationToken::new()).await;

    let err = result.unwrap_err();
    assert_eq!(err.kind(), FailureKind::BrowserLaunch);
    assert!(writer.written.lock().unwrap().is_empty());
}

#[tokio::test]
async fn listing_tab_failure_shuts_the_browser_down() {
    let mut script = ListingScript::pages(vec![page("a", 1)]);
    script.fail_listing = true;
    let launcher = FakeLauncher::new(script);

    let (result, _, _) = crawl(&launcher, fast_settings(), 1, CancellationToken::new()).await;

    assert_eq!(result.unwrap_err().kind(), FailureKind::ListingPage);
    assert_eq!(launcher.log.shutdowns.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unusable_start_url_is_rejected_before_launch() {
    let launcher = FakeLauncher::new(ListingScript::pages(vec![page("a", 1)]));
    let settings = CrawlSettings {
        start_url: "ftp://work24.example/list".to_string(),
        ..fast_settings()
    };

    let (result, _, _) = crawl(&launcher, settings, 1, CancellationToken::new()).await;

    assert!(matches!(result, Err(CrawlError::InvalidStartUrl { .. })));
    assert_eq!(launcher.log.shutdowns.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn progress_reports_reach_the_sink() {
    let launcher = FakeLauncher::new(ListingScript::pages(vec![page("a", 2)]));

    let (result, sink, _) = crawl(&launcher, fast_settings(), 2, CancellationToken::new()).await;
    result.unwrap();

    let events = sink.events.lock().unwrap();
    assert!(events
        .iter()
        .any(|e| matches!(e, EngineEvent::PageStarted { page: 1, .. })));
    let last_progress = events
        .iter()
        .rev()
        .find_map(|e| match e {
            EngineEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .unwrap();
    assert_eq!(last_progress.completed, 2);
}

#[tokio::test]
async fn dropped_tab_handle_closes_in_background() {
    let log = Arc::new(common::BrowserLog::default());
    let handle = DetailTabHandle::new(Box::new(FakeTab::new("orphan", log.clone())));
    drop(handle);

    for _ in 0..50 {
        if !log.close_counts().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(log.close_counts().get("orphan"), Some(&1));
}

#[tokio::test]
async fn company_panel_content_is_scraped_after_click() {
    let row = FakeRow::titled("생산직").with_panel(PanelBehaviour::Opens(
        "<table><tr><th>근로자수</th><td>42명</td></tr></table>".to_string(),
    ));
    let launcher = FakeLauncher::new(ListingScript::pages(vec![vec![row]]));

    let (result, _, _) = crawl(&launcher, fast_settings(), 1, CancellationToken::new()).await;
    let report = result.unwrap();

    assert_eq!(launcher.log.panel_clicks.load(Ordering::SeqCst), 1);
    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].employees, "42명");
    assert_eq!(report.records[0].industry, "제조업");
    assert_every_tab_closed_once(&launcher);
}

#[tokio::test]
async fn failed_panel_click_still_collects_record() {
    let row = FakeRow::titled("사무직").with_panel(PanelBehaviour::Fails);
    let launcher = FakeLauncher::new(ListingScript::pages(vec![vec![row]]));

    let (result, _, _) = crawl(&launcher, fast_settings(), 1, CancellationToken::new()).await;
    let report = result.unwrap();

    assert_eq!(report.records.len(), 1);
    assert_eq!(report.records[0].industry, "제조업");
    assert_eq!(report.progress.failed, 0);
    assert_every_tab_closed_once(&launcher);
}

#[tokio::test]
async fn tab_that_never_reports_ready_is_still_scraped() {
    let rows = vec![
        FakeRow::titled("느린탭").never_ready(),
        FakeRow::titled("정상탭"),
    ];
    let launcher = FakeLauncher::new(ListingScript::pages(vec![rows]));

    let (result, _, _) = crawl(&launcher, fast_settings(), 2, CancellationToken::new()).await;
    let report = result.unwrap();

    assert_eq!(report.records.len(), 2);
    assert!(report.records.iter().all(|record| record.industry == "제조업"));
    assert_every_tab_closed_once(&launcher);
}
