mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{fast_settings, init_logging, page, FakeLauncher, ListingScript, MemoryWriter};
use crawler_engine::{parse_count, EngineEvent, EngineHandle, FailureKind};
use pretty_assertions::assert_eq;

fn wait_for<T>(engine: &EngineHandle, mut pick: impl FnMut(EngineEvent) -> Option<T>) -> T {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if let Some(event) = engine.recv_timeout(Duration::from_millis(50)) {
            if let Some(found) = pick(event) {
                return found;
            }
        }
    }
    panic!("engine did not produce the expected event in time");
}

#[test]
fn crawl_command_reports_finished_run() {
    init_logging();
    let launcher = Arc::new(FakeLauncher::new(ListingScript::pages(vec![page("a", 3)])));
    let engine = EngineHandle::with_parts(fast_settings(), launcher, Arc::new(MemoryWriter::default()));

    engine.start_crawl(2);
    let report = wait_for(&engine, |event| match event {
        EngineEvent::RunFinished(report) => Some(report),
        _ => None,
    });

    assert_eq!(report.records.len(), 2);
    assert!(report.export.is_ok());
}

#[test]
fn launch_failure_is_reported_as_event() {
    init_logging();
    let mut script = ListingScript::pages(vec![page("a", 1)]);
    script.fail_launch = true;
    let engine = EngineHandle::with_parts(
        fast_settings(),
        Arc::new(FakeLauncher::new(script)),
        Arc::new(MemoryWriter::default()),
    );

    engine.start_crawl(1);
    let kind = wait_for(&engine, |event| match event {
        EngineEvent::RunFailed { kind, .. } => Some(kind),
        _ => None,
    });
    assert_eq!(kind, FailureKind::BrowserLaunch);
}

#[test]
fn total_count_query_round_trips() {
    init_logging();
    let mut script = ListingScript::pages(vec![page("a", 1)]);
    script.total = Some(48_213);
    let engine = EngineHandle::with_parts(
        fast_settings(),
        Arc::new(FakeLauncher::new(script)),
        Arc::new(MemoryWriter::default()),
    );

    engine.query_total_count();
    let total = wait_for(&engine, |event| match event {
        EngineEvent::TotalCount(total) => Some(total),
        _ => None,
    });
    assert_eq!(total, Some(48_213));
}

#[test]
fn count_text_is_read_as_digits() {
    assert_eq!(parse_count("총 1,234건"), Some(1234));
    assert_eq!(parse_count(""), None);
}
