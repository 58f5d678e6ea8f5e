// crates/build-verdict-server/tests/poller.rs
// ============================================================================
// Module: Refresh Loop Tests
// Description: Startup, failure, timeout, and shutdown behavior of the poller.
// Purpose: Ensure only complete cycles publish and shutdown is cooperative.
// Dependencies: build-verdict-server, build-verdict-core, tokio
// ============================================================================

//! ## Overview
//! Drives [`RefreshPoller`] against an in-memory source with injectable
//! latency and failures.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use build_verdict_core::BranchName;
use build_verdict_core::BuildOutcome;
use build_verdict_core::BuildStatus;
use build_verdict_core::InMemoryRecordSource;
use build_verdict_core::RecordSource;
use build_verdict_core::RecordSourceError;
use build_verdict_core::SharedRecordSource;
use build_verdict_core::SnapshotReader;
use build_verdict_core::snapshot_store;
use build_verdict_server::AuditSink;
use build_verdict_server::CycleStatus;
use build_verdict_server::PollerSettings;
use build_verdict_server::RefreshAuditEvent;
use build_verdict_server::RefreshPoller;
use build_verdict_server::ServerError;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// In-memory source with adjustable latency, failure, and overlap tracking.
#[derive(Default)]
struct ScriptedSource {
    inner: InMemoryRecordSource,
    delay_ms: AtomicU64,
    fail: AtomicBool,
    fetches: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl RecordSource for ScriptedSource {
    fn list_monitored_branches(&self) -> Result<Vec<BranchName>, RecordSourceError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(RecordSourceError::Unavailable("database offline".to_string()));
        }
        self.inner.list_monitored_branches()
    }

    fn outcomes(&self, branch: &BranchName) -> Result<Vec<BuildOutcome>, RecordSourceError> {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        self.fetches.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(self.delay_ms.load(Ordering::SeqCst)));
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.inner.outcomes(branch)
    }
}

/// Audit sink that keeps refresh outcomes.
#[derive(Default)]
struct RecordingSink {
    refreshes: Mutex<Vec<RefreshAuditEvent>>,
}

impl RecordingSink {
    fn outcomes(&self) -> Vec<&'static str> {
        self.refreshes.lock().unwrap().iter().map(|event| event.outcome).collect()
    }
}

impl AuditSink for RecordingSink {
    fn record_refresh(&self, event: &RefreshAuditEvent) {
        self.refreshes.lock().unwrap().push(event.clone());
    }
}

fn seeded_source() -> Arc<ScriptedSource> {
    let source = ScriptedSource::default();
    source.inner.add_branch("Main", true).unwrap();
    source.inner.add_branch("Release", true).unwrap();
    source.inner.record("Main", BuildOutcome::new(100, BuildStatus::Bad, "bob", 0)).unwrap();
    source.inner.record("Release", BuildOutcome::new(40, BuildStatus::Good, "amy", 0)).unwrap();
    Arc::new(source)
}

fn poller_for(
    source: &Arc<ScriptedSource>,
    sink: &Arc<RecordingSink>,
    settings: PollerSettings,
) -> (RefreshPoller, SnapshotReader) {
    let (publisher, reader) = snapshot_store();
    let shared = SharedRecordSource::new(source.clone());
    let poller = RefreshPoller::new(shared, publisher, sink.clone(), settings);
    (poller, reader)
}

fn settings(interval_ms: u64, timeout_ms: Option<u64>) -> PollerSettings {
    PollerSettings {
        interval: Duration::from_millis(interval_ms),
        cycle_timeout: timeout_ms.map(Duration::from_millis),
    }
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition reached in time");
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[tokio::test]
async fn initial_refresh_publishes_snapshot() {
    let source = seeded_source();
    let sink = Arc::new(RecordingSink::default());
    let (mut poller, reader) = poller_for(&source, &sink, settings(1_000, None));

    let report = poller.initial_refresh().await.unwrap();
    assert_eq!(report.branches, 2);
    assert!(reader.last_refreshed().is_some());
    assert_eq!(reader.lookup("Main", "bob"), (BuildStatus::Bad, BuildStatus::Bad));
    assert_eq!(reader.lookup("Release", "AMY"), (BuildStatus::Good, BuildStatus::Good));
    assert_eq!(sink.outcomes(), vec!["published"]);
    assert_eq!(sink.refreshes.lock().unwrap()[0].branches, 2);
}

#[tokio::test]
async fn initial_refresh_failure_is_fatal() {
    let source = seeded_source();
    source.fail.store(true, Ordering::SeqCst);
    let sink = Arc::new(RecordingSink::default());
    let (mut poller, reader) = poller_for(&source, &sink, settings(1_000, None));

    let err = poller.initial_refresh().await.unwrap_err();
    assert!(matches!(err, ServerError::Refresh(message) if message.contains("database offline")));
    assert!(reader.last_refreshed().is_none());
}

#[tokio::test]
async fn failed_cycle_keeps_previous_snapshot() {
    let source = seeded_source();
    let sink = Arc::new(RecordingSink::default());
    let (mut poller, reader) = poller_for(&source, &sink, settings(1_000, None));
    poller.initial_refresh().await.unwrap();
    let before = reader.current();

    source.fail.store(true, Ordering::SeqCst);
    source.inner.record("Main", BuildOutcome::new(101, BuildStatus::Good, "cid", 0)).unwrap();
    let status = poller.run_cycle().await;
    assert!(matches!(status, CycleStatus::Failed(_)));
    assert!(Arc::ptr_eq(&before, &reader.current()));
    assert_eq!(reader.lookup("Main", "bob"), (BuildStatus::Bad, BuildStatus::Bad));

    let events = sink.refreshes.lock().unwrap();
    assert_eq!(events[1].outcome, "failed");
    assert!(events[1].error.as_deref().unwrap().contains("database offline"));
}

#[tokio::test]
async fn empty_branch_is_reported_and_carried_over() {
    let source = seeded_source();
    let sink = Arc::new(RecordingSink::default());
    let (mut poller, reader) = poller_for(&source, &sink, settings(1_000, None));
    source.inner.add_branch("Dev", true).unwrap();

    let status = poller.run_cycle().await;
    let CycleStatus::Published(report) = status else {
        panic!("expected publish, got {status:?}");
    };
    assert_eq!(report.empty, vec![BranchName::new("Dev")]);
    assert_eq!(reader.list_branches().len(), 3);
    assert_eq!(reader.lookup("Dev", "bob"), (BuildStatus::Unknown, BuildStatus::Unknown));
    assert_eq!(sink.refreshes.lock().unwrap()[0].empty_branches, vec!["Dev".to_string()]);
}

#[tokio::test]
async fn timed_out_cycle_publishes_nothing_and_straggler_settles_first() {
    let source = seeded_source();
    source.delay_ms.store(300, Ordering::SeqCst);
    let sink = Arc::new(RecordingSink::default());
    let (mut poller, reader) = poller_for(&source, &sink, settings(1_000, Some(50)));

    assert_eq!(poller.run_cycle().await, CycleStatus::TimedOut);
    assert!(reader.last_refreshed().is_none());

    source.delay_ms.store(0, Ordering::SeqCst);
    let status = poller.run_cycle().await;
    assert!(matches!(status, CycleStatus::Published(_)));
    assert_eq!(source.max_active.load(Ordering::SeqCst), 1);
    // Straggler stopped after its first branch; the new cycle read both.
    assert_eq!(source.fetches.load(Ordering::SeqCst), 3);
    assert_eq!(sink.outcomes(), vec!["timed_out", "published"]);
}

#[tokio::test]
async fn spawned_loop_picks_up_new_records_and_stops() {
    let source = seeded_source();
    let sink = Arc::new(RecordingSink::default());
    let (mut poller, reader) = poller_for(&source, &sink, settings(20, None));
    poller.initial_refresh().await.unwrap();
    let handle = poller.spawn();

    source.inner.record("Main", BuildOutcome::new(101, BuildStatus::Good, "cid", 0)).unwrap();
    wait_for(|| reader.lookup("Main", "cid") == (BuildStatus::Good, BuildStatus::Good)).await;
    assert_eq!(reader.lookup("Main", "bob"), (BuildStatus::Good, BuildStatus::Good));

    handle.shutdown().await.unwrap();
    let published = sink.outcomes().len();
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(sink.outcomes().len(), published);
}

#[tokio::test]
async fn shutdown_abandons_in_flight_cycle_without_publishing() {
    let source = seeded_source();
    source.delay_ms.store(300, Ordering::SeqCst);
    let sink = Arc::new(RecordingSink::default());
    let (poller, reader) = poller_for(&source, &sink, settings(1_000, None));
    let handle = poller.spawn();

    wait_for(|| source.fetches.load(Ordering::SeqCst) == 1).await;
    handle.shutdown().await.unwrap();
    assert_eq!(source.active.load(Ordering::SeqCst), 0);
    assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    assert!(reader.last_refreshed().is_none());
    assert_eq!(sink.outcomes(), vec!["cancelled"]);
}

#[tokio::test]
async fn readers_see_previous_snapshot_while_cycle_is_in_flight() {
    let source = seeded_source();
    let sink = Arc::new(RecordingSink::default());
    let (mut poller, reader) = poller_for(&source, &sink, settings(1_000, None));
    poller.initial_refresh().await.unwrap();
    let before = reader.current();

    source.delay_ms.store(200, Ordering::SeqCst);
    source.inner.record("Main", BuildOutcome::new(101, BuildStatus::Good, "cid", 0)).unwrap();
    let cycle = tokio::spawn(async move { poller.run_cycle().await });

    // First branch of the new cycle is being read.
    wait_for(|| source.fetches.load(Ordering::SeqCst) == 3).await;
    assert!(Arc::ptr_eq(&before, &reader.current()));
    assert_eq!(reader.lookup("Main", "bob"), (BuildStatus::Bad, BuildStatus::Bad));
    assert_eq!(reader.lookup("Main", "cid"), (BuildStatus::Bad, BuildStatus::Unknown));

    // Main is derived but the cycle has not finished reading Release.
    wait_for(|| source.fetches.load(Ordering::SeqCst) == 4).await;
    assert!(Arc::ptr_eq(&before, &reader.current()));
    assert_eq!(reader.lookup("Main", "bob"), (BuildStatus::Bad, BuildStatus::Bad));
    assert_eq!(reader.last_refreshed(), before.refreshed_at());

    let status = cycle.await.unwrap();
    assert!(matches!(status, CycleStatus::Published(_)));
    assert!(!Arc::ptr_eq(&before, &reader.current()));
    assert_eq!(reader.lookup("Main", "bob"), (BuildStatus::Good, BuildStatus::Good));
    assert_eq!(reader.lookup("Main", "cid"), (BuildStatus::Good, BuildStatus::Good));
    assert_eq!(reader.lookup("Release", "amy"), (BuildStatus::Good, BuildStatus::Good));
}
