// crates/build-verdict-server/src/poller.rs
// ============================================================================
// Module: Build Verdict Refresh Loop
// Description: Background task that republishes branch verdicts on a cadence.
// Purpose: Drive refresh cycles off the async runtime with cooperative stop.
// Dependencies: build-verdict-core, tokio
// ============================================================================

//! ## Overview
//! [`RefreshPoller`] owns the only [`SnapshotPublisher`]. Each cycle runs
//! [`build_snapshot`] on a blocking worker thread, publishes the result, and
//! records an audit event. Shutdown is cooperative: the cycle observes the
//! signal at its safe points and the handle awaits the worker before
//! returning.
//!
//! A cycle that exceeds the optional timeout is treated as failed. Its
//! worker is told to stop and is awaited before the next cycle begins, so at
//! most one cycle touches the record source at a time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use build_verdict_core::CycleOutcome;
use build_verdict_core::CycleReport;
use build_verdict_core::RefreshError;
use build_verdict_core::SharedRecordSource;
use build_verdict_core::SnapshotPublisher;
use build_verdict_core::SnapshotReader;
use build_verdict_core::build_snapshot;
use tokio::sync::watch;
use tokio::task::JoinError;
use tokio::task::JoinHandle;

use crate::audit::AuditSink;
use crate::audit::RefreshAuditEvent;
use crate::server::ServerError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Timing settings for the refresh loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    /// Delay between the end of one cycle and the start of the next.
    pub interval: Duration,
    /// Optional upper bound on a single cycle.
    pub cycle_timeout: Option<Duration>,
}

/// Result of one refresh cycle as seen by the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleStatus {
    /// A new snapshot was published.
    Published(CycleReport),
    /// The cycle aborted; the previous snapshot stays visible.
    Failed(String),
    /// The cycle stopped at a safe point after shutdown was signaled.
    Cancelled,
    /// The cycle exceeded its timeout and was abandoned.
    TimedOut,
}

impl CycleStatus {
    /// Returns the audit label for this status.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Published(_) => "published",
            Self::Failed(_) => "failed",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Worker task running one synchronous refresh cycle.
type CycleTask = JoinHandle<Result<CycleOutcome, RefreshError>>;

/// Background refresh loop over a shared record source.
pub struct RefreshPoller {
    /// Record source read each cycle.
    source: SharedRecordSource,
    /// Sole writer of the published snapshot.
    publisher: SnapshotPublisher,
    /// Audit sink for cycle events.
    audit: Arc<dyn AuditSink>,
    /// Loop timing.
    settings: PollerSettings,
    /// Shutdown signal observed at safe points.
    shutdown: watch::Receiver<bool>,
    /// Timed-out worker that must finish before the next cycle.
    straggler: Option<CycleTask>,
}

impl RefreshPoller {
    /// Creates a poller that publishes through `publisher`.
    #[must_use]
    pub fn new(
        source: SharedRecordSource,
        publisher: SnapshotPublisher,
        audit: Arc<dyn AuditSink>,
        settings: PollerSettings,
    ) -> Self {
        let (_signal, shutdown) = watch::channel(false);
        Self {
            source,
            publisher,
            audit,
            settings,
            shutdown,
            straggler: None,
        }
    }

    /// Returns a reader over the snapshots this poller publishes.
    #[must_use]
    pub fn reader(&self) -> SnapshotReader {
        self.publisher.reader()
    }

    /// Runs the startup cycle, which must publish.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Refresh`] when the cycle does not publish.
    pub async fn initial_refresh(&mut self) -> Result<CycleReport, ServerError> {
        match self.run_cycle().await {
            CycleStatus::Published(report) => Ok(report),
            CycleStatus::Failed(message) => Err(ServerError::Refresh(message)),
            other => Err(ServerError::Refresh(format!("initial refresh {}", other.label()))),
        }
    }

    /// Runs one refresh cycle and publishes its snapshot on success.
    pub async fn run_cycle(&mut self) -> CycleStatus {
        self.settle_straggler().await;
        let started = Instant::now();
        let abandon = Arc::new(AtomicBool::new(false));
        let mut task = self.spawn_worker(Arc::clone(&abandon));

        let joined = match self.settings.cycle_timeout {
            Some(limit) => {
                if let Ok(joined) = tokio::time::timeout(limit, &mut task).await {
                    joined
                } else {
                    abandon.store(true, Ordering::SeqCst);
                    self.straggler = Some(task);
                    let status = CycleStatus::TimedOut;
                    let message = format!("cycle exceeded {} ms", limit.as_millis());
                    self.audit_cycle(&status, started, Some(message));
                    return status;
                }
            }
            None => task.await,
        };

        let status = self.finish_cycle(joined);
        let error = match &status {
            CycleStatus::Failed(message) => Some(message.clone()),
            _ => None,
        };
        self.audit_cycle(&status, started, error);
        status
    }

    /// Spawns the loop on the current runtime.
    #[must_use]
    pub fn spawn(mut self) -> PollerHandle {
        let (signal, shutdown) = watch::channel(false);
        self.shutdown = shutdown;
        let task = tokio::spawn(self.run());
        PollerHandle {
            signal,
            task,
        }
    }

    /// Loop body: cycle, then sleep until the next tick or shutdown.
    async fn run(mut self) {
        let mut shutdown = self.shutdown.clone();
        loop {
            if *shutdown.borrow() {
                break;
            }
            self.run_cycle().await;
            tokio::select! {
                () = tokio::time::sleep(self.settings.interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        self.settle_straggler().await;
    }

    /// Starts the synchronous cycle on a blocking worker.
    fn spawn_worker(&self, abandon: Arc<AtomicBool>) -> CycleTask {
        let source = self.source.clone();
        let previous = self.publisher.current();
        let shutdown = self.shutdown.clone();
        tokio::task::spawn_blocking(move || {
            build_snapshot(&source, &previous, || {
                abandon.load(Ordering::SeqCst) || *shutdown.borrow()
            })
        })
    }

    /// Publishes a completed cycle unless shutdown arrived in the meantime.
    fn finish_cycle(
        &self,
        joined: Result<Result<CycleOutcome, RefreshError>, JoinError>,
    ) -> CycleStatus {
        match joined {
            Ok(Ok(CycleOutcome::Completed {
                snapshot,
                report,
            })) => {
                if *self.shutdown.borrow() {
                    return CycleStatus::Cancelled;
                }
                self.publisher.publish(snapshot);
                CycleStatus::Published(report)
            }
            Ok(Ok(CycleOutcome::Cancelled)) => CycleStatus::Cancelled,
            Ok(Err(err)) => CycleStatus::Failed(err.to_string()),
            Err(err) => CycleStatus::Failed(format!("refresh worker failed: {err}")),
        }
    }

    /// Waits for a timed-out worker to reach a safe point.
    async fn settle_straggler(&mut self) {
        if let Some(task) = self.straggler.take() {
            let _ = task.await;
        }
    }

    /// Emits the audit event for a finished cycle.
    fn audit_cycle(&self, status: &CycleStatus, started: Instant, error: Option<String>) {
        let mut event = RefreshAuditEvent::new(status.label(), started.elapsed().as_millis());
        if let CycleStatus::Published(report) = status {
            event.branches = report.branches;
            event.empty_branches =
                report.empty.iter().map(|branch| branch.as_str().to_string()).collect();
            event.malformed_branches =
                report.malformed.iter().map(|branch| branch.as_str().to_string()).collect();
        }
        event.error = error;
        self.audit.record_refresh(&event);
    }
}

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Handle to a spawned refresh loop.
pub struct PollerHandle {
    /// Shutdown signal sender.
    signal: watch::Sender<bool>,
    /// Loop task.
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Signals shutdown and waits for the in-flight cycle to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Shutdown`] when the loop task panicked.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        let _ = self.signal.send(true);
        self.task.await.map_err(|err| ServerError::Shutdown(err.to_string()))
    }
}
