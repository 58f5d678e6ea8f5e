// crates/build-verdict-server/src/audit.rs
// ============================================================================
// Module: Build Verdict Audit Logging
// Description: Structured audit events for refresh cycles and queries.
// Purpose: Emit JSON-line operational logs without hard dependencies.
// Dependencies: build-verdict-config, serde, serde_json
// ============================================================================

//! ## Overview
//! This module defines audit event payloads and sinks for the refresh loop,
//! query handling, and service lifecycle. Events are serialized as one JSON
//! object per line so deployments can route them to any log pipeline.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use build_verdict_config::AuditConfig;
use build_verdict_config::AuditSinkKind;
use build_verdict_core::unix_millis_now;
use serde::Serialize;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Refresh cycle audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Cycle outcome label.
    pub outcome: &'static str,
    /// Number of monitored branches listed.
    pub branches: usize,
    /// Branches that kept their previous verdict for lack of records.
    pub empty_branches: Vec<String>,
    /// Branches that kept their previous verdict due to malformed rows.
    pub malformed_branches: Vec<String>,
    /// Cycle duration in milliseconds.
    pub duration_ms: u128,
    /// Failure message when the cycle did not publish.
    pub error: Option<String>,
}

impl RefreshAuditEvent {
    /// Creates a refresh audit event with an empty report.
    #[must_use]
    pub fn new(outcome: &'static str, duration_ms: u128) -> Self {
        Self {
            event: "refresh_cycle",
            timestamp_ms: unix_millis_now(),
            outcome,
            branches: 0,
            empty_branches: Vec::new(),
            malformed_branches: Vec::new(),
            duration_ms,
            error: None,
        }
    }
}

/// Query audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct QueryAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Parsed verb label.
    pub verb: &'static str,
    /// Query outcome label (`answered` or `usage`).
    pub outcome: &'static str,
    /// Response body size in bytes.
    pub response_bytes: usize,
}

impl QueryAuditEvent {
    /// Creates a query audit event.
    #[must_use]
    pub fn new(verb: &'static str, outcome: &'static str, response_bytes: usize) -> Self {
        Self {
            event: "query",
            timestamp_ms: unix_millis_now(),
            verb,
            outcome,
            response_bytes,
        }
    }
}

/// Service lifecycle audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: i64,
    /// Lifecycle phase label.
    pub phase: &'static str,
    /// Optional phase detail (bind address, error message).
    pub detail: Option<String>,
}

impl LifecycleAuditEvent {
    /// Creates a lifecycle audit event.
    #[must_use]
    pub fn new(phase: &'static str, detail: Option<String>) -> Self {
        Self {
            event: "lifecycle",
            timestamp_ms: unix_millis_now(),
            phase,
            detail,
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for service events.
pub trait AuditSink: Send + Sync {
    /// Record a refresh cycle event.
    fn record_refresh(&self, event: &RefreshAuditEvent);

    /// Record a query event.
    fn record_query(&self, _event: &QueryAuditEvent) {}

    /// Record a lifecycle event.
    fn record_lifecycle(&self, _event: &LifecycleAuditEvent) {}
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl StderrAuditSink {
    /// Writes a serialized event to stderr.
    fn emit<T: Serialize>(event: &T) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

impl AuditSink for StderrAuditSink {
    fn record_refresh(&self, event: &RefreshAuditEvent) {
        Self::emit(event);
    }

    fn record_query(&self, event: &QueryAuditEvent) {
        Self::emit(event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        Self::emit(event);
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Appends a serialized event to the log file.
    fn emit<T: Serialize>(&self, event: &T) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

impl AuditSink for FileAuditSink {
    fn record_refresh(&self, event: &RefreshAuditEvent) {
        self.emit(event);
    }

    fn record_query(&self, event: &QueryAuditEvent) {
        self.emit(event);
    }

    fn record_lifecycle(&self, event: &LifecycleAuditEvent) {
        self.emit(event);
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record_refresh(&self, _event: &RefreshAuditEvent) {}
}

/// Builds the audit sink selected by configuration.
///
/// # Errors
///
/// Returns an error when the file sink cannot open its log file.
pub fn audit_sink_from_config(config: &AuditConfig) -> io::Result<Arc<dyn AuditSink>> {
    match (config.sink, &config.path) {
        (AuditSinkKind::File, Some(path)) => Ok(Arc::new(FileAuditSink::new(Path::new(path))?)),
        (AuditSinkKind::File, None) => {
            Err(io::Error::new(io::ErrorKind::InvalidInput, "audit file sink requires a path"))
        }
        (AuditSinkKind::Stderr, _) => Ok(Arc::new(StderrAuditSink)),
        (AuditSinkKind::None, _) => Ok(Arc::new(NoopAuditSink)),
    }
}
