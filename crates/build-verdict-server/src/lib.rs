// crates/build-verdict-server/src/lib.rs
// ============================================================================
// Module: Build Verdict Server Library
// Description: Refresh loop, audit sinks, and HTTP transport.
// Purpose: Run the verdict service on a tokio runtime.
// Dependencies: build-verdict-core, build-verdict-config, axum, tokio
// ============================================================================

//! ## Overview
//! `build-verdict-server` hosts the long-running pieces of the service: the
//! background refresh loop that republishes verdicts, the JSON-line audit
//! sinks, and the HTTP transport that answers verdict queries.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod poller;
pub mod server;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::LifecycleAuditEvent;
pub use audit::NoopAuditSink;
pub use audit::QueryAuditEvent;
pub use audit::RefreshAuditEvent;
pub use audit::StderrAuditSink;
pub use audit::audit_sink_from_config;
pub use poller::CycleStatus;
pub use poller::PollerHandle;
pub use poller::PollerSettings;
pub use poller::RefreshPoller;
pub use server::ServerError;
pub use server::ServerState;
pub use server::TEXT_PLAIN_UTF8;
pub use server::VerdictServer;
pub use server::router;
