// crates/build-verdict-core/src/lib.rs
// ============================================================================
// Module: Build Verdict Core Library
// Description: Public API surface for the Build Verdict core.
// Purpose: Expose verdict types, record source interfaces, and runtime helpers.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Build Verdict core folds CI build outcomes into per-branch and per-user
//! verdicts, publishes them as immutable snapshots, and answers verdict
//! queries. It is transport-agnostic: record sources and listeners integrate
//! through explicit interfaces.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::RecordSource;
pub use interfaces::RecordSourceError;
pub use interfaces::SharedRecordSource;
pub use runtime::CycleOutcome;
pub use runtime::CycleReport;
pub use runtime::InMemoryRecordSource;
pub use runtime::PublishedSnapshot;
pub use runtime::QueryRequest;
pub use runtime::QuerySurface;
pub use runtime::RefreshError;
pub use runtime::SnapshotPublisher;
pub use runtime::SnapshotReader;
pub use runtime::USAGE;
pub use runtime::build_snapshot;
pub use runtime::derive_verdict;
pub use runtime::snapshot_store;
