// crates/build-verdict-core/src/runtime/mod.rs
// ============================================================================
// Module: Build Verdict Runtime
// Description: Verdict engine, snapshot store, refresh cycle, and queries.
// Purpose: Turn record source reads into published, queryable verdicts.
// Dependencies: crate::{core, interfaces}, time
// ============================================================================

//! ## Overview
//! Runtime modules implement verdict derivation, the copy-on-write snapshot
//! store, one synchronous refresh cycle, and the transport-agnostic query
//! surface. Scheduling the refresh cycle is left to the embedding service.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod engine;
pub mod memory;
pub mod query;
pub mod refresh;
pub mod snapshot;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use engine::derive_verdict;
pub use memory::InMemoryRecordSource;
pub use query::QueryRequest;
pub use query::QuerySurface;
pub use query::USAGE;
pub use refresh::CycleOutcome;
pub use refresh::CycleReport;
pub use refresh::RefreshError;
pub use refresh::build_snapshot;
pub use snapshot::PublishedSnapshot;
pub use snapshot::SnapshotPublisher;
pub use snapshot::SnapshotReader;
pub use snapshot::snapshot_store;
