// crates/build-verdict-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Record Source
// Description: Durable RecordSource backend using SQLite WAL.
// Purpose: Read branch lists and build outcomes from the CI database.
// Dependencies: build-verdict-core, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides a SQLite-backed [`RecordSource`] over a branch
//! configuration table and a changelist outcome table. Reads apply the
//! retention window and ordering the verdict engine expects. Ingestion
//! helpers let CI tooling register branches and append outcomes.
//!
//! [`RecordSource`]: build_verdict_core::RecordSource

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod source;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use source::SqliteRecordSource;
pub use source::SqliteSourceConfig;
pub use source::SqliteSourceError;
pub use source::SqliteStoreMode;
pub use source::SqliteSyncMode;
