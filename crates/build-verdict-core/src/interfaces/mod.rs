// crates/build-verdict-core/src/interfaces/mod.rs
// ============================================================================
// Module: Build Verdict Interfaces
// Description: Backend-agnostic interface for build outcome records.
// Purpose: Define the contract surface the refresh cycle reads through.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how Build Verdict integrates with the durable store of
//! build records without embedding backend-specific details. Implementations
//! return outcomes newest changelist first, already filtered to their
//! retention window.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use thiserror::Error;

use crate::core::BranchName;
use crate::core::BuildOutcome;

// ============================================================================
// SECTION: Record Source
// ============================================================================

/// Record source errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordSourceError {
    /// Backing store could not be reached.
    #[error("record source unavailable: {0}")]
    Unavailable(String),
    /// Query against the backing store failed.
    #[error("record source query failed: {0}")]
    Query(String),
    /// Records for a single branch could not be decoded.
    #[error("record source malformed data: {0}")]
    Malformed(String),
}

impl RecordSourceError {
    /// Returns true when the failure only affects the branch being read.
    #[must_use]
    pub const fn is_branch_scoped(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// Source of branch lists and build outcome records.
pub trait RecordSource {
    /// Lists the branches flagged for CI monitoring, in source order.
    ///
    /// # Errors
    ///
    /// Returns [`RecordSourceError`] when the branch list cannot be read.
    fn list_monitored_branches(&self) -> Result<Vec<BranchName>, RecordSourceError>;

    /// Returns in-window outcomes for `branch`, newest changelist first.
    ///
    /// Unknown branches yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`RecordSourceError`] when the outcomes cannot be read.
    fn outcomes(&self, branch: &BranchName) -> Result<Vec<BuildOutcome>, RecordSourceError>;
}

// ============================================================================
// SECTION: Shared Record Source
// ============================================================================

/// Shared record source backed by an `Arc` trait object.
#[derive(Clone)]
pub struct SharedRecordSource {
    /// Inner record source implementation.
    inner: Arc<dyn RecordSource + Send + Sync>,
}

impl SharedRecordSource {
    /// Wraps a record source in a shared, clonable wrapper.
    #[must_use]
    pub fn from_source(source: impl RecordSource + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(source),
        }
    }

    /// Wraps an existing shared record source.
    #[must_use]
    pub const fn new(source: Arc<dyn RecordSource + Send + Sync>) -> Self {
        Self {
            inner: source,
        }
    }
}

impl RecordSource for SharedRecordSource {
    fn list_monitored_branches(&self) -> Result<Vec<BranchName>, RecordSourceError> {
        self.inner.list_monitored_branches()
    }

    fn outcomes(&self, branch: &BranchName) -> Result<Vec<BuildOutcome>, RecordSourceError> {
        self.inner.outcomes(branch)
    }
}
