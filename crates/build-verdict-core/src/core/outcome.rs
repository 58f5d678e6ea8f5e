// crates/build-verdict-core/src/core/outcome.rs
// ============================================================================
// Module: Build Outcome
// Description: One build-status observation tied to a changelist.
// Purpose: Carry record source rows into the verdict engine.
// Dependencies: serde, crate::core::{identifiers, status}
// ============================================================================

//! ## Overview
//! A [`BuildOutcome`] is created by the CI system and is read-only to the
//! engine. Record sources deliver outcomes newest changelist first.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ChangelistNumber;
use crate::core::identifiers::Submitter;
use crate::core::status::BuildStatus;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Build outcome observed for a single changelist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutcome {
    /// Changelist the build ran against.
    pub changelist: ChangelistNumber,
    /// Tri-state build status.
    pub status: BuildStatus,
    /// User who submitted the changelist.
    pub submitter: Submitter,
    /// Record creation time in unix milliseconds.
    pub timestamp_ms: i64,
}

impl BuildOutcome {
    /// Creates a new build outcome.
    #[must_use]
    pub fn new(
        changelist: i64,
        status: BuildStatus,
        submitter: impl Into<Submitter>,
        timestamp_ms: i64,
    ) -> Self {
        Self {
            changelist: ChangelistNumber::new(changelist),
            status,
            submitter: submitter.into(),
            timestamp_ms,
        }
    }
}
