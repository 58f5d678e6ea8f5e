// crates/build-verdict-core/src/core/status.rs
// ============================================================================
// Module: Build Status
// Description: Tri-state build status with the CI sentinel encoding.
// Purpose: Decode upstream status codes without collapsing them to booleans.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Upstream CI systems report build status as an integer: zero means the
//! outcome is not yet known, a single reserved sentinel (`-1`) means every
//! job passed, and any other value means at least one job failed. The same
//! three values are used for derived verdicts.
//!
//! ## Invariants
//! - Only [`GOOD_STATUS_CODE`] decodes to [`BuildStatus::Good`].
//! - Every non-zero, non-sentinel code decodes to [`BuildStatus::Bad`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Status code reserved for a fully passing build.
pub const GOOD_STATUS_CODE: i64 = -1;
/// Status code for a build whose outcome is not yet known.
pub const UNKNOWN_STATUS_CODE: i64 = 0;
/// Canonical code written for failing builds.
const BAD_STATUS_CODE: i64 = 1;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Tri-state build status used for outcomes and verdicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    /// Outcome not yet known.
    #[default]
    Unknown,
    /// Build passed.
    Good,
    /// Build failed.
    Bad,
}

impl BuildStatus {
    /// Decodes an upstream status code.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            UNKNOWN_STATUS_CODE => Self::Unknown,
            GOOD_STATUS_CODE => Self::Good,
            _ => Self::Bad,
        }
    }

    /// Decodes a nullable upstream status code; `None` is unknown.
    #[must_use]
    pub const fn from_optional_code(code: Option<i64>) -> Self {
        match code {
            Some(code) => Self::from_code(code),
            None => Self::Unknown,
        }
    }

    /// Returns the canonical upstream code for this status.
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Unknown => UNKNOWN_STATUS_CODE,
            Self::Good => GOOD_STATUS_CODE,
            Self::Bad => BAD_STATUS_CODE,
        }
    }

    /// Returns true when the status is good or bad.
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Returns the literal token used by the query surface.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Good => "Good",
            Self::Bad => "Bad",
        }
    }
}

impl fmt::Display for BuildStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
