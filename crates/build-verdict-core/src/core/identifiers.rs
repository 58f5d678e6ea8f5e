// crates/build-verdict-core/src/core/identifiers.rs
// ============================================================================
// Module: Build Verdict Identifiers
// Description: Branch, changelist, and submitter identifiers.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Identifiers are opaque wrappers with stable string or integer forms.
//! Branch names compare exactly; submitters compare case-insensitively via
//! [`Submitter::key`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Name of a CI-tracked branch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BranchName(String);

impl BranchName {
    /// Creates a new branch name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the branch name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BranchName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for BranchName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BranchName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Source-control changelist number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangelistNumber(i64);

impl ChangelistNumber {
    /// Creates a new changelist number.
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the raw changelist number.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for ChangelistNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// User who submitted a changelist.
///
/// # Invariants
/// - The original spelling is preserved for display.
/// - Equality for verdict purposes goes through [`Submitter::key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Submitter(String);

impl Submitter {
    /// Creates a new submitter identifier.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the submitter as originally spelled.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the case-folded key used in per-user verdict maps.
    #[must_use]
    pub fn key(&self) -> String {
        fold_user(&self.0)
    }
}

impl fmt::Display for Submitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Submitter {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Submitter {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Case-folds a user name for per-user verdict lookups.
#[must_use]
pub fn fold_user(name: &str) -> String {
    name.to_lowercase()
}
