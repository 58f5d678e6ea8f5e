// crates/build-verdict-core/src/core/verdict.rs
// ============================================================================
// Module: Branch Verdict
// Description: Derived overall and per-user verdict for one branch.
// Purpose: Provide the value type published to query callers.
// Dependencies: serde, crate::core::{identifiers, status}
// ============================================================================

//! ## Overview
//! A [`BranchVerdict`] is rebuilt from scratch on every refresh. Per-user
//! keys are case-folded submitter names.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::fold_user;
use crate::core::status::BuildStatus;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Verdict derived for one branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchVerdict {
    /// Most recent known status on the branch.
    pub overall: BuildStatus,
    /// Verdict per case-folded submitter.
    pub per_user: BTreeMap<String, BuildStatus>,
}

impl BranchVerdict {
    /// Returns the verdict for `user`, matched case-insensitively.
    ///
    /// Users without a verdict on this branch are [`BuildStatus::Unknown`].
    #[must_use]
    pub fn user_state(&self, user: &str) -> BuildStatus {
        self.per_user.get(&fold_user(user)).copied().unwrap_or_default()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
