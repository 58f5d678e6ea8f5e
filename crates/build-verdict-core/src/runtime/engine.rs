// crates/build-verdict-core/src/runtime/engine.rs
// ============================================================================
// Module: Verdict Engine
// Description: Folds a branch's build outcomes into a branch verdict.
// Purpose: Provide the pure state-derivation step of every refresh cycle.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The engine walks outcomes newest changelist first. The first known status
//! becomes the branch verdict. A good build resets the propagated status to
//! good for itself and every older record, so users who submitted before a
//! passing build are cleared even when a newer build is failing. Each user
//! keeps the status in effect at their newest changelist.
//!
//! ## Invariants
//! - Pure and idempotent: identical input yields identical output.
//! - A user's verdict is fixed at their first (newest) appearance.
//! - Ties between equal changelists are resolved by input position.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::core::BranchVerdict;
use crate::core::BuildOutcome;
use crate::core::BuildStatus;

// ============================================================================
// SECTION: Engine
// ============================================================================

/// Derives the branch verdict from outcomes ordered newest changelist first.
#[must_use]
pub fn derive_verdict(outcomes: &[BuildOutcome]) -> BranchVerdict {
    let mut overall = BuildStatus::Unknown;
    let mut current = BuildStatus::Unknown;
    let mut per_user = BTreeMap::new();

    for outcome in outcomes {
        if outcome.status.is_known() && overall == BuildStatus::Unknown {
            overall = outcome.status;
            current = outcome.status;
        }
        if outcome.status == BuildStatus::Good {
            current = BuildStatus::Good;
        }
        per_user.entry(outcome.submitter.key()).or_insert(current);
    }

    BranchVerdict {
        overall,
        per_user,
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::derive_verdict;
    use crate::core::BuildOutcome;
    use crate::core::BuildStatus;

    fn outcome(changelist: i64, status: BuildStatus, user: &str) -> BuildOutcome {
        BuildOutcome::new(changelist, status, user, 0)
    }

    #[test]
    fn mixed_case_submitters_share_one_entry() {
        let verdict = derive_verdict(&[
            outcome(12, BuildStatus::Bad, "Amy"),
            outcome(11, BuildStatus::Good, "amy"),
        ]);
        assert_eq!(verdict.per_user.len(), 1);
        assert_eq!(verdict.user_state("AMY"), BuildStatus::Bad);
    }

    #[test]
    fn unknown_records_before_first_known_stay_unknown() {
        let verdict = derive_verdict(&[
            outcome(20, BuildStatus::Unknown, "pat"),
            outcome(19, BuildStatus::Bad, "quinn"),
            outcome(18, BuildStatus::Unknown, "rae"),
        ]);
        assert_eq!(verdict.overall, BuildStatus::Bad);
        assert_eq!(verdict.user_state("pat"), BuildStatus::Unknown);
        assert_eq!(verdict.user_state("quinn"), BuildStatus::Bad);
        assert_eq!(verdict.user_state("rae"), BuildStatus::Bad);
    }

    #[test]
    fn older_bad_does_not_override_propagated_good() {
        let verdict = derive_verdict(&[
            outcome(30, BuildStatus::Good, "sam"),
            outcome(29, BuildStatus::Bad, "tess"),
        ]);
        assert_eq!(verdict.overall, BuildStatus::Good);
        assert_eq!(verdict.user_state("tess"), BuildStatus::Good);
    }
}
