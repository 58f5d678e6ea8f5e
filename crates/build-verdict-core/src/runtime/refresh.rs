// crates/build-verdict-core/src/runtime/refresh.rs
// ============================================================================
// Module: Refresh Cycle
// Description: One synchronous pass from record source to new snapshot.
// Purpose: Build the next snapshot without touching the published one.
// Dependencies: crate::{core, interfaces}, thiserror, time
// ============================================================================

//! ## Overview
//! [`build_snapshot`] reads every monitored branch, derives its verdict, and
//! assembles a complete [`PublishedSnapshot`]. It never publishes: callers
//! swap the result in once it is returned. Cancellation is polled at safe
//! points (cycle start and before each branch) and an abandoned cycle
//! returns [`CycleOutcome::Cancelled`] without a snapshot.
//!
//! ## Carry-over
//! - A branch with no in-window records keeps its previous verdict.
//! - A branch whose records are malformed keeps its previous verdict.
//! - Branches no longer monitored are dropped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;
use time::OffsetDateTime;

use crate::core::BranchName;
use crate::core::BranchVerdict;
use crate::interfaces::RecordSource;
use crate::runtime::engine::derive_verdict;
use crate::runtime::snapshot::PublishedSnapshot;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Refresh cycle errors. Any of these aborts the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshError {
    /// Monitored branch list could not be read.
    #[error("refresh branch list failed: {0}")]
    BranchList(String),
    /// Outcomes for a branch could not be read.
    #[error("refresh outcomes failed for branch {branch}: {message}")]
    Outcomes {
        /// Branch being read.
        branch: String,
        /// Underlying record source message.
        message: String,
    },
}

// ============================================================================
// SECTION: Types
// ============================================================================

/// Summary of a completed refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Number of monitored branches listed.
    pub branches: usize,
    /// Branches with no in-window records.
    pub empty: Vec<BranchName>,
    /// Branches whose records could not be decoded.
    pub malformed: Vec<BranchName>,
}

/// Result of one refresh cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Cycle finished with a snapshot ready to publish.
    Completed {
        /// Snapshot to publish.
        snapshot: PublishedSnapshot,
        /// Cycle summary.
        report: CycleReport,
    },
    /// Cycle was abandoned at a safe point.
    Cancelled,
}

// ============================================================================
// SECTION: Refresh
// ============================================================================

/// Runs one refresh cycle against `source`.
///
/// `previous` supplies verdicts for branches that are carried over.
/// `cancelled` is polled at each safe point.
///
/// # Errors
///
/// Returns [`RefreshError`] when the branch list or a branch's outcomes
/// cannot be read for reasons other than malformed branch data.
pub fn build_snapshot<S, C>(
    source: &S,
    previous: &PublishedSnapshot,
    cancelled: C,
) -> Result<CycleOutcome, RefreshError>
where
    S: RecordSource + ?Sized,
    C: Fn() -> bool,
{
    if cancelled() {
        return Ok(CycleOutcome::Cancelled);
    }
    let branches = source
        .list_monitored_branches()
        .map_err(|err| RefreshError::BranchList(err.to_string()))?;

    let mut verdicts = BTreeMap::new();
    let mut report = CycleReport {
        branches: branches.len(),
        ..CycleReport::default()
    };
    for branch in &branches {
        if cancelled() {
            return Ok(CycleOutcome::Cancelled);
        }
        match source.outcomes(branch) {
            Ok(outcomes) if outcomes.is_empty() => {
                report.empty.push(branch.clone());
                carry_over(previous, branch, &mut verdicts);
            }
            Ok(outcomes) => {
                verdicts.insert(branch.as_str().to_string(), derive_verdict(&outcomes));
            }
            Err(err) if err.is_branch_scoped() => {
                report.malformed.push(branch.clone());
                carry_over(previous, branch, &mut verdicts);
            }
            Err(err) => {
                return Err(RefreshError::Outcomes {
                    branch: branch.as_str().to_string(),
                    message: err.to_string(),
                });
            }
        }
    }
    if cancelled() {
        return Ok(CycleOutcome::Cancelled);
    }

    let snapshot = PublishedSnapshot::new(branches, verdicts, OffsetDateTime::now_utc());
    Ok(CycleOutcome::Completed {
        snapshot,
        report,
    })
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Copies the previous verdict for `branch` into `verdicts`, if any.
fn carry_over(
    previous: &PublishedSnapshot,
    branch: &BranchName,
    verdicts: &mut BTreeMap<String, BranchVerdict>,
) {
    if let Some(verdict) = previous.verdict(branch.as_str()) {
        verdicts.insert(branch.as_str().to_string(), verdict.clone());
    }
}
