// crates/build-verdict-core/src/runtime/snapshot.rs
// ============================================================================
// Module: Published Snapshot Store
// Description: Immutable verdict snapshots behind a copy-on-write swap.
// Purpose: Serve unbounded concurrent readers while refreshes run.
// Dependencies: crate::core, time
// ============================================================================

//! ## Overview
//! The store holds one `Arc<PublishedSnapshot>` behind a [`RwLock`]. The
//! lock guards only the pointer: readers clone the `Arc` and release it,
//! and the publisher swaps in a fully built snapshot. A snapshot is never
//! mutated once published.
//!
//! [`snapshot_store`] hands out exactly one [`SnapshotPublisher`] so the
//! refresh loop stays the only writer. [`SnapshotReader`] is freely cloned.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use time::OffsetDateTime;

use crate::core::BranchName;
use crate::core::BranchVerdict;
use crate::core::BuildStatus;

// ============================================================================
// SECTION: Snapshot
// ============================================================================

/// One complete, internally consistent set of branch verdicts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishedSnapshot {
    /// Monitored branches in record source order.
    branches: Vec<BranchName>,
    /// Verdicts keyed by exact branch name.
    verdicts: BTreeMap<String, BranchVerdict>,
    /// Completion time of the producing refresh cycle.
    refreshed_at: Option<OffsetDateTime>,
}

impl PublishedSnapshot {
    /// Creates an empty snapshot that has never been refreshed.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Creates a snapshot from a branch list and verdict map.
    #[must_use]
    pub const fn new(
        branches: Vec<BranchName>,
        verdicts: BTreeMap<String, BranchVerdict>,
        refreshed_at: OffsetDateTime,
    ) -> Self {
        Self {
            branches,
            verdicts,
            refreshed_at: Some(refreshed_at),
        }
    }

    /// Returns the monitored branches in record source order.
    #[must_use]
    pub fn branches(&self) -> &[BranchName] {
        &self.branches
    }

    /// Returns the verdict for an exact branch name.
    #[must_use]
    pub fn verdict(&self, branch: &str) -> Option<&BranchVerdict> {
        self.verdicts.get(branch)
    }

    /// Returns the number of branches carrying a verdict.
    #[must_use]
    pub fn verdict_count(&self) -> usize {
        self.verdicts.len()
    }

    /// Returns the overall and user verdicts for a branch.
    ///
    /// Absent branches report unknown for both.
    #[must_use]
    pub fn lookup(&self, branch: &str, user: &str) -> (BuildStatus, BuildStatus) {
        self.verdict(branch).map_or((BuildStatus::Unknown, BuildStatus::Unknown), |verdict| {
            (verdict.overall, verdict.user_state(user))
        })
    }

    /// Returns the completion time of the producing refresh cycle.
    #[must_use]
    pub const fn refreshed_at(&self) -> Option<OffsetDateTime> {
        self.refreshed_at
    }
}

// ============================================================================
// SECTION: Store Handles
// ============================================================================

/// Shared slot holding the currently visible snapshot.
type SnapshotSlot = Arc<RwLock<Arc<PublishedSnapshot>>>;

/// Creates a store seeded with an empty snapshot.
#[must_use]
pub fn snapshot_store() -> (SnapshotPublisher, SnapshotReader) {
    let slot: SnapshotSlot = Arc::new(RwLock::new(Arc::new(PublishedSnapshot::empty())));
    (
        SnapshotPublisher {
            slot: Arc::clone(&slot),
        },
        SnapshotReader {
            slot,
        },
    )
}

/// Reads the visible snapshot from a slot.
fn read_slot(slot: &SnapshotSlot) -> Arc<PublishedSnapshot> {
    let guard = slot.read().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(&guard)
}

/// Sole writer of the snapshot store.
#[derive(Debug)]
pub struct SnapshotPublisher {
    /// Shared snapshot slot.
    slot: SnapshotSlot,
}

impl SnapshotPublisher {
    /// Replaces the visible snapshot in one atomic step.
    pub fn publish(&self, snapshot: PublishedSnapshot) {
        let next = Arc::new(snapshot);
        let mut guard = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }

    /// Returns the currently visible snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<PublishedSnapshot> {
        read_slot(&self.slot)
    }

    /// Returns a reader over the same store.
    #[must_use]
    pub fn reader(&self) -> SnapshotReader {
        SnapshotReader {
            slot: Arc::clone(&self.slot),
        }
    }
}

/// Read-only handle to the snapshot store.
#[derive(Debug, Clone)]
pub struct SnapshotReader {
    /// Shared snapshot slot.
    slot: SnapshotSlot,
}

impl SnapshotReader {
    /// Returns a consistent snapshot handle for multi-branch reads.
    #[must_use]
    pub fn current(&self) -> Arc<PublishedSnapshot> {
        read_slot(&self.slot)
    }

    /// Returns the overall and user verdicts for a branch.
    #[must_use]
    pub fn lookup(&self, branch: &str, user: &str) -> (BuildStatus, BuildStatus) {
        self.current().lookup(branch, user)
    }

    /// Returns the monitored branch list of the current snapshot.
    #[must_use]
    pub fn list_branches(&self) -> Vec<BranchName> {
        self.current().branches().to_vec()
    }

    /// Returns the completion time of the current snapshot's cycle.
    #[must_use]
    pub fn last_refreshed(&self) -> Option<OffsetDateTime> {
        self.current().refreshed_at()
    }
}
