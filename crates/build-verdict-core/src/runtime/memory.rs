// crates/build-verdict-core/src/runtime/memory.rs
// ============================================================================
// Module: In-Memory Record Source
// Description: Simple in-memory record source for tests and local demos.
// Purpose: Provide a deterministic record source without external deps.
// Dependencies: crate::{core, interfaces}, time
// ============================================================================

//! ## Overview
//! This module provides an in-memory implementation of [`RecordSource`].
//! It applies the same ordering as the `SQLite` source (changelist
//! descending, later insertions first on ties) and an optional retention
//! window. It is not intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::core::BranchName;
use crate::core::BuildOutcome;
use crate::core::unix_millis_now;
use crate::interfaces::RecordSource;
use crate::interfaces::RecordSourceError;

// ============================================================================
// SECTION: In-Memory Source
// ============================================================================

/// Mutable state behind the in-memory source.
#[derive(Debug, Default)]
struct MemoryState {
    /// Registered branches with their monitored flag, in insertion order.
    branches: Vec<(BranchName, bool)>,
    /// Outcomes per branch in insertion order.
    records: BTreeMap<String, Vec<BuildOutcome>>,
}

/// In-memory record source for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemoryRecordSource {
    /// Branch and record state protected by a mutex.
    state: Arc<Mutex<MemoryState>>,
    /// Optional retention window in milliseconds.
    retention_ms: Option<i64>,
}

impl InMemoryRecordSource {
    /// Creates an empty in-memory record source with no retention window.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of this source that drops records older than `retention_ms`.
    #[must_use]
    pub fn with_retention_ms(mut self, retention_ms: i64) -> Self {
        self.retention_ms = Some(retention_ms);
        self
    }

    /// Registers a branch, or updates its monitored flag.
    ///
    /// # Errors
    ///
    /// Returns [`RecordSourceError::Unavailable`] when the state lock is poisoned.
    pub fn add_branch(
        &self,
        branch: impl Into<BranchName>,
        monitored: bool,
    ) -> Result<(), RecordSourceError> {
        let branch = branch.into();
        let mut guard = self.lock()?;
        if let Some(entry) = guard.branches.iter_mut().find(|(name, _)| *name == branch) {
            entry.1 = monitored;
        } else {
            guard.branches.push((branch, monitored));
        }
        Ok(())
    }

    /// Appends an outcome to a branch's history.
    ///
    /// # Errors
    ///
    /// Returns [`RecordSourceError::Unavailable`] when the state lock is poisoned.
    pub fn record(
        &self,
        branch: impl Into<BranchName>,
        outcome: BuildOutcome,
    ) -> Result<(), RecordSourceError> {
        let branch = branch.into();
        let mut guard = self.lock()?;
        guard.records.entry(branch.as_str().to_string()).or_default().push(outcome);
        Ok(())
    }

    /// Locks the shared state.
    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, RecordSourceError> {
        self.state.lock().map_err(|_| {
            RecordSourceError::Unavailable("in-memory source mutex poisoned".to_string())
        })
    }
}

impl RecordSource for InMemoryRecordSource {
    fn list_monitored_branches(&self) -> Result<Vec<BranchName>, RecordSourceError> {
        let guard = self.lock()?;
        Ok(guard
            .branches
            .iter()
            .filter(|(_, monitored)| *monitored)
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn outcomes(&self, branch: &BranchName) -> Result<Vec<BuildOutcome>, RecordSourceError> {
        let horizon = self.retention_ms.map(|window| unix_millis_now().saturating_sub(window));
        let guard = self.lock()?;
        let Some(records) = guard.records.get(branch.as_str()) else {
            return Ok(Vec::new());
        };
        let mut outcomes: Vec<BuildOutcome> = records
            .iter()
            .rev()
            .filter(|outcome| horizon.is_none_or(|horizon| outcome.timestamp_ms >= horizon))
            .cloned()
            .collect();
        outcomes.sort_by(|left, right| right.changelist.cmp(&left.changelist));
        Ok(outcomes)
    }
}
