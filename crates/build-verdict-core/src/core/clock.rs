// crates/build-verdict-core/src/core/clock.rs
// ============================================================================
// Module: Build Verdict Clock
// Description: Wall-clock helper shared by record sources and audit output.
// Purpose: Keep every "now" in the workspace on one clock.
// Dependencies: time
// ============================================================================

//! ## Overview
//! Record timestamps, retention cutoffs, and audit events are unix epoch
//! milliseconds read from [`OffsetDateTime::now_utc`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::OffsetDateTime;

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Nanoseconds per millisecond.
const NANOS_PER_MILLI: i128 = 1_000_000;

/// Converts a point in time to unix epoch milliseconds, saturating at the
/// `i64` range.
#[must_use]
pub fn unix_millis(at: OffsetDateTime) -> i64 {
    let millis = at.unix_timestamp_nanos() / NANOS_PER_MILLI;
    i64::try_from(millis).unwrap_or(if millis < 0 { i64::MIN } else { i64::MAX })
}

/// Returns the current unix epoch in milliseconds.
#[must_use]
pub fn unix_millis_now() -> i64 {
    unix_millis(OffsetDateTime::now_utc())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
