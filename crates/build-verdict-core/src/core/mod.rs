// crates/build-verdict-core/src/core/mod.rs
// ============================================================================
// Module: Build Verdict Core Types
// Description: Build outcome records, tri-state statuses, and branch verdicts.
// Purpose: Provide stable, serializable types shared by every crate.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Core types define the build outcome records consumed from a record source
//! and the verdicts derived from them. These types carry no behavior beyond
//! encoding rules; derivation lives in [`crate::runtime`].

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod clock;
pub mod identifiers;
pub mod outcome;
pub mod status;
pub mod verdict;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use clock::unix_millis;
pub use clock::unix_millis_now;
pub use identifiers::BranchName;
pub use identifiers::ChangelistNumber;
pub use identifiers::Submitter;
pub use outcome::BuildOutcome;
pub use status::BuildStatus;
pub use status::GOOD_STATUS_CODE;
pub use status::UNKNOWN_STATUS_CODE;
pub use verdict::BranchVerdict;
