// crates/build-verdict-config/src/lib.rs
// ============================================================================
// Module: Build Verdict Config Library
// Description: Canonical config model and validation.
// Purpose: Single source of truth for build-verdict.toml semantics.
// Dependencies: build-verdict-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `build-verdict-config` defines the configuration model for the Build
//! Verdict service and validates it fail-closed before anything starts.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
