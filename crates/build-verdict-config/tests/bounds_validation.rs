//! Bounds validation tests for build-verdict-config.
// crates/build-verdict-config/tests/bounds_validation.rs
// =============================================================================
// Module: Config Bounds Validation Tests
// Description: Validate numeric ranges and cross-field audit rules.
// Purpose: Ensure out-of-range settings fail closed.
// =============================================================================

use std::path::PathBuf;

use build_verdict_config::AuditSinkKind;

mod common;

use common::TestResult;
use common::assert_invalid;

#[test]
fn max_inflight_bounds() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.max_inflight = 65;
    assert_invalid(config.validate(), "server.max_inflight must be between 1 and 64")?;
    config.server.max_inflight = 64;
    config.validate().map_err(|err| err.to_string())?;
    config.server.max_inflight = 1;
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn bind_must_be_socket_address() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.server.bind = "localhost".to_string();
    assert_invalid(config.validate(), "invalid server.bind address")
}

#[test]
fn refresh_interval_bounds() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.refresh.interval_ms = 999;
    assert_invalid(config.validate(), "refresh.interval_ms")?;
    config.refresh.interval_ms = 3_600_001;
    assert_invalid(config.validate(), "refresh.interval_ms")?;
    config.refresh.interval_ms = 1_000;
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn cycle_timeout_bounds() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.refresh.cycle_timeout_ms = Some(99);
    assert_invalid(config.validate(), "refresh.cycle_timeout_ms")?;
    config.refresh.cycle_timeout_ms = Some(100);
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn retention_bounds() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.record_source.retention_hours = 0;
    assert_invalid(config.validate(), "record_source.retention_hours")?;
    config.record_source.retention_hours = 8_761;
    assert_invalid(config.validate(), "record_source.retention_hours")?;
    config.record_source.retention_hours = 8_760;
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn record_source_path_must_be_set() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.record_source.path = PathBuf::from("  ");
    assert_invalid(config.validate(), "record_source.path must be non-empty")
}

#[test]
fn busy_timeout_is_capped() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.record_source.busy_timeout_ms = 60_001;
    assert_invalid(config.validate(), "record_source.busy_timeout_ms")
}

#[test]
fn file_audit_sink_requires_path() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.audit.sink = AuditSinkKind::File;
    assert_invalid(config.validate(), "audit.path is required")?;
    config.audit.path = Some("audit.jsonl".to_string());
    config.validate().map_err(|err| err.to_string())
}

#[test]
fn audit_path_rejected_for_other_sinks() -> TestResult {
    let mut config = common::minimal_config().map_err(|err| err.to_string())?;
    config.audit.sink = AuditSinkKind::None;
    config.audit.path = Some("audit.jsonl".to_string());
    assert_invalid(config.validate(), "only valid for the file sink")
}
