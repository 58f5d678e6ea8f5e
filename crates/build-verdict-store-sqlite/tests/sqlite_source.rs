// crates/build-verdict-store-sqlite/tests/sqlite_source.rs
// ============================================================================
// Module: SQLite Record Source Tests
// Description: Validate SQLite RecordSource behavior.
// Purpose: Ensure retention, ordering, and row decoding match the engine's needs.
// Dependencies: build-verdict-store-sqlite, build-verdict-core, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite-backed record source. Rows written
//! directly through `rusqlite` model untrusted data from other CI tooling.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use build_verdict_core::BranchName;
use build_verdict_core::BuildOutcome;
use build_verdict_core::BuildStatus;
use build_verdict_core::RecordSource;
use build_verdict_core::RecordSourceError;
use build_verdict_core::derive_verdict;
use build_verdict_core::unix_millis_now;
use build_verdict_store_sqlite::SqliteRecordSource;
use build_verdict_store_sqlite::SqliteSourceConfig;
use build_verdict_store_sqlite::SqliteSourceError;
use rusqlite::Connection;
use rusqlite::params;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn open(dir: &TempDir) -> SqliteRecordSource {
    SqliteRecordSource::new(SqliteSourceConfig::new(dir.path().join("verdict.sqlite")))
        .expect("open sqlite source")
}

fn raw_connection(dir: &TempDir) -> Connection {
    Connection::open(dir.path().join("verdict.sqlite")).expect("raw connection")
}

fn raw_insert(
    conn: &Connection,
    branch: &str,
    changelist: i64,
    submitter: Option<&str>,
    status: Option<i64>,
) {
    conn.execute(
        "INSERT INTO changelists (branch_config_id, changelist, submitter, timestamp_ms, \
         build_status) SELECT id, ?2, ?3, ?4, ?5 FROM branch_config WHERE branch = ?1",
        params![branch, changelist, submitter, unix_millis_now(), status],
    )
    .expect("raw insert");
}

fn main_branch() -> BranchName {
    BranchName::new("Main")
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn monitored_branches_follow_flag_and_registration_order() {
    let dir = TempDir::new().unwrap();
    let source = open(&dir);
    source.upsert_branch(&BranchName::new("Zeta"), true).unwrap();
    source.upsert_branch(&BranchName::new("Alpha"), false).unwrap();
    source.upsert_branch(&BranchName::new("Beta"), true).unwrap();
    assert_eq!(
        source.list_monitored_branches().unwrap(),
        vec![BranchName::new("Zeta"), BranchName::new("Beta")]
    );

    source.upsert_branch(&BranchName::new("Alpha"), true).unwrap();
    source.upsert_branch(&BranchName::new("Zeta"), false).unwrap();
    assert_eq!(
        source.list_monitored_branches().unwrap(),
        vec![BranchName::new("Alpha"), BranchName::new("Beta")]
    );
}

#[test]
fn outcomes_are_newest_changelist_first_with_later_rows_winning_ties() {
    let dir = TempDir::new().unwrap();
    let source = open(&dir);
    source.upsert_branch(&main_branch(), true).unwrap();
    let now = unix_millis_now();
    for (changelist, user) in [(90, "dan"), (105, "amy"), (100, "bob"), (105, "ann")] {
        let outcome = BuildOutcome::new(changelist, BuildStatus::Bad, user, now);
        source.insert_outcome(&main_branch(), &outcome).unwrap();
    }
    let users: Vec<String> = source
        .outcomes(&main_branch())
        .unwrap()
        .into_iter()
        .map(|outcome| outcome.submitter.as_str().to_string())
        .collect();
    assert_eq!(users, vec!["ann", "amy", "bob", "dan"]);
}

#[test]
fn retention_window_excludes_old_rows() {
    let dir = TempDir::new().unwrap();
    let mut config = SqliteSourceConfig::new(dir.path().join("verdict.sqlite"));
    config.retention_hours = 1;
    let source = SqliteRecordSource::new(config).unwrap();
    source.upsert_branch(&main_branch(), true).unwrap();
    let now = unix_millis_now();
    source
        .insert_outcome(&main_branch(), &BuildOutcome::new(2, BuildStatus::Good, "new", now))
        .unwrap();
    source
        .insert_outcome(
            &main_branch(),
            &BuildOutcome::new(1, BuildStatus::Bad, "old", now - 2 * 3_600_000),
        )
        .unwrap();
    let outcomes = source.outcomes(&main_branch()).unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].submitter.as_str(), "new");
}

#[test]
fn status_codes_decode_to_tri_state() {
    let dir = TempDir::new().unwrap();
    let source = open(&dir);
    source.upsert_branch(&main_branch(), true).unwrap();
    let conn = raw_connection(&dir);
    raw_insert(&conn, "Main", 4, Some("amy"), Some(5));
    raw_insert(&conn, "Main", 3, Some("bob"), Some(-1));
    raw_insert(&conn, "Main", 2, Some("cid"), None);
    raw_insert(&conn, "Main", 1, Some("dan"), Some(0));
    let statuses: Vec<BuildStatus> =
        source.outcomes(&main_branch()).unwrap().into_iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![BuildStatus::Bad, BuildStatus::Good, BuildStatus::Unknown, BuildStatus::Unknown]
    );
}

#[test]
fn unknown_outcomes_are_stored_as_null() {
    let dir = TempDir::new().unwrap();
    let source = open(&dir);
    source.upsert_branch(&main_branch(), true).unwrap();
    let outcome = BuildOutcome::new(1, BuildStatus::Unknown, "amy", unix_millis_now());
    source.insert_outcome(&main_branch(), &outcome).unwrap();
    let conn = raw_connection(&dir);
    let stored: Option<i64> = conn
        .query_row("SELECT build_status FROM changelists", params![], |row| row.get(0))
        .unwrap();
    assert_eq!(stored, None);
}

#[test]
fn rows_without_submitter_are_skipped() {
    let dir = TempDir::new().unwrap();
    let source = open(&dir);
    source.upsert_branch(&main_branch(), true).unwrap();
    let conn = raw_connection(&dir);
    raw_insert(&conn, "Main", 3, None, Some(1));
    raw_insert(&conn, "Main", 2, Some("  "), Some(1));
    raw_insert(&conn, "Main", 1, Some("eve"), Some(-1));
    let outcomes = source.outcomes(&main_branch()).unwrap();
    assert_eq!(outcomes.len(), 1);
    let verdict = derive_verdict(&outcomes);
    assert_eq!(verdict.overall, BuildStatus::Good);
}

#[test]
fn branch_with_only_malformed_rows_is_reported() {
    let dir = TempDir::new().unwrap();
    let source = open(&dir);
    source.upsert_branch(&main_branch(), true).unwrap();
    let conn = raw_connection(&dir);
    raw_insert(&conn, "Main", 1, None, Some(1));
    conn.execute(
        "INSERT INTO changelists (branch_config_id, changelist, submitter, timestamp_ms, \
         build_status) SELECT id, 'not-a-number', 'amy', ?1, 1 FROM branch_config",
        params![unix_millis_now()],
    )
    .unwrap();
    let err = source.outcomes(&main_branch()).unwrap_err();
    assert!(matches!(err, RecordSourceError::Malformed(_)));
    assert!(err.is_branch_scoped());
}

#[test]
fn unknown_branch_reads_empty_and_rejects_writes() {
    let dir = TempDir::new().unwrap();
    let source = open(&dir);
    assert!(source.outcomes(&BranchName::new("Ghost")).unwrap().is_empty());
    let outcome = BuildOutcome::new(1, BuildStatus::Good, "amy", 0);
    let err = source.insert_outcome(&BranchName::new("Ghost"), &outcome).unwrap_err();
    assert!(matches!(err, SqliteSourceError::UnknownBranch(name) if name == "Ghost"));
}

#[test]
fn blank_submitter_is_rejected_on_insert() {
    let dir = TempDir::new().unwrap();
    let source = open(&dir);
    source.upsert_branch(&main_branch(), true).unwrap();
    let outcome = BuildOutcome::new(1, BuildStatus::Good, " ", unix_millis_now());
    let err = source.insert_outcome(&main_branch(), &outcome).unwrap_err();
    assert!(matches!(err, SqliteSourceError::Invalid(_)));
}

#[test]
fn data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let source = open(&dir);
        source.upsert_branch(&main_branch(), true).unwrap();
        let outcome = BuildOutcome::new(7, BuildStatus::Bad, "bob", unix_millis_now());
        source.insert_outcome(&main_branch(), &outcome).unwrap();
    }
    let source = open(&dir);
    assert_eq!(source.list_monitored_branches().unwrap(), vec![main_branch()]);
    assert_eq!(source.outcomes(&main_branch()).unwrap().len(), 1);
}

#[test]
fn schema_version_mismatch_fails_closed() {
    let dir = TempDir::new().unwrap();
    drop(open(&dir));
    let conn = raw_connection(&dir);
    conn.execute("UPDATE store_meta SET version = 99", params![]).unwrap();
    drop(conn);
    let result =
        SqliteRecordSource::new(SqliteSourceConfig::new(dir.path().join("verdict.sqlite")));
    assert!(matches!(result, Err(SqliteSourceError::VersionMismatch(_))));
}

#[test]
fn directory_path_is_rejected() {
    let dir = TempDir::new().unwrap();
    let result = SqliteRecordSource::new(SqliteSourceConfig::new(dir.path()));
    assert!(matches!(result, Err(SqliteSourceError::Invalid(_))));
    assert!(Path::new(dir.path()).is_dir());
}

#[test]
fn zero_retention_is_rejected() {
    let dir = TempDir::new().unwrap();
    let mut config = SqliteSourceConfig::new(dir.path().join("verdict.sqlite"));
    config.retention_hours = 0;
    assert!(matches!(SqliteRecordSource::new(config), Err(SqliteSourceError::Invalid(_))));
}
