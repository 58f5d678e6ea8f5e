// crates/build-verdict-store-sqlite/src/source.rs
// ============================================================================
// Module: SQLite Record Source
// Description: Durable RecordSource backed by SQLite WAL.
// Purpose: Serve monitored branches and in-window build outcomes.
// Dependencies: build-verdict-core, rusqlite, serde, thiserror
// ============================================================================

//! ## Overview
//! This module implements [`RecordSource`] using `SQLite`. Two tables hold
//! the data: `branch_config` (one row per branch with a CI-monitored flag)
//! and `changelists` (one row per build outcome). A `NULL` build status is
//! a build still in progress and decodes to unknown.
//!
//! Rows are untrusted. A row with a missing submitter or a mistyped column
//! is skipped; a branch whose rows are all undecodable is reported as
//! malformed so the refresh cycle keeps its previous verdict.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use build_verdict_core::BranchName;
use build_verdict_core::BuildOutcome;
use build_verdict_core::BuildStatus;
use build_verdict_core::RecordSource;
use build_verdict_core::RecordSourceError;
use build_verdict_core::unix_millis_now;
use rusqlite::Connection;
use rusqlite::ErrorCode;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use rusqlite::types::Value;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the record source.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Default retention window (hours).
const DEFAULT_RETENTION_HOURS: u32 = 72;
/// Milliseconds per hour.
const MILLIS_PER_HOUR: i64 = 3_600_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode (safest).
    #[default]
    Full,
    /// Normal synchronous mode (balanced).
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` record source.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteSourceConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Records older than this many hours are excluded from reads.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,
}

impl SqliteSourceConfig {
    /// Creates a configuration with defaults for everything but the path.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            retention_hours: DEFAULT_RETENTION_HOURS,
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default retention window in hours.
const fn default_retention_hours() -> u32 {
    DEFAULT_RETENTION_HOURS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` record source errors.
#[derive(Debug, Error)]
pub enum SqliteSourceError {
    /// Filesystem I/O error.
    #[error("sqlite source io error: {0}")]
    Io(String),
    /// Database is busy, locked, or cannot be opened.
    #[error("sqlite source unavailable: {0}")]
    Unavailable(String),
    /// `SQLite` engine error.
    #[error("sqlite source db error: {0}")]
    Db(String),
    /// Schema version mismatch.
    #[error("sqlite source version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid configuration or arguments.
    #[error("sqlite source invalid data: {0}")]
    Invalid(String),
    /// Branch has no `branch_config` row.
    #[error("sqlite source unknown branch: {0}")]
    UnknownBranch(String),
    /// Every row stored for a branch failed to decode.
    #[error("sqlite source malformed rows for branch {branch}: {skipped} skipped")]
    Malformed {
        /// Branch being read.
        branch: String,
        /// Number of rows skipped.
        skipped: usize,
    },
}

impl From<SqliteSourceError> for RecordSourceError {
    fn from(error: SqliteSourceError) -> Self {
        match error {
            SqliteSourceError::Io(message) | SqliteSourceError::Unavailable(message) => {
                Self::Unavailable(message)
            }
            err @ SqliteSourceError::Malformed {
                ..
            } => Self::Malformed(err.to_string()),
            other => Self::Query(other.to_string()),
        }
    }
}

/// Classifies a `rusqlite` error as unavailable or a plain db error.
fn db_error(err: &rusqlite::Error) -> SqliteSourceError {
    match err.sqlite_error_code() {
        Some(
            ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::CannotOpen
            | ErrorCode::SystemIoFailure,
        ) => SqliteSourceError::Unavailable(err.to_string()),
        _ => SqliteSourceError::Db(err.to_string()),
    }
}

// ============================================================================
// SECTION: Source
// ============================================================================

/// `SQLite`-backed record source with WAL support.
#[derive(Clone)]
pub struct SqliteRecordSource {
    /// Source configuration.
    config: SqliteSourceConfig,
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteRecordSource {
    /// Opens an `SQLite`-backed record source, creating the schema if needed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSourceError`] when the database cannot be opened or
    /// initialized.
    pub fn new(config: SqliteSourceConfig) -> Result<Self, SqliteSourceError> {
        if config.retention_hours == 0 {
            return Err(SqliteSourceError::Invalid(
                "retention_hours must be greater than zero".to_string(),
            ));
        }
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(&config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            config,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Registers a branch or updates its CI-monitored flag.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSourceError`] when the write fails.
    pub fn upsert_branch(
        &self,
        branch: &BranchName,
        monitored: bool,
    ) -> Result<(), SqliteSourceError> {
        let guard = self.lock()?;
        guard
            .execute(
                "INSERT INTO branch_config (branch, ci_monitored) VALUES (?1, ?2) ON \
                 CONFLICT(branch) DO UPDATE SET ci_monitored = excluded.ci_monitored",
                params![branch.as_str(), i64::from(monitored)],
            )
            .map_err(|err| db_error(&err))?;
        drop(guard);
        Ok(())
    }

    /// Appends a build outcome to a registered branch.
    ///
    /// Unknown outcomes are stored with a `NULL` status.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteSourceError::UnknownBranch`] when the branch is not
    /// registered, or another [`SqliteSourceError`] when the write fails.
    pub fn insert_outcome(
        &self,
        branch: &BranchName,
        outcome: &BuildOutcome,
    ) -> Result<(), SqliteSourceError> {
        if outcome.submitter.as_str().trim().is_empty() {
            return Err(SqliteSourceError::Invalid("submitter must not be blank".to_string()));
        }
        let status = outcome.status.is_known().then(|| outcome.status.code());
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| db_error(&err))?;
        let branch_id: Option<i64> = tx
            .query_row(
                "SELECT id FROM branch_config WHERE branch = ?1",
                params![branch.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|err| db_error(&err))?;
        let Some(branch_id) = branch_id else {
            return Err(SqliteSourceError::UnknownBranch(branch.as_str().to_string()));
        };
        tx.execute(
            "INSERT INTO changelists (branch_config_id, changelist, submitter, timestamp_ms, \
             build_status) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                branch_id,
                outcome.changelist.get(),
                outcome.submitter.as_str(),
                outcome.timestamp_ms,
                status
            ],
        )
        .map_err(|err| db_error(&err))?;
        tx.commit().map_err(|err| db_error(&err))?;
        drop(guard);
        Ok(())
    }

    /// Lists CI-monitored branches in registration order.
    fn load_monitored(&self) -> Result<Vec<BranchName>, SqliteSourceError> {
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare("SELECT branch FROM branch_config WHERE ci_monitored != 0 ORDER BY id")
            .map_err(|err| db_error(&err))?;
        let names = stmt
            .query_map(params![], |row| row.get::<_, String>(0))
            .map_err(|err| db_error(&err))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| db_error(&err))?;
        drop(stmt);
        drop(guard);
        Ok(names.into_iter().map(BranchName::new).collect())
    }

    /// Loads in-window outcomes for a branch, newest changelist first.
    fn load_outcomes(&self, branch: &BranchName) -> Result<Vec<BuildOutcome>, SqliteSourceError> {
        let horizon = unix_millis_now()
            .saturating_sub(i64::from(self.config.retention_hours).saturating_mul(MILLIS_PER_HOUR));
        let guard = self.lock()?;
        let mut stmt = guard
            .prepare(
                "SELECT c.changelist, c.build_status, c.submitter, c.timestamp_ms FROM changelists \
                 c JOIN branch_config b ON b.id = c.branch_config_id WHERE b.branch = ?1 AND \
                 c.timestamp_ms >= ?2 ORDER BY c.changelist DESC, c.id DESC",
            )
            .map_err(|err| db_error(&err))?;
        let rows = stmt
            .query_map(params![branch.as_str(), horizon], |row| {
                Ok([row.get::<_, Value>(0)?, row.get(1)?, row.get(2)?, row.get(3)?])
            })
            .map_err(|err| db_error(&err))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| db_error(&err))?;
        drop(stmt);
        drop(guard);

        let total = rows.len();
        let outcomes: Vec<BuildOutcome> = rows.into_iter().filter_map(decode_row).collect();
        if total > 0 && outcomes.is_empty() {
            return Err(SqliteSourceError::Malformed {
                branch: branch.as_str().to_string(),
                skipped: total,
            });
        }
        Ok(outcomes)
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteSourceError> {
        self.connection
            .lock()
            .map_err(|_| SqliteSourceError::Unavailable("mutex poisoned".to_string()))
    }
}

impl RecordSource for SqliteRecordSource {
    fn list_monitored_branches(&self) -> Result<Vec<BranchName>, RecordSourceError> {
        self.load_monitored().map_err(RecordSourceError::from)
    }

    fn outcomes(&self, branch: &BranchName) -> Result<Vec<BuildOutcome>, RecordSourceError> {
        self.load_outcomes(branch).map_err(RecordSourceError::from)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Decodes one `changelists` row, skipping rows that are malformed.
fn decode_row(row: [Value; 4]) -> Option<BuildOutcome> {
    let [changelist, status, submitter, timestamp] = row;
    let Value::Integer(changelist) = changelist else {
        return None;
    };
    let status = match status {
        Value::Null => BuildStatus::Unknown,
        Value::Integer(code) => BuildStatus::from_code(code),
        _ => return None,
    };
    let Value::Text(submitter) = submitter else {
        return None;
    };
    if submitter.trim().is_empty() {
        return None;
    }
    let Value::Integer(timestamp_ms) = timestamp else {
        return None;
    };
    Some(BuildOutcome::new(changelist, status, submitter, timestamp_ms))
}

/// Ensures the parent directory for the database exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteSourceError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteSourceError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteSourceError::Io(err.to_string()))
}

/// Validates database paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteSourceError> {
    let path_string = path.display().to_string();
    if path_string.is_empty() {
        return Err(SqliteSourceError::Invalid("store path must not be empty".to_string()));
    }
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteSourceError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteSourceError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteSourceError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with durable defaults.
fn open_connection(config: &SqliteSourceConfig) -> Result<Connection, SqliteSourceError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection =
        Connection::open_with_flags(&config.path, flags).map_err(|err| db_error(&err))?;
    apply_pragmas(&connection, config)?;
    Ok(connection)
}

/// Applies journal, sync, and busy-timeout pragmas.
fn apply_pragmas(
    connection: &Connection,
    config: &SqliteSourceConfig,
) -> Result<(), SqliteSourceError> {
    connection.execute_batch("PRAGMA foreign_keys = ON;").map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(|err| db_error(&err))?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| db_error(&err))?;
    Ok(())
}

/// Initializes the schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteSourceError> {
    let tx = connection.transaction().map_err(|err| db_error(&err))?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(|err| db_error(&err))?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(|err| db_error(&err))?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| db_error(&err))?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS branch_config (
                    id INTEGER PRIMARY KEY,
                    branch TEXT NOT NULL UNIQUE,
                    ci_monitored INTEGER NOT NULL DEFAULT 1
                );
                CREATE TABLE IF NOT EXISTS changelists (
                    id INTEGER PRIMARY KEY,
                    branch_config_id INTEGER NOT NULL,
                    changelist INTEGER NOT NULL,
                    submitter TEXT,
                    timestamp_ms INTEGER NOT NULL,
                    build_status INTEGER,
                    FOREIGN KEY (branch_config_id) REFERENCES branch_config(id)
                );
                CREATE INDEX IF NOT EXISTS idx_changelists_branch_time
                    ON changelists (branch_config_id, timestamp_ms);",
            )
            .map_err(|err| db_error(&err))?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteSourceError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(|err| db_error(&err))?;
    Ok(())
}
