// crates/build-verdict-config/src/config.rs
// ============================================================================
// Module: Build Verdict Configuration
// Description: Configuration loading and validation for Build Verdict.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: build-verdict-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section is optional and falls back to defaults; values that are
//! present are range-checked and invalid configuration fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use build_verdict_store_sqlite::SqliteSourceConfig;
use build_verdict_store_sqlite::SqliteStoreMode;
use build_verdict_store_sqlite::SqliteSyncMode;
use serde::Deserialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "build-verdict.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "BUILD_VERDICT_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Default HTTP bind address.
const DEFAULT_BIND: &str = "127.0.0.1:8088";
/// Default concurrent request handler limit.
pub(crate) const DEFAULT_MAX_INFLIGHT: usize = 4;
/// Maximum concurrent request handler limit.
pub(crate) const MAX_MAX_INFLIGHT: usize = 64;
/// Default refresh interval in milliseconds.
pub(crate) const DEFAULT_REFRESH_INTERVAL_MS: u64 = 15_000;
/// Minimum refresh interval in milliseconds.
pub(crate) const MIN_REFRESH_INTERVAL_MS: u64 = 1_000;
/// Maximum refresh interval in milliseconds.
pub(crate) const MAX_REFRESH_INTERVAL_MS: u64 = 3_600_000;
/// Minimum refresh cycle timeout in milliseconds.
pub(crate) const MIN_CYCLE_TIMEOUT_MS: u64 = 100;
/// Maximum refresh cycle timeout in milliseconds.
pub(crate) const MAX_CYCLE_TIMEOUT_MS: u64 = 3_600_000;
/// Default record database path.
const DEFAULT_RECORD_SOURCE_PATH: &str = "build-verdict.sqlite";
/// Default `SQLite` busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum `SQLite` busy timeout in milliseconds.
pub(crate) const MAX_BUSY_TIMEOUT_MS: u64 = 60_000;
/// Default retention window in hours.
pub(crate) const DEFAULT_RETENTION_HOURS: u32 = 72;
/// Maximum retention window in hours (one year).
pub(crate) const MAX_RETENTION_HOURS: u32 = 8_760;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Build Verdict service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildVerdictConfig {
    /// HTTP listener configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Refresh loop configuration.
    #[serde(default)]
    pub refresh: RefreshConfig,
    /// Record source configuration.
    #[serde(default)]
    pub record_source: RecordSourceConfig,
    /// Audit sink configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl BuildVerdictConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// The path is taken from `path`, then [`CONFIG_ENV_VAR`], then
    /// `build-verdict.toml` in the working directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.refresh.validate()?;
        self.record_source.validate()?;
        self.audit.validate()?;
        Ok(())
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Socket address to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum concurrent request handlers; extra requests wait.
    #[serde(default = "default_max_inflight")]
    pub max_inflight: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_inflight: default_max_inflight(),
        }
    }
}

impl ServerConfig {
    /// Returns the parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bind address is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind
            .trim()
            .parse()
            .map_err(|_| {
                ConfigError::Invalid(format!("invalid server.bind address: {}", self.bind))
            })
    }

    /// Validates listener configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.bind_addr()?;
        if self.max_inflight == 0 || self.max_inflight > MAX_MAX_INFLIGHT {
            return Err(ConfigError::Invalid(format!(
                "server.max_inflight must be between 1 and {MAX_MAX_INFLIGHT}"
            )));
        }
        Ok(())
    }
}

/// Refresh loop configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshConfig {
    /// Delay between the end of one cycle and the start of the next.
    #[serde(default = "default_refresh_interval_ms")]
    pub interval_ms: u64,
    /// Optional upper bound on one cycle's duration.
    #[serde(default)]
    pub cycle_timeout_ms: Option<u64>,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_refresh_interval_ms(),
            cycle_timeout_ms: None,
        }
    }
}

impl RefreshConfig {
    /// Returns the refresh interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Returns the per-cycle timeout, when configured.
    #[must_use]
    pub fn cycle_timeout(&self) -> Option<Duration> {
        self.cycle_timeout_ms.map(Duration::from_millis)
    }

    /// Validates refresh timing.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_REFRESH_INTERVAL_MS ..= MAX_REFRESH_INTERVAL_MS).contains(&self.interval_ms) {
            return Err(ConfigError::Invalid(format!(
                "refresh.interval_ms must be between {MIN_REFRESH_INTERVAL_MS} and \
                 {MAX_REFRESH_INTERVAL_MS}"
            )));
        }
        if let Some(timeout) = self.cycle_timeout_ms
            && !(MIN_CYCLE_TIMEOUT_MS ..= MAX_CYCLE_TIMEOUT_MS).contains(&timeout)
        {
            return Err(ConfigError::Invalid(format!(
                "refresh.cycle_timeout_ms must be between {MIN_CYCLE_TIMEOUT_MS} and \
                 {MAX_CYCLE_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// `SQLite` record source configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordSourceConfig {
    /// `SQLite` database path.
    #[serde(default = "default_record_source_path")]
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
    /// Records older than this many hours are ignored.
    #[serde(default = "default_retention_hours")]
    pub retention_hours: u32,
}

impl Default for RecordSourceConfig {
    fn default() -> Self {
        Self {
            path: default_record_source_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
            retention_hours: default_retention_hours(),
        }
    }
}

impl RecordSourceConfig {
    /// Returns the matching `SQLite` source configuration.
    #[must_use]
    pub fn sqlite_config(&self) -> SqliteSourceConfig {
        SqliteSourceConfig {
            path: self.path.clone(),
            busy_timeout_ms: self.busy_timeout_ms,
            journal_mode: self.journal_mode,
            sync_mode: self.sync_mode,
            retention_hours: self.retention_hours,
        }
    }

    /// Validates record source configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_path_string("record_source.path", &self.path.to_string_lossy())?;
        if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "record_source.busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        if self.retention_hours == 0 || self.retention_hours > MAX_RETENTION_HOURS {
            return Err(ConfigError::Invalid(format!(
                "record_source.retention_hours must be between 1 and {MAX_RETENTION_HOURS}"
            )));
        }
        Ok(())
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard audit events.
    None,
}

/// Audit logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuditConfig {
    /// Sink that receives audit events.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Audit log path (JSON lines); required for the file sink.
    #[serde(default)]
    pub path: Option<String>,
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        match (self.sink, &self.path) {
            (AuditSinkKind::File, None) => {
                Err(ConfigError::Invalid("audit.path is required for the file sink".to_string()))
            }
            (AuditSinkKind::File, Some(path)) => validate_path_string("audit.path", path),
            (_, Some(_)) => {
                Err(ConfigError::Invalid("audit.path is only valid for the file sink".to_string()))
            }
            (_, None) => Ok(()),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the default bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Returns the default in-flight request limit.
const fn default_max_inflight() -> usize {
    DEFAULT_MAX_INFLIGHT
}

/// Returns the default refresh interval.
const fn default_refresh_interval_ms() -> u64 {
    DEFAULT_REFRESH_INTERVAL_MS
}

/// Returns the default record database path.
fn default_record_source_path() -> PathBuf {
    PathBuf::from(DEFAULT_RECORD_SOURCE_PATH)
}

/// Returns the default busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Returns the default retention window.
const fn default_retention_hours() -> u32 {
    DEFAULT_RETENTION_HOURS
}

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
