// crates/build-verdict-core/src/runtime/query.rs
// ============================================================================
// Module: Query Surface
// Description: Verb parsing and plain-text rendering for verdict queries.
// Purpose: Answer callers from the published snapshot without a transport.
// Dependencies: crate::runtime::snapshot, time
// ============================================================================

//! ## Overview
//! Requests are slash-separated paths whose first segment is a verb matched
//! case-insensitively:
//! - `Info` returns the last refresh time (RFC 3339) or `never`.
//! - `GetBranches` and `GetCISBranches` return each branch followed by `/`.
//! - `GetUserState/<branch>/<user>` returns `<Overall>/<User>`.
//!
//! Anything else, including wrong arity or empty segments, receives
//! [`USAGE`]. Malformed requests are answered, never rejected.

// ============================================================================
// SECTION: Imports
// ============================================================================

use time::format_description::well_known::Rfc3339;

use crate::runtime::snapshot::PublishedSnapshot;
use crate::runtime::snapshot::SnapshotReader;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Response for malformed requests.
pub const USAGE: &str =
    "usage: /Info | /GetBranches | /GetCISBranches | /GetUserState/<branch>/<user>";

/// Response for `Info` before the first refresh.
const NEVER_REFRESHED: &str = "never";

// ============================================================================
// SECTION: Requests
// ============================================================================

/// Parsed verdict query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryRequest {
    /// Last refresh time.
    Info,
    /// Monitored branch list.
    Branches,
    /// Overall and per-user verdict for a branch.
    UserState {
        /// Exact branch name.
        branch: String,
        /// User name, matched case-insensitively.
        user: String,
    },
    /// Unrecognized or malformed request.
    Invalid,
}

impl QueryRequest {
    /// Parses a request path such as `/GetUserState/Main/bob`.
    #[must_use]
    pub fn parse(path: &str) -> Self {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Self::Invalid;
        }
        let segments: Vec<&str> = trimmed.split('/').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Self::Invalid;
        }
        let Some((verb, args)) = segments.split_first() else {
            return Self::Invalid;
        };
        match (verb.to_ascii_lowercase().as_str(), args) {
            ("info", []) => Self::Info,
            ("getbranches" | "getcisbranches", []) => Self::Branches,
            ("getuserstate", [branch, user]) => Self::UserState {
                branch: (*branch).to_string(),
                user: (*user).to_string(),
            },
            _ => Self::Invalid,
        }
    }

    /// Returns a stable label for audit records.
    #[must_use]
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Branches => "branches",
            Self::UserState {
                ..
            } => "user_state",
            Self::Invalid => "invalid",
        }
    }
}

// ============================================================================
// SECTION: Surface
// ============================================================================

/// Answers verdict queries from the published snapshot.
#[derive(Debug, Clone)]
pub struct QuerySurface {
    /// Read handle to the snapshot store.
    reader: SnapshotReader,
}

impl QuerySurface {
    /// Creates a query surface over a snapshot reader.
    #[must_use]
    pub const fn new(reader: SnapshotReader) -> Self {
        Self {
            reader,
        }
    }

    /// Renders the plain-text response for a parsed request.
    #[must_use]
    pub fn respond(&self, request: &QueryRequest) -> String {
        let snapshot = self.reader.current();
        match request {
            QueryRequest::Info => render_info(&snapshot),
            QueryRequest::Branches => render_branches(&snapshot),
            QueryRequest::UserState {
                branch,
                user,
            } => {
                let (overall, user_state) = snapshot.lookup(branch, user);
                format!("{overall}/{user_state}")
            }
            QueryRequest::Invalid => USAGE.to_string(),
        }
    }

    /// Parses and answers a request path.
    #[must_use]
    pub fn handle(&self, path: &str) -> (QueryRequest, String) {
        let request = QueryRequest::parse(path);
        let body = self.respond(&request);
        (request, body)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Renders the last refresh time.
fn render_info(snapshot: &PublishedSnapshot) -> String {
    snapshot
        .refreshed_at()
        .and_then(|at| at.format(&Rfc3339).ok())
        .unwrap_or_else(|| NEVER_REFRESHED.to_string())
}

/// Renders the branch list with a trailing `/` after each name.
fn render_branches(snapshot: &PublishedSnapshot) -> String {
    let mut out = String::new();
    for branch in snapshot.branches() {
        out.push_str(branch.as_str());
        out.push('/');
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================
