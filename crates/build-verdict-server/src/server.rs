// crates/build-verdict-server/src/server.rs
// ============================================================================
// Module: Build Verdict HTTP Server
// Description: HTTP transport for verdict queries plus service composition.
// Purpose: Wire config, record source, refresh loop, and query surface.
// Dependencies: build-verdict-core, build-verdict-config, axum, tokio
// ============================================================================

//! ## Overview
//! [`VerdictServer`] is the composition root: it opens the configured record
//! source, runs the startup refresh, spawns the refresh loop, and serves
//! `GET /<Verb>[/<arg>...]` requests until the shutdown future resolves.
//! Handlers are thin: parsing and rendering live in
//! [`build_verdict_core::QuerySurface`]. Concurrent handlers are bounded by a
//! semaphore; requests over the limit wait for a permit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::Path;
use axum::extract::State;
use axum::extract::rejection::PathRejection;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use build_verdict_config::BuildVerdictConfig;
use build_verdict_core::QueryRequest;
use build_verdict_core::QuerySurface;
use build_verdict_core::SharedRecordSource;
use build_verdict_core::SnapshotReader;
use build_verdict_core::snapshot_store;
use build_verdict_store_sqlite::SqliteRecordSource;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;

use crate::audit::AuditSink;
use crate::audit::LifecycleAuditEvent;
use crate::audit::QueryAuditEvent;
use crate::audit::audit_sink_from_config;
use crate::poller::PollerSettings;
use crate::poller::RefreshPoller;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Content type for every verdict response.
pub const TEXT_PLAIN_UTF8: &str = "text/plain; charset=utf-8";

// ============================================================================
// SECTION: Server
// ============================================================================

/// Build verdict service: refresh loop plus HTTP query transport.
pub struct VerdictServer {
    /// Refresh loop, not yet spawned.
    poller: RefreshPoller,
    /// Shared handler state.
    state: Arc<ServerState>,
    /// Configured listen address.
    bind: SocketAddr,
    /// Audit sink for lifecycle events.
    audit: Arc<dyn AuditSink>,
}

impl VerdictServer {
    /// Builds the service from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when config, the record source, or the audit
    /// sink cannot be initialized.
    pub fn from_config(config: &BuildVerdictConfig) -> Result<Self, ServerError> {
        config.validate().map_err(|err| ServerError::Config(err.to_string()))?;
        let bind = config.server.bind_addr().map_err(|err| ServerError::Config(err.to_string()))?;
        let audit = audit_sink_from_config(&config.audit)
            .map_err(|err| ServerError::Init(format!("audit sink: {err}")))?;
        let source = SqliteRecordSource::new(config.record_source.sqlite_config())
            .map_err(|err| ServerError::Init(err.to_string()))?;
        let settings = PollerSettings {
            interval: config.refresh.interval(),
            cycle_timeout: config.refresh.cycle_timeout(),
        };
        Ok(Self::with_source(
            SharedRecordSource::from_source(source),
            settings,
            config.server.max_inflight,
            bind,
            audit,
        ))
    }

    /// Builds the service over an arbitrary record source.
    #[must_use]
    pub fn with_source(
        source: SharedRecordSource,
        settings: PollerSettings,
        max_inflight: usize,
        bind: SocketAddr,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        let (publisher, reader) = snapshot_store();
        let poller = RefreshPoller::new(source, publisher, Arc::clone(&audit), settings);
        let state = Arc::new(ServerState::new(reader, max_inflight, Arc::clone(&audit)));
        Self {
            poller,
            state,
            bind,
            audit,
        }
    }

    /// Binds the configured address and serves until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the startup refresh fails or the
    /// listener cannot be bound.
    pub async fn serve<F>(mut self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.startup().await?;
        let listener = TcpListener::bind(self.bind)
            .await
            .map_err(|err| ServerError::Transport(format!("http bind failed: {err}")))?;
        self.serve_listener(listener, shutdown).await
    }

    /// Serves on an already bound listener until `shutdown` resolves.
    ///
    /// Runs the startup refresh first when [`Self::serve`] has not.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError`] when the startup refresh fails, the
    /// transport fails, or the refresh loop cannot be stopped.
    pub async fn serve_listener<F>(
        mut self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.poller.reader().last_refreshed().is_none() {
            self.startup().await?;
        }
        let local = listener
            .local_addr()
            .map_err(|err| ServerError::Transport(format!("listener address: {err}")))?;
        let listening = LifecycleAuditEvent::new("listening", Some(local.to_string()));
        self.audit.record_lifecycle(&listening);

        let Self {
            poller,
            state,
            audit,
            ..
        } = self;
        let handle = poller.spawn();
        let served = axum::serve(listener, router(state))
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|err| ServerError::Transport(format!("http server failed: {err}")));
        let stopped = handle.shutdown().await;
        audit.record_lifecycle(&LifecycleAuditEvent::new("shutdown", None));
        served.and(stopped)
    }

    /// Runs the startup refresh; failure is fatal.
    async fn startup(&mut self) -> Result<(), ServerError> {
        self.audit.record_lifecycle(&LifecycleAuditEvent::new("started", None));
        if let Err(err) = self.poller.initial_refresh().await {
            let stopped = LifecycleAuditEvent::new("shutdown", Some(err.to_string()));
            self.audit.record_lifecycle(&stopped);
            return Err(err);
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Shared state for HTTP handlers.
pub struct ServerState {
    /// Query surface over the published snapshot.
    surface: QuerySurface,
    /// In-flight request permits.
    inflight: Semaphore,
    /// Audit sink for query events.
    audit: Arc<dyn AuditSink>,
}

impl ServerState {
    /// Creates handler state over a snapshot reader.
    #[must_use]
    pub fn new(reader: SnapshotReader, max_inflight: usize, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            surface: QuerySurface::new(reader),
            inflight: Semaphore::new(max_inflight.max(1)),
            audit,
        }
    }
}

/// Builds the HTTP router for verdict queries.
#[must_use]
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/", get(handle_root))
        .route("/{*path}", get(handle_query))
        .with_state(state)
}

/// Handles `GET /`, which has no verb.
async fn handle_root(State(state): State<Arc<ServerState>>) -> Response {
    answer(&state, "").await
}

/// Handles `GET /<Verb>[/<arg>...]`.
///
/// A path that does not decode to UTF-8 is answered with the usage text.
async fn handle_query(
    State(state): State<Arc<ServerState>>,
    path: Result<Path<String>, PathRejection>,
) -> Response {
    match path {
        Ok(Path(path)) => answer(&state, &path).await,
        Err(_) => answer(&state, "").await,
    }
}

/// Answers one request under an in-flight permit.
async fn answer(state: &ServerState, path: &str) -> Response {
    let Ok(_permit) = state.inflight.acquire().await else {
        return (StatusCode::SERVICE_UNAVAILABLE, [(CONTENT_TYPE, TEXT_PLAIN_UTF8)], "unavailable")
            .into_response();
    };
    let (request, body) = state.surface.handle(path);
    let outcome = if request == QueryRequest::Invalid { "usage" } else { "answered" };
    state.audit.record_query(&QueryAuditEvent::new(request.verb(), outcome, body.len()));
    (StatusCode::OK, [(CONTENT_TYPE, TEXT_PLAIN_UTF8)], body).into_response()
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Build verdict server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Startup refresh errors.
    #[error("refresh error: {0}")]
    Refresh(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
    /// Refresh loop shutdown errors.
    #[error("shutdown error: {0}")]
    Shutdown(String),
}

// ============================================================================
// SECTION: Tests
// ============================================================================
