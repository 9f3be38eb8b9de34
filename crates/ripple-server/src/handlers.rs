//! HTTP handlers for the Ripple server.
//!
//! Assembles the axum application: the WebSocket endpoint, the long-polling
//! fallback endpoints, and the health check, behind a CORS allow-list.

use crate::config::{Config, CorsConfig};
use crate::metrics;
use anyhow::{Context, Result};
use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use ripple_core::EventRouter;
use ripple_protocol::ClientEvent;
use ripple_transport::{
    negotiate_transport, serve_connection, ConnectParams, Credentials, PollingError,
    PollingSessions, SessionEnd, SUPPORTED_TRANSPORTS,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The event router and its hub.
    pub router: Arc<EventRouter>,
    /// Long-polling fallback sessions.
    pub sessions: Arc<PollingSessions>,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let router = Arc::new(EventRouter::new());
        let sessions = Arc::new(PollingSessions::new(router.clone()));

        Self {
            router,
            sessions,
            config,
        }
    }
}

/// Build the axum application.
///
/// # Errors
///
/// Returns an error if a configured CORS origin is not a valid header value.
pub fn app(state: Arc<AppState>) -> Result<Router> {
    let cors = cors_layer(&state.config.cors)?;
    let poll = state.config.transport.polling_path.clone();

    Ok(Router::new()
        .route(&state.config.transport.websocket_path, get(ws_handler))
        .route(&poll, post(open_session_handler))
        .route(
            &format!("{poll}/:id"),
            get(poll_handler).delete(close_session_handler),
        )
        .route(&format!("{poll}/:id/events"), post(submit_handler))
        .route("/negotiate", get(negotiate_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .with_state(state))
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let app = app(state.clone())?;

    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("Ripple server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    tokio::spawn(maintenance_loop(state));

    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodic sweep: prune idle polling sessions and refresh gauges.
async fn maintenance_loop(state: Arc<AppState>) {
    let mut ticker =
        tokio::time::interval(Duration::from_millis(state.config.polling.prune_interval_ms));
    let idle_timeout = Duration::from_millis(state.config.polling.idle_timeout_ms);

    loop {
        ticker.tick().await;

        let pruned = state.sessions.prune_idle(idle_timeout);
        if pruned > 0 {
            debug!(pruned, "Pruned idle polling sessions");
        }

        metrics::update_hub_stats(state.router.hub().stats(), state.sessions.session_count());
    }
}

/// Build the CORS layer from the configured origin allow-list.
fn cors_layer(cors: &CorsConfig) -> Result<CorsLayer> {
    let origins = cors
        .allowed_origins
        .iter()
        .map(|origin| {
            origin
                .parse::<HeaderValue>()
                .with_context(|| format!("Invalid CORS origin: {origin}"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]))
}

/// Run the authentication gate over handshake parameters.
fn gate(params: ConnectParams) -> Result<Credentials, Response> {
    Credentials::authenticate(params).map_err(|e| {
        metrics::record_auth_failure();
        warn!(error = %e, "Refused connection attempt");
        (StatusCode::UNAUTHORIZED, e.to_string()).into_response()
    })
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let stats = state.router.hub().stats();
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "connections": stats.connections,
        "onlineUsers": stats.online_users,
        "rooms": stats.rooms,
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let credentials = match gate(params) {
        Ok(credentials) => credentials,
        Err(refused) => return refused,
    };

    let router = state.router.clone();
    let max_event_size = state.config.transport.max_event_size;
    ws.on_upgrade(move |socket| async move {
        let _metrics_guard = metrics::ConnectionMetricsGuard::new("websocket");
        let end = serve_connection(socket, router, credentials, max_event_size).await;
        record_session_end(end);
    })
    .into_response()
}

/// Account for how a WebSocket session ended.
fn record_session_end(end: SessionEnd) {
    if end == SessionEnd::TransportError {
        metrics::record_error("websocket");
    }
}

/// Query parameters for transport negotiation.
#[derive(Debug, Deserialize)]
struct NegotiateParams {
    /// Comma-separated transport names the client supports.
    capabilities: Option<String>,
}

/// Tell a client which transport to use.
async fn negotiate_handler(
    Query(params): Query<NegotiateParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let capabilities: Vec<&str> = params
        .capabilities
        .as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();

    match negotiate_transport(&capabilities, &SUPPORTED_TRANSPORTS) {
        Some(transport) => {
            let path = if transport == "websocket" {
                &state.config.transport.websocket_path
            } else {
                &state.config.transport.polling_path
            };
            Json(serde_json::json!({ "transport": transport, "path": path })).into_response()
        }
        None => (StatusCode::BAD_REQUEST, "No mutually supported transport").into_response(),
    }
}

/// Open a long-polling session.
async fn open_session_handler(
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let credentials = match gate(params) {
        Ok(credentials) => credentials,
        Err(refused) => return refused,
    };

    let id = state.sessions.open(&credentials);
    metrics::record_connection("polling");

    Json(serde_json::json!({
        "sessionId": id,
        "waitMs": state.config.polling.wait_ms,
    }))
    .into_response()
}

/// Drain queued events for a polling session.
async fn poll_handler(
    Path(id): Path<u64>,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let credentials = match gate(params) {
        Ok(credentials) => credentials,
        Err(refused) => return refused,
    };

    let wait = Duration::from_millis(state.config.polling.wait_ms);
    match state.sessions.poll(id, &credentials, wait).await {
        Ok(events) => {
            for event in &events {
                metrics::record_event("outbound", event.name());
            }
            Json(serde_json::json!({ "events": events })).into_response()
        }
        Err(e) => polling_error_response(&e),
    }
}

/// Submit an inbound event on a polling session.
async fn submit_handler(
    Path(id): Path<u64>,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
    Json(event): Json<ClientEvent>,
) -> Response {
    let credentials = match gate(params) {
        Ok(credentials) => credentials,
        Err(refused) => return refused,
    };

    // Counted only once the session accepts it, so probes against unknown
    // or foreign sessions do not inflate the event counter.
    let name = event.name();
    match state.sessions.submit(id, &credentials, event) {
        Ok(()) => {
            metrics::record_event("inbound", name);
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => polling_error_response(&e),
    }
}

/// Close a polling session.
async fn close_session_handler(
    Path(id): Path<u64>,
    Query(params): Query<ConnectParams>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let credentials = match gate(params) {
        Ok(credentials) => credentials,
        Err(refused) => return refused,
    };

    match state.sessions.close(id, &credentials) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => polling_error_response(&e),
    }
}

fn polling_error_response(error: &PollingError) -> Response {
    let status = match error {
        PollingError::UnknownSession => StatusCode::NOT_FOUND,
        PollingError::SessionClosed => StatusCode::GONE,
    };
    (status, error.to_string()).into_response()
}
