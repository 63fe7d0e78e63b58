//! HTTP handlers for the Beacon server.
//!
//! Registration creates a session hub; the upgrade endpoint attaches a
//! WebSocket to an existing hub for the rest of the connection's life.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::{ws::WebSocket, ConnectInfo, Path, State, WebSocketUpgrade},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use beacon_core::{HubHandle, RegistryError, SessionRegistry};
use beacon_protocol::{Envelope, FindRequest};
use beacon_transport::{Adapter, WebSocketConnection};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// Session hubs by key.
    pub registry: SessionRegistry,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            registry: SessionRegistry::with_config(config.registry_config()),
            config,
        }
    }
}

/// Build the HTTP router.
pub fn app(state: Arc<AppState>) -> Router {
    let session_route = state.config.http.session_route();

    Router::new()
        .route("/", get(homepage_handler))
        .route("/find", post(find_handler))
        .route("/find/", post(find_handler))
        .route("/health", get(health_handler))
        .route(&session_route, get(ws_handler))
        .with_state(state)
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let addr = config.bind_addr()?;

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let session_path = config.http.session_path.clone();
    let state = Arc::new(AppState::new(config));

    // Bind and serve
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Beacon server listening on {}", addr);
    info!("Session endpoint: ws://{}{}/<uuid>", addr, session_path);

    serve(listener, state).await
}

/// Serve the app on an already bound listener.
///
/// Peer addresses are made available to handlers through [`ConnectInfo`].
///
/// # Errors
///
/// Returns an error if accepting connections fails.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<()> {
    axum::serve(
        listener,
        app(state).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn envelope_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(Envelope::error(message))).into_response()
}

/// Homepage handler.
async fn homepage_handler(State(state): State<Arc<AppState>>) -> Response {
    let path = &state.config.http.homepage;
    match tokio::fs::read(path).await {
        Ok(contents) => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            contents,
        )
            .into_response(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read homepage");
            envelope_error(StatusCode::NOT_FOUND, "Homepage not available")
        }
    }
}

/// Health check handler.
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions": state.registry.len(),
    }))
}

/// Beacon registration handler.
async fn find_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let mut request = match FindRequest::from_body(&body) {
        Ok(request) => request,
        Err(e) => {
            debug!(error = %e, "Rejected registration");
            metrics::record_error("registration");
            return envelope_error(StatusCode::BAD_REQUEST, e.to_string());
        }
    };

    let uuid = request.beacon.uuid.clone();
    if let Err(e) = state.registry.get_or_create(&uuid) {
        warn!(session = %uuid, error = %e, "Failed to create session");
        metrics::record_error("registration");
        let status = match e {
            RegistryError::InvalidKey(_) => StatusCode::BAD_REQUEST,
            RegistryError::MaxSessionsReached => StatusCode::SERVICE_UNAVAILABLE,
        };
        return envelope_error(status, e.to_string());
    }

    request.beacon.session_url = Some(state.config.http.session_url(&uuid));

    metrics::record_registration();
    metrics::set_active_sessions(state.registry.len());
    info!(
        session = %uuid,
        name = %request.beacon.name,
        mac = %request.beacon.mac,
        "Beacon registered"
    );

    Json(Envelope::created(request.beacon)).into_response()
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(key): Path<String>,
    ConnectInfo(remote): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(hub) = state.registry.get(&key) else {
        debug!(session = %key, remote = %remote, "Upgrade for unknown session");
        return envelope_error(StatusCode::NOT_FOUND, format!("Session not found: {}", key));
    };

    let capacity = state.config.limits.outbound_queue_capacity;

    ws.max_message_size(state.config.limits.max_message_size)
        .on_failed_upgrade(|e: axum::Error| {
            warn!(error = %e, "WebSocket upgrade failed");
            metrics::record_error("upgrade");
        })
        .on_upgrade(move |socket| handle_websocket(socket, remote, hub, capacity))
}

/// Attach an upgraded socket to its session hub.
async fn handle_websocket(
    socket: WebSocket,
    remote: SocketAddr,
    hub: HubHandle,
    capacity: usize,
) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    let adapter = Adapter::new(hub.clone(), capacity);
    debug!(
        session = %hub.key(),
        member = %adapter.id(),
        remote = %remote,
        "WebSocket connected"
    );

    let connection = WebSocketConnection::new(socket).with_remote_addr(remote.to_string());
    let stats = adapter.run(connection).await;

    metrics::record_messages(stats.received, "inbound");
    metrics::record_messages(stats.sent, "outbound");
    debug!(session = %hub.key(), received = stats.received, sent = stats.sent, "WebSocket disconnected");
}
