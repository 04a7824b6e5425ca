//! `TictacServer`: Axum HTTP + WebSocket server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::{Json, Response};
use axum::routing::get;
use serde::Deserialize;
use tictac_core::ConnectionId;
use tictac_settings::Settings;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::health::{self, HealthResponse};
use crate::hub::{Hub, HubHandle};
use crate::shutdown::ShutdownCoordinator;
use crate::websocket::session::{self, SessionConfig};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Sender side of the session hub.
    pub hub: HubHandle,
    /// Limits applied to every upgraded connection.
    pub session: SessionConfig,
    /// Longest display name accepted from `?name=`.
    pub max_name_len: usize,
    /// When the server started.
    pub start_time: Instant,
}

/// Query string accepted on `/ws`.
#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    /// Requested display name.
    pub name: Option<String>,
}

/// The tictac room server.
pub struct TictacServer {
    settings: Settings,
    hub: HubHandle,
    shutdown: Arc<ShutdownCoordinator>,
    start_time: Instant,
}

impl TictacServer {
    /// Create a server and start its hub task. Must be called inside a
    /// Tokio runtime.
    pub fn new(settings: Settings) -> Self {
        let shutdown = Arc::new(ShutdownCoordinator::new());
        let (hub, task) = Hub::new(settings.hub.clone()).spawn(shutdown.token());
        shutdown.track(task);
        Self {
            settings,
            hub,
            shutdown,
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            hub: self.hub.clone(),
            session: SessionConfig::from_settings(&self.settings.server),
            max_name_len: self.settings.hub.max_name_len,
            start_time: self.start_time,
        };

        Router::new()
            .route("/health", get(health_handler))
            .route("/ws", get(ws_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
    }

    /// Bind the configured address and serve until shutdown. Returns the
    /// bound address, which differs from the configured one for port `0`.
    pub async fn listen(&self) -> std::io::Result<SocketAddr> {
        let server = &self.settings.server;
        let listener = TcpListener::bind((server.host.as_str(), server.port)).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.shutdown.token();

        self.shutdown.track(tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(error = %err, "server stopped with error");
            }
        }));
        info!(%addr, board = %self.settings.hub.board, "tictac server listening");
        Ok(addr)
    }

    /// Handle to the running hub.
    pub fn hub(&self) -> &HubHandle {
        &self.hub
    }

    /// The coordinator that stops the hub and the listener.
    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }
}

/// Clean a client-supplied display name. Returns `None` when nothing
/// printable is left.
pub fn sanitize_name(raw: &str, max_len: usize) -> Option<String> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(max_len)
        .collect();
    let name = cleaned.trim();
    (!name.is_empty()).then(|| name.to_owned())
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time, state.hub.stats()))
}

/// GET /ws
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    let name = params
        .name
        .as_deref()
        .and_then(|raw| sanitize_name(raw, state.max_name_len));
    let id = ConnectionId::new();
    let config = state.session;
    ws.max_message_size(config.max_message_size)
        .on_upgrade(move |socket| session::run_session(socket, id, name, state.hub, config))
}
