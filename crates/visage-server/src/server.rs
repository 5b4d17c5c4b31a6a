//! Axum router and server startup.

use std::sync::Arc;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::connection::{self, ClientRegistry};
use crate::handlers::HandlerState;

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub port: u16,
    /// Per-connection reply queue depth.
    pub max_send_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            max_send_queue: 32,
        }
    }
}

/// Shared application state passed to axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub handler_state: Arc<HandlerState>,
    pub registry: Arc<ClientRegistry>,
}

/// Build the axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the server. The returned handle keeps its background
/// tasks alive.
pub async fn start(
    config: ServerConfig,
    handler_state: Arc<HandlerState>,
) -> Result<ServerHandle, std::io::Error> {
    let registry = Arc::new(ClientRegistry::new(config.max_send_queue));

    let cleanup = connection::start_cleanup_task(
        Arc::clone(&registry),
        std::time::Duration::from_secs(60),
    );

    let state = AppState {
        handler_state,
        registry,
    };
    let router = build_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "visage server started");

    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server,
        _cleanup: cleanup,
    })
}

/// Handle returned by `start()`.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
    _cleanup: tokio::task::JoinHandle<()>,
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle a new WebSocket connection.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (client, rx) = state.registry.register();
    tracing::info!(client_id = %client.id, "client connected");

    connection::handle_ws_connection(socket, client, rx, state.registry, state.handler_state)
        .await;
}

/// Health check endpoint: process status plus live connection count.
async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "healthy",
        "connections": state.registry.count(),
        "sessions": state.handler_state.store.len(),
    }))
}
