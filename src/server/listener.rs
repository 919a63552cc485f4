//! HTTP listener, routes and server main loop

use super::connection::handle_connection;
use super::registry::SessionRegistry;
use crate::config::Config;
use anyhow::{Context, Result};
use axum::{
    extract::{ws::WebSocketUpgrade, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures::StreamExt;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// State shared by every route
#[derive(Clone)]
struct AppState {
    registry: Arc<SessionRegistry>,
    config: Arc<Config>,
}

/// HTTP + WebSocket game server
pub struct GameServer {
    config: Arc<Config>,
    registry: Arc<SessionRegistry>,
}

impl GameServer {
    /// Create a server with an empty registry
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(SessionRegistry::new()),
        }
    }

    /// The live session registry
    pub fn registry(&self) -> Arc<SessionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Build the route table
    pub fn router(&self) -> Router {
        let state = AppState {
            registry: Arc::clone(&self.registry),
            config: Arc::clone(&self.config),
        };

        Router::new()
            .route("/", get(index))
            .route("/keep_job_alive", get(keep_job_alive))
            .route("/ws/:game_id", get(ws_handler))
            .nest_service("/static", ServeDir::new(&self.config.server.static_dir))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// Bind the configured address
    pub async fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        tracing::info!("Server listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Bind and serve until a shutdown signal arrives
    pub async fn run(&self, shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener, shutdown_rx).await
    }

    /// Serve on an already bound listener until a shutdown signal arrives
    pub async fn serve(&self, listener: TcpListener, mut shutdown_rx: mpsc::Receiver<()>) -> Result<()> {
        axum::serve(listener, self.router())
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("Server stopped with {} live sessions", self.registry.len().await);
        Ok(())
    }
}

/// GET / - the game page
async fn index(State(state): State<AppState>) -> Response {
    let path = state.config.server.templates_dir.join("index.html");
    match tokio::fs::read_to_string(&path).await {
        Ok(page) => Html(page).into_response(),
        Err(e) => {
            tracing::error!("Failed to read {:?}: {}", path, e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Page unavailable").into_response()
        }
    }
}

/// GET /keep_job_alive - liveness probe
async fn keep_job_alive() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "Job is alive" }))
}

/// GET /ws/:game_id - upgrade and hand the socket to the connection handler
async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(game_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    if !state.config.game.is_valid_session_id(&game_id) {
        tracing::debug!("Refusing upgrade for session id {:?}", game_id);
        return (StatusCode::BAD_REQUEST, "Invalid session id").into_response();
    }

    let registry = Arc::clone(&state.registry);
    let idle_timeout = state.config.game.idle_timeout();
    ws.on_upgrade(move |socket| async move {
        let (sink, stream) = socket.split();
        handle_connection(sink, stream, game_id, registry, idle_timeout).await;
    })
}
