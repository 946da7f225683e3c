//! WebSocket server assembly for banter.

mod gateway;
mod messages;
mod session;

pub use gateway::chat_ws_handler;
pub use messages::{ClientEvent, ServerEvent, WireMessage};
pub use session::{JoinOutcome, Session};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Router};
use sqlx::SqlitePool;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::auth::TokenVerifier;
use crate::chat::{HistoryLoader, MessageRelay, RoomRegistry};
use crate::config::{ChatConfig, Config};
use crate::{BanterError, Database, Result};

/// Shared state for all connections.
pub struct AppState {
    /// Token verifier gating every connection.
    pub verifier: TokenVerifier,
    /// Room registry owning presence.
    pub registry: RoomRegistry,
    /// Persist-then-broadcast message pipeline.
    pub relay: MessageRelay,
    /// Backlog loader for joins.
    pub history: HistoryLoader,
}

impl AppState {
    /// Assemble the shared state.
    pub fn new(verifier: TokenVerifier, pool: SqlitePool, chat: &ChatConfig) -> Self {
        Self {
            verifier,
            registry: RoomRegistry::new(chat.channel_capacity),
            relay: MessageRelay::new(pool.clone()),
            history: HistoryLoader::new(pool, chat.history_limit),
        }
    }
}

/// The chat relay server.
pub struct ChatServer {
    addr: SocketAddr,
    state: Arc<AppState>,
}

impl ChatServer {
    /// Create a server from configuration and an opened database.
    pub fn new(config: &Config, db: &Database) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| BanterError::Config(format!("invalid server address: {e}")))?;

        let state = Arc::new(AppState::new(
            TokenVerifier::new(&config.auth.token_secret),
            db.pool().clone(),
            &config.chat,
        ));

        Ok(Self { addr, state })
    }

    /// Shared application state.
    pub fn state(&self) -> Arc<AppState> {
        Arc::clone(&self.state)
    }

    /// Build the router.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws", get(chat_ws_handler))
            .with_state(Arc::clone(&self.state))
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve until the process is stopped.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.addr).await?;
        info!("Listening on {}", self.addr);
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}
