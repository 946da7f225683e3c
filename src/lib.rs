//! banter - multi-room real-time chat relay.
//!
//! Authenticated clients hold one WebSocket connection each, join
//! named rooms, exchange messages that are persisted before broadcast,
//! see live presence, and receive a bounded history backlog on join.

pub mod auth;
pub mod chat;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod server;

pub use auth::{Identity, TokenClaims, TokenVerifier};
pub use chat::{
    normalize_room_name, HistoryLoader, JoinedRoom, MessageRelay, Participant, Room, RoomEvent,
    RoomRegistry,
};
pub use config::Config;
pub use db::{Database, MessageRepository, StoredMessage};
pub use error::{BanterError, Result};
pub use server::{AppState, ChatServer, ClientEvent, ServerEvent, Session};
