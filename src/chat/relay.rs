//! Message relay: validate, persist, then broadcast.
//!
//! A message is never broadcast before its persisted form exists in
//! the store, so the canonical id and timestamp always accompany the
//! delivered frame. A failed persist drops the message without
//! touching room or presence state.

use std::sync::Arc;

use tracing::warn;

use sqlx::SqlitePool;

use super::registry::normalize_room_name;
use super::room::{Room, RoomEvent};
use crate::auth::Identity;
use crate::db::{MessageRepository, StoredMessage};
use crate::{BanterError, Result};

/// Persist-then-broadcast pipeline for chat messages.
#[derive(Clone)]
pub struct MessageRelay {
    pool: SqlitePool,
}

impl MessageRelay {
    /// Create a relay over the message store.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Relay a message to a room.
    ///
    /// `current` is the sender's active room, if any; the target room
    /// must match it. Validation failures and persistence failures
    /// return an error without broadcasting anything.
    pub async fn send(
        &self,
        current: Option<&Arc<Room>>,
        target: &str,
        identity: &Identity,
        text: &str,
    ) -> Result<StoredMessage> {
        let target = normalize_room_name(target)?;
        let room = current
            .filter(|room| room.name() == target)
            .ok_or_else(|| {
                BanterError::Validation(format!("no active membership in room '{target}'"))
            })?;

        let body = text.trim();
        if body.is_empty() {
            return Err(BanterError::Validation("empty message".to_string()));
        }

        let repo = MessageRepository::new(&self.pool);
        let stored = repo
            .insert(room.name(), &identity.username, body)
            .await
            .map_err(|e| {
                warn!(room = room.name(), error = %e, "message dropped: persist failed");
                e
            })?;

        room.broadcast(RoomEvent::Message(stored.clone()));
        Ok(stored)
    }
}
