//! Message persistence for banter.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::{BanterError, Result};

/// A persisted chat message.
///
/// Immutable once written; `id` and `created_at` are the canonical
/// ordering keys (timestamp ascending, ties broken by id).
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct StoredMessage {
    /// Message ID.
    pub id: i64,
    /// Normalized room name.
    pub room: String,
    /// Sender's username.
    pub username: String,
    /// Message text.
    pub body: String,
    /// Persistence timestamp.
    pub created_at: DateTime<Utc>,
}

/// Repository for message operations.
pub struct MessageRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MessageRepository<'a> {
    /// Create a new repository instance.
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a message and return the persisted record.
    pub async fn insert(&self, room: &str, username: &str, body: &str) -> Result<StoredMessage> {
        let created_at = Utc::now();
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO messages (room, username, body, created_at)
             VALUES ($1, $2, $3, $4) RETURNING id",
        )
        .bind(room)
        .bind(username)
        .bind(body)
        .bind(created_at)
        .fetch_one(self.pool)
        .await
        .map_err(|e| BanterError::Database(e.to_string()))?;

        Ok(StoredMessage {
            id,
            room: room.to_string(),
            username: username.to_string(),
            body: body.to_string(),
            created_at,
        })
    }

    /// Get the most recent `limit` messages in a room, oldest first.
    pub async fn recent_in_room(&self, room: &str, limit: u32) -> Result<Vec<StoredMessage>> {
        let messages = sqlx::query_as::<_, StoredMessage>(
            "SELECT id, room, username, body, created_at FROM (
                SELECT id, room, username, body, created_at FROM messages
                WHERE room = $1
                ORDER BY created_at DESC, id DESC
                LIMIT $2
             ) ORDER BY created_at ASC, id ASC",
        )
        .bind(room)
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await
        .map_err(|e| BanterError::Database(e.to_string()))?;

        Ok(messages)
    }

    /// Count messages in a room.
    pub async fn count_in_room(&self, room: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE room = $1")
            .bind(room)
            .fetch_one(self.pool)
            .await
            .map_err(|e| BanterError::Database(e.to_string()))?;
        Ok(count)
    }
}
