//! History loading for joining sessions.
//!
//! Delivered only to the joining session, never broadcast.

use sqlx::SqlitePool;

use super::registry::normalize_room_name;
use crate::db::{MessageRepository, StoredMessage};
use crate::Result;

/// Loader for the bounded, timestamp-ordered backlog of a room.
#[derive(Clone)]
pub struct HistoryLoader {
    pool: SqlitePool,
    limit: u32,
}

impl HistoryLoader {
    /// Create a loader; `limit` caps the backlog length.
    pub fn new(pool: SqlitePool, limit: u32) -> Self {
        Self { pool, limit }
    }

    /// The configured backlog cap.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Load the most recent messages for a room, oldest first.
    pub async fn load(&self, room: &str) -> Result<Vec<StoredMessage>> {
        let room = normalize_room_name(room)?;
        MessageRepository::new(&self.pool)
            .recent_in_room(&room, self.limit)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    #[tokio::test]
    async fn test_load_empty_room() {
        let db = Database::open_in_memory().await.unwrap();
        let loader = HistoryLoader::new(db.pool().clone(), 50);

        let history = loader.load("lobby").await.unwrap();
        assert!(history.is_empty());
    }

    #[tokio::test]
    async fn test_load_ascending_and_capped() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = MessageRepository::new(db.pool());
        for i in 0..8 {
            repo.insert("lobby", "alice", &format!("msg {i}"))
                .await
                .unwrap();
        }

        let loader = HistoryLoader::new(db.pool().clone(), 5);
        let history = loader.load("lobby").await.unwrap();

        assert_eq!(history.len(), 5);
        // Newest five, delivered oldest first
        assert_eq!(history[0].body, "msg 3");
        assert_eq!(history[4].body, "msg 7");
    }

    #[tokio::test]
    async fn test_load_normalizes_room_name() {
        let db = Database::open_in_memory().await.unwrap();
        MessageRepository::new(db.pool())
            .insert("lobby", "alice", "hi")
            .await
            .unwrap();

        let loader = HistoryLoader::new(db.pool().clone(), 50);
        let history = loader.load(" LOBBY ").await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_load_invalid_room_name() {
        let db = Database::open_in_memory().await.unwrap();
        let loader = HistoryLoader::new(db.pool().clone(), 50);
        assert!(loader.load("   ").await.is_err());
    }
}
