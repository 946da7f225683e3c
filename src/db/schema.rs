//! Database schema migrations for banter.
//!
//! Each entry is applied once, in order, inside its own transaction.
//! The applied version is tracked in the `schema_version` table.

/// Ordered list of schema migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: message history
    "CREATE TABLE messages (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        room        TEXT NOT NULL,
        username    TEXT NOT NULL,
        body        TEXT NOT NULL,
        created_at  TEXT NOT NULL
    );
    CREATE INDEX idx_messages_room_created ON messages(room, created_at);",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_not_empty() {
        assert!(!MIGRATIONS.is_empty());
    }

    #[test]
    fn test_first_migration_creates_messages() {
        assert!(MIGRATIONS[0].contains("CREATE TABLE messages"));
    }
}
