//! Wire protocol for the chat WebSocket.
//!
//! JSON text frames, tagged with `type`, camelCase throughout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::StoredMessage;

/// Events sent from client to server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Join a room (leaving the current one, if any).
    Join {
        /// Room name; normalized server-side.
        room: String,
    },
    /// Send a chat message to the active room.
    #[serde(rename_all = "camelCase")]
    SendMessage {
        /// Target room; must match the active room.
        room: String,
        /// Message text.
        message: String,
    },
    /// Report typing state to the active room.
    #[serde(rename_all = "camelCase")]
    Typing {
        /// Target room; must match the active room.
        room: String,
        /// Whether the client is typing.
        is_typing: bool,
    },
}

/// Events sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Room backlog, delivered only to the joining client.
    #[serde(rename_all = "camelCase")]
    LoadMessages {
        /// Messages in timestamp-ascending order.
        messages: Vec<WireMessage>,
    },
    /// A chat message or system notice, broadcast to the room.
    /// Notices carry `user: "System"` and no id.
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        /// Persisted message id; absent for system notices.
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<i64>,
        /// Sender username.
        user: String,
        /// Message text.
        text: String,
        /// RFC 3339 timestamp.
        timestamp: String,
    },
    /// Updated presence list, broadcast on every presence change.
    #[serde(rename_all = "camelCase")]
    UserList {
        /// Usernames currently present.
        users: Vec<String>,
    },
    /// Relayed typing state; never echoes to the typist.
    #[serde(rename_all = "camelCase")]
    Typing {
        /// Username of the typist.
        user: String,
        /// Whether the user is typing.
        is_typing: bool,
    },
    /// Acknowledgment of a failed event, sent only to the sender.
    #[serde(rename_all = "camelCase")]
    Error {
        /// Machine-readable code.
        code: String,
        /// Human-readable message.
        message: String,
    },
}

/// A message as it appears in a `loadMessages` backlog.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    /// Persisted message id.
    pub id: i64,
    /// Sender username.
    pub user: String,
    /// Message text.
    pub text: String,
    /// Normalized room name.
    pub room: String,
    /// RFC 3339 timestamp.
    pub timestamp: String,
}

impl From<&StoredMessage> for WireMessage {
    fn from(msg: &StoredMessage) -> Self {
        Self {
            id: msg.id,
            user: msg.username.clone(),
            text: msg.body.clone(),
            room: msg.room.clone(),
            timestamp: msg.created_at.to_rfc3339(),
        }
    }
}

impl ServerEvent {
    /// Backlog frame from persisted messages.
    pub fn load_messages(messages: &[StoredMessage]) -> Self {
        Self::LoadMessages {
            messages: messages.iter().map(WireMessage::from).collect(),
        }
    }

    /// Chat frame from a persisted message.
    pub fn chat(msg: &StoredMessage) -> Self {
        Self::ChatMessage {
            id: Some(msg.id),
            user: msg.username.clone(),
            text: msg.body.clone(),
            timestamp: msg.created_at.to_rfc3339(),
        }
    }

    /// System notice frame.
    pub fn notice(text: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::ChatMessage {
            id: None,
            user: "System".to_string(),
            text: text.into(),
            timestamp: at.to_rfc3339(),
        }
    }

    /// Error acknowledgment frame.
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}
