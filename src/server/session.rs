//! Session lifecycle.
//!
//! A session exists only for an authenticated connection and carries
//! its identity unchanged until disconnect. It tracks at most one
//! active room; joining another room leaves the previous one first so
//! no ghost presence entries survive a switch. Disconnect cleanup is
//! idempotent.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use super::messages::ServerEvent;
use super::AppState;
use crate::auth::Identity;
use crate::chat::{typing, Participant, Room, RoomEvent};
use crate::db::StoredMessage;
use crate::Result;

/// Result of a join: the backlog for the joining session and the room
/// event subscription for the rest of its stay.
pub struct JoinOutcome {
    /// Recent messages, oldest first. Delivered only to this session.
    pub history: Vec<StoredMessage>,
    /// Subscription to room events, live from before the join
    /// broadcasts so none are missed.
    pub receiver: broadcast::Receiver<RoomEvent>,
}

/// Server-side state bound to one live connection and one verified
/// identity.
pub struct Session {
    id: String,
    identity: Identity,
    state: Arc<AppState>,
    current_room: Option<Arc<Room>>,
}

impl Session {
    /// Create a session for a verified identity.
    pub fn new(identity: Identity, state: Arc<AppState>) -> Self {
        let id = format!("ws-{}-{}", identity.user_id, Uuid::new_v4());
        Self {
            id,
            identity,
            state,
            current_room: None,
        }
    }

    /// Session ID, unique per connection.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The identity attached at connect time.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// The active room, if joined.
    pub fn current_room(&self) -> Option<&Arc<Room>> {
        self.current_room.as_ref()
    }

    /// Join a room, leaving the current one first when switching.
    ///
    /// Presence is updated and broadcast by the registry; the backlog
    /// is loaded afterwards and returned for delivery to this session
    /// only. A backlog read failure is logged and degrades to an empty
    /// backlog rather than undoing the join.
    pub async fn join(&mut self, room: &str) -> Result<JoinOutcome> {
        let target = crate::chat::normalize_room_name(room)?;

        match self.current_room.take() {
            Some(prev) if prev.name() == target => {
                // Re-join of the active room: no leave, membership no-op
                self.current_room = Some(prev);
            }
            Some(prev) => {
                self.state.registry.leave(prev.name(), &self.id).await?;
            }
            None => {}
        }

        let joined = self
            .state
            .registry
            .join(&target, Participant::new(&self.id, &self.identity))
            .await?;

        let history = match self.state.history.load(&target).await {
            Ok(history) => history,
            Err(e) => {
                warn!(room = %target, error = %e, "history load failed; delivering empty backlog");
                Vec::new()
            }
        };

        self.current_room = Some(joined.room);
        Ok(JoinOutcome {
            history,
            receiver: joined.receiver,
        })
    }

    /// Relay a chat message through the persist-then-broadcast pipeline.
    pub async fn send_message(&self, room: &str, text: &str) -> Result<StoredMessage> {
        self.state
            .relay
            .send(self.current_room.as_ref(), room, &self.identity, text)
            .await
    }

    /// Relay typing state to the other members of the active room.
    pub fn set_typing(&self, room: &str, is_typing: bool) -> Result<usize> {
        typing::relay(
            self.current_room.as_ref(),
            room,
            &self.id,
            &self.identity.username,
            is_typing,
        )
    }

    /// Convert a room event into a wire frame for this session.
    ///
    /// Returns None for this session's own typing events; everything
    /// else is delivered as-is.
    pub fn frame_for(&self, event: RoomEvent) -> Option<ServerEvent> {
        match event {
            RoomEvent::Message(msg) => Some(ServerEvent::chat(&msg)),
            RoomEvent::Notice { text, at } => Some(ServerEvent::notice(text, at)),
            RoomEvent::UserList { users } => Some(ServerEvent::UserList { users }),
            RoomEvent::Typing {
                origin,
                username,
                is_typing,
            } => {
                if origin == self.id {
                    None
                } else {
                    Some(ServerEvent::Typing {
                        user: username,
                        is_typing,
                    })
                }
            }
        }
    }

    /// Disconnect cleanup: leave the last known room.
    ///
    /// Safe to call more than once; only the first call mutates
    /// presence.
    pub async fn disconnect(&mut self) {
        if let Some(room) = self.current_room.take() {
            if let Err(e) = self.state.registry.leave(room.name(), &self.id).await {
                warn!(session = %self.id, error = %e, "disconnect cleanup failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChatConfig;
    use crate::{Database, TokenVerifier};

    fn identity(user_id: i64, username: &str) -> Identity {
        Identity {
            user_id,
            username: username.to_string(),
        }
    }

    async fn state() -> Arc<AppState> {
        let db = Database::open_in_memory().await.unwrap();
        Arc::new(AppState::new(
            TokenVerifier::new("test-secret"),
            db.pool().clone(),
            &ChatConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_new_session_has_no_room() {
        let session = Session::new(identity(1, "alice"), state().await);
        assert!(session.current_room().is_none());
        assert!(session.id().starts_with("ws-1-"));
    }

    #[tokio::test]
    async fn test_session_ids_unique() {
        let state = state().await;
        let a = Session::new(identity(1, "alice"), Arc::clone(&state));
        let b = Session::new(identity(1, "alice"), state);
        assert_ne!(a.id(), b.id());
    }

    #[tokio::test]
    async fn test_join_sets_current_room() {
        let mut session = Session::new(identity(1, "alice"), state().await);
        let outcome = session.join(" Lobby ").await.unwrap();
        assert_eq!(session.current_room().unwrap().name(), "lobby");
        assert!(outcome.history.is_empty());
    }

    #[tokio::test]
    async fn test_join_invalid_room_name() {
        let mut session = Session::new(identity(1, "alice"), state().await);
        assert!(session.join("   ").await.is_err());
        assert!(session.current_room().is_none());
    }

    #[tokio::test]
    async fn test_switch_leaves_previous_room() {
        let state = state().await;
        let mut session = Session::new(identity(1, "alice"), Arc::clone(&state));

        session.join("lobby").await.unwrap();
        let lobby = state.registry.get("lobby").await.unwrap();
        assert!(lobby.contains(session.id()).await);

        session.join("tech").await.unwrap();
        // No ghost entry in the previous room; lobby is evicted empty
        assert!(state.registry.get("lobby").await.is_none());
        assert_eq!(session.current_room().unwrap().name(), "tech");
    }

    #[tokio::test]
    async fn test_rejoin_same_room_keeps_membership() {
        let state = state().await;
        let mut session = Session::new(identity(1, "alice"), Arc::clone(&state));

        session.join("lobby").await.unwrap();
        session.join("LOBBY").await.unwrap();

        let lobby = state.registry.get("lobby").await.unwrap();
        assert_eq!(lobby.member_count().await, 1);
        assert!(lobby.contains(session.id()).await);
    }

    #[tokio::test]
    async fn test_join_delivers_history() {
        let state = state().await;
        let room = Arc::new(Room::new("lobby", 16));
        // Persist through the relay against a detached room handle
        state
            .relay
            .send(Some(&room), "lobby", &identity(9, "zed"), "earlier")
            .await
            .unwrap();

        let mut session = Session::new(identity(1, "alice"), state);
        let outcome = session.join("lobby").await.unwrap();
        assert_eq!(outcome.history.len(), 1);
        assert_eq!(outcome.history[0].body, "earlier");
    }

    #[tokio::test]
    async fn test_send_message_requires_join() {
        let session = Session::new(identity(1, "alice"), state().await);
        assert!(session.send_message("lobby", "hi").await.is_err());
    }

    #[tokio::test]
    async fn test_send_message_after_join() {
        let mut session = Session::new(identity(1, "alice"), state().await);
        let mut outcome = session.join("lobby").await.unwrap();
        // Drain join broadcasts
        outcome.receiver.recv().await.unwrap();
        outcome.receiver.recv().await.unwrap();

        let stored = session.send_message("lobby", "hi").await.unwrap();
        assert_eq!(stored.room, "lobby");

        match outcome.receiver.recv().await.unwrap() {
            RoomEvent::Message(msg) => assert_eq!(msg.id, stored.id),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_typing_filter_excludes_own_events() {
        let mut session = Session::new(identity(1, "alice"), state().await);
        session.join("lobby").await.unwrap();

        let own = RoomEvent::Typing {
            origin: session.id().to_string(),
            username: "alice".to_string(),
            is_typing: true,
        };
        assert!(session.frame_for(own).is_none());

        let other = RoomEvent::Typing {
            origin: "ws-2-other".to_string(),
            username: "bob".to_string(),
            is_typing: true,
        };
        match session.frame_for(other).unwrap() {
            ServerEvent::Typing { user, is_typing } => {
                assert_eq!(user, "bob");
                assert!(is_typing);
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_frame_for_message_and_presence() {
        let session = Session::new(identity(1, "alice"), state().await);

        let frame = session.frame_for(RoomEvent::UserList {
            users: vec!["alice".to_string()],
        });
        assert!(matches!(frame, Some(ServerEvent::UserList { .. })));

        let frame = session.frame_for(RoomEvent::Notice {
            text: "bob has left lobby.".to_string(),
            at: chrono::Utc::now(),
        });
        match frame.unwrap() {
            ServerEvent::ChatMessage { id, user, .. } => {
                assert!(id.is_none());
                assert_eq!(user, "System");
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_disconnect_removes_presence() {
        let state = state().await;
        let mut session = Session::new(identity(1, "alice"), Arc::clone(&state));
        session.join("lobby").await.unwrap();

        session.disconnect().await;
        assert!(session.current_room().is_none());
        assert!(state.registry.get("lobby").await.is_none());
    }

    #[tokio::test]
    async fn test_disconnect_idempotent() {
        let state = state().await;
        let mut alice = Session::new(identity(1, "alice"), Arc::clone(&state));
        let mut bob = Session::new(identity(2, "bob"), Arc::clone(&state));
        alice.join("lobby").await.unwrap();
        bob.join("lobby").await.unwrap();

        alice.disconnect().await;
        let after_first = state
            .registry
            .get("lobby")
            .await
            .unwrap()
            .user_list()
            .await;

        alice.disconnect().await;
        let after_second = state
            .registry
            .get("lobby")
            .await
            .unwrap()
            .user_list()
            .await;

        assert_eq!(after_first, vec!["bob"]);
        assert_eq!(after_first, after_second);
    }

    #[tokio::test]
    async fn test_disconnect_without_room_is_noop() {
        let mut session = Session::new(identity(1, "alice"), state().await);
        session.disconnect().await;
        assert!(session.current_room().is_none());
    }
}
