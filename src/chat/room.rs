//! Room state and broadcast fan-out.
//!
//! Each room owns its presence set and a tokio broadcast channel. All
//! presence mutation goes through [`Room::insert`] and [`Room::remove`],
//! which complete before any broadcast referencing them is emitted.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, RwLock};

use crate::auth::Identity;
use crate::db::StoredMessage;

/// A session present in a room.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Owning session ID.
    pub session_id: String,
    /// User ID from the verified identity.
    pub user_id: i64,
    /// Username from the verified identity.
    pub username: String,
    /// Join timestamp.
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    /// Create a participant for a session bound to an identity.
    pub fn new(session_id: impl Into<String>, identity: &Identity) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: identity.user_id,
            username: identity.username.clone(),
            joined_at: Utc::now(),
        }
    }
}

/// Event fanned out to room subscribers.
#[derive(Debug, Clone)]
pub enum RoomEvent {
    /// A persisted chat message.
    Message(StoredMessage),
    /// A system notice (join/leave), never persisted.
    Notice {
        /// Notice text.
        text: String,
        /// Emission timestamp.
        at: DateTime<Utc>,
    },
    /// Updated presence list.
    UserList {
        /// Sorted, deduplicated usernames.
        users: Vec<String>,
    },
    /// Ephemeral typing state. Carries the origin session so receivers
    /// can exclude the sender.
    Typing {
        /// Session ID of the typist.
        origin: String,
        /// Username of the typist.
        username: String,
        /// Whether the user is currently typing.
        is_typing: bool,
    },
}

/// A chat room: presence set plus broadcast channel.
pub struct Room {
    name: String,
    participants: RwLock<HashMap<String, Participant>>,
    events: broadcast::Sender<RoomEvent>,
}

impl Room {
    /// Create a new room with the given (already normalized) name.
    pub fn new(name: impl Into<String>, channel_capacity: usize) -> Self {
        let (events, _) = broadcast::channel(channel_capacity);
        Self {
            name: name.into(),
            participants: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Get the normalized room name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a receiver for room events.
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    /// Number of sessions present.
    pub async fn member_count(&self) -> usize {
        self.participants.read().await.len()
    }

    /// Check whether a session is present.
    pub async fn contains(&self, session_id: &str) -> bool {
        self.participants.read().await.contains_key(session_id)
    }

    /// Current presence list: sorted usernames, each at most once
    /// regardless of how many sessions a user has in the room.
    pub async fn user_list(&self) -> Vec<String> {
        let participants = self.participants.read().await;
        let users: BTreeSet<&str> = participants.values().map(|p| p.username.as_str()).collect();
        users.into_iter().map(String::from).collect()
    }

    /// Add a participant.
    ///
    /// Returns `(was_new, users)` where `was_new` is false when the
    /// session was already present (the entry is refreshed) and `users`
    /// is the presence list after the mutation.
    pub(crate) async fn insert(&self, participant: Participant) -> (bool, Vec<String>) {
        let mut participants = self.participants.write().await;
        let was_new = participants
            .insert(participant.session_id.clone(), participant)
            .is_none();
        let users: BTreeSet<&str> = participants.values().map(|p| p.username.as_str()).collect();
        let users = users.into_iter().map(String::from).collect();
        (was_new, users)
    }

    /// Remove a session if present.
    ///
    /// Returns the removed participant, the presence list after the
    /// mutation, and the number of sessions remaining.
    pub(crate) async fn remove(
        &self,
        session_id: &str,
    ) -> Option<(Participant, Vec<String>, usize)> {
        let mut participants = self.participants.write().await;
        let removed = participants.remove(session_id)?;
        let remaining = participants.len();
        let users: BTreeSet<&str> = participants.values().map(|p| p.username.as_str()).collect();
        let users = users.into_iter().map(String::from).collect();
        Some((removed, users, remaining))
    }

    /// Broadcast an event to all subscribers.
    ///
    /// Returns the number of receivers; zero when nobody is listening.
    pub fn broadcast(&self, event: RoomEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room").field("name", &self.name).finish()
    }
}
