//! Room registry: presence mutation and broadcast triggering.
//!
//! The registry owns the room map. Rooms are created implicitly on
//! first join and evicted when their presence set becomes empty; a
//! later join recreates them lazily. Join and leave serialize on the
//! registry lock, and broadcasts are emitted before it is released,
//! so presence events are delivered in mutation order and every
//! broadcast reflects a completed mutation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::room::{Participant, Room, RoomEvent};
use crate::{BanterError, Result};

/// Normalize a room name: trim surrounding whitespace and lowercase.
///
/// "Lobby" and " LOBBY " address the same room. An empty result is a
/// validation error.
pub fn normalize_room_name(name: &str) -> Result<String> {
    let normalized = name.trim().to_lowercase();
    if normalized.is_empty() {
        return Err(BanterError::Validation("empty room name".to_string()));
    }
    Ok(normalized)
}

/// Outcome of a successful join.
pub struct JoinedRoom {
    /// Handle to the room.
    pub room: Arc<Room>,
    /// Presence list at the moment of joining.
    pub users: Vec<String>,
    /// Subscription created before the join broadcasts, so the joiner
    /// observes its own presence update.
    pub receiver: broadcast::Receiver<RoomEvent>,
}

/// Registry of live rooms.
pub struct RoomRegistry {
    rooms: RwLock<HashMap<String, Arc<Room>>>,
    channel_capacity: usize,
}

impl RoomRegistry {
    /// Create a registry; `channel_capacity` sizes each room's
    /// broadcast channel.
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            channel_capacity,
        }
    }

    /// Get a room by name, if it currently exists.
    pub async fn get(&self, name: &str) -> Option<Arc<Room>> {
        let name = normalize_room_name(name).ok()?;
        self.rooms.read().await.get(&name).cloned()
    }

    /// Number of live rooms.
    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Join a room, creating it on first use.
    ///
    /// The presence mutation completes before the updated user list and
    /// join notice are broadcast. Re-joining by the same session is a
    /// membership no-op that still re-broadcasts the user list (without
    /// repeating the join notice).
    pub async fn join(&self, name: &str, participant: Participant) -> Result<JoinedRoom> {
        let name = normalize_room_name(name)?;
        let username = participant.username.clone();

        let mut rooms = self.rooms.write().await;
        let room = rooms
            .entry(name.clone())
            .or_insert_with(|| {
                debug!(room = %name, "creating room");
                Arc::new(Room::new(&name, self.channel_capacity))
            })
            .clone();

        // Subscribe before mutating so the joiner sees its own
        // presence broadcast.
        let receiver = room.subscribe();
        let (was_new, users) = room.insert(participant).await;

        // Emit while still holding the registry lock; sends are
        // non-blocking and this keeps emission order equal to
        // mutation order across concurrent joins and leaves.
        room.broadcast(RoomEvent::UserList {
            users: users.clone(),
        });
        if was_new {
            room.broadcast(RoomEvent::Notice {
                text: format!("{username} has joined {name}."),
                at: Utc::now(),
            });
        }
        drop(rooms);

        Ok(JoinedRoom {
            room,
            users,
            receiver,
        })
    }

    /// Remove a session from a room.
    ///
    /// Returns false when the room or session is absent (safe no-op).
    /// The room entry is evicted when its presence set becomes empty.
    pub async fn leave(&self, name: &str, session_id: &str) -> Result<bool> {
        let name = normalize_room_name(name)?;

        let mut rooms = self.rooms.write().await;
        let Some(room) = rooms.get(&name).cloned() else {
            return Ok(false);
        };
        let Some((removed, users, remaining)) = room.remove(session_id).await else {
            return Ok(false);
        };
        if remaining == 0 {
            debug!(room = %name, "evicting empty room");
            rooms.remove(&name);
        }

        room.broadcast(RoomEvent::UserList { users });
        room.broadcast(RoomEvent::Notice {
            text: format!("{} has left {}.", removed.username, name),
            at: Utc::now(),
        });
        drop(rooms);

        Ok(true)
    }
}
