//! Ephemeral typing-state relay.
//!
//! The server is a pure relay: nothing is persisted, nothing is
//! deduplicated, and there is no server-side expiry. A client that
//! disconnects mid-typing is not retracted; consuming UIs must
//! time-bound their display of typing state.

use std::sync::Arc;

use super::registry::normalize_room_name;
use super::room::{Room, RoomEvent};
use crate::{BanterError, Result};

/// Relay typing state to the other members of the sender's room.
///
/// Requires an active membership matching `target`. The event carries
/// the origin session id so receivers exclude the sender.
pub fn relay(
    current: Option<&Arc<Room>>,
    target: &str,
    session_id: &str,
    username: &str,
    is_typing: bool,
) -> Result<usize> {
    let target = normalize_room_name(target)?;
    let room = current
        .filter(|room| room.name() == target)
        .ok_or_else(|| {
            BanterError::Validation(format!("no active membership in room '{target}'"))
        })?;

    Ok(room.broadcast(RoomEvent::Typing {
        origin: session_id.to_string(),
        username: username.to_string(),
        is_typing,
    }))
}
