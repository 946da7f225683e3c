//! Chat core: rooms, presence, message relay, history, typing.

mod history;
mod registry;
mod relay;
mod room;
pub mod typing;

pub use history::HistoryLoader;
pub use registry::{normalize_room_name, JoinedRoom, RoomRegistry};
pub use relay::MessageRelay;
pub use room::{Participant, Room, RoomEvent};
