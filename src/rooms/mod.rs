//! Room management: the injected registry and the per-room tick task.

pub mod registry;
pub mod room;

pub use registry::{normalize_room_id, RoomRegistry};
pub use room::{GameRoom, JoinReply, RoomCommand, RoomHandle};
