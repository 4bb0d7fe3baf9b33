//! Registry of active rooms. Explicitly owned and injected through
//! `AppState` so tests and multi-instance deployments stay isolated; no
//! module-level statics.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::room::{GameRoom, RoomHandle};

const DEFAULT_ROOM_ID: &str = "arena-main";
const ROOM_ID_MAX_LEN: usize = 64;

/// Sanitize a client-supplied room id: allowed characters only, length
/// capped, with a default fallback for empty input.
pub fn normalize_room_id(raw: &str) -> String {
    let trimmed = raw.trim();
    let source = if trimmed.is_empty() {
        DEFAULT_ROOM_ID
    } else {
        trimmed
    };
    let cleaned: String = source
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | ':' | '-') {
                c
            } else {
                '-'
            }
        })
        .take(ROOM_ID_MAX_LEN)
        .collect();
    if cleaned.is_empty() {
        DEFAULT_ROOM_ID.to_string()
    } else {
        cleaned
    }
}

pub struct RoomRegistry {
    rooms: DashMap<String, RoomHandle>,
    tick_rate: u32,
}

impl RoomRegistry {
    pub fn new(tick_rate: u32) -> Self {
        Self {
            rooms: DashMap::new(),
            tick_rate,
        }
    }

    /// Get the room for a (raw) id, spawning its task on first use.
    pub fn ensure_room(&self, raw_room_id: &str) -> RoomHandle {
        let room_id = normalize_room_id(raw_room_id);
        if let Some(handle) = self.rooms.get(&room_id) {
            return handle.clone();
        }

        let (room, handle) = GameRoom::new(room_id.clone(), self.tick_rate);
        match self.rooms.entry(room_id) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => {
                slot.insert(handle.clone());
                tokio::spawn(room.run());
                handle
            }
        }
    }

    pub fn get(&self, room_id: &str) -> Option<RoomHandle> {
        self.rooms.get(room_id).map(|h| h.clone())
    }

    pub fn active_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_players(&self) -> usize {
        self.rooms.iter().map(|h| h.player_count()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_ids_are_sanitized() {
        assert_eq!(normalize_room_id("lobby-1"), "lobby-1");
        assert_eq!(normalize_room_id("  spaced out  "), "spaced-out");
        assert_eq!(normalize_room_id("a/b\\c"), "a-b-c");
        assert_eq!(normalize_room_id(""), DEFAULT_ROOM_ID);
        let long = "x".repeat(200);
        assert_eq!(normalize_room_id(&long).len(), ROOM_ID_MAX_LEN);
    }

    #[tokio::test]
    async fn ensure_room_reuses_existing_handles() {
        let registry = RoomRegistry::new(20);
        let first = registry.ensure_room("arena");
        let second = registry.ensure_room("arena");
        assert_eq!(first.room_id, second.room_id);
        assert_eq!(registry.active_rooms(), 1);

        registry.ensure_room("other");
        assert_eq!(registry.active_rooms(), 2);
    }
}
