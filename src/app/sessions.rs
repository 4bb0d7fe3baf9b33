//! Session bookkeeping for reconnects and idle expiry.
//!
//! The core simulation never decides when a session dies; this store tracks
//! last-seen times and the sweeper removes players whose session has gone
//! idle, which also covers connections that dropped without a leave.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::info;

use crate::rooms::RoomCommand;
use crate::util::time::unix_millis;

use super::AppState;

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub player_id: String,
    pub room_id: String,
    pub created_at_ms: u64,
    pub last_seen_ms: u64,
}

/// Shared map of resume-token to session.
#[derive(Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, token: String, player_id: String, room_id: String) {
        let now = unix_millis();
        let session = Session {
            token: token.clone(),
            player_id,
            room_id,
            created_at_ms: now,
            last_seen_ms: now,
        };
        self.inner.write().insert(token, session);
    }

    /// Refresh the last-seen time; returns false for unknown tokens.
    pub fn touch(&self, token: &str) -> bool {
        let mut sessions = self.inner.write();
        match sessions.get_mut(token) {
            Some(session) => {
                session.last_seen_ms = unix_millis();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, token: &str) -> Option<Session> {
        self.inner.read().get(token).cloned()
    }

    pub fn remove(&self, token: &str) -> Option<Session> {
        self.inner.write().remove(token)
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Remove and return all sessions idle for longer than `timeout_ms`.
    pub fn take_expired(&self, timeout_ms: u64) -> Vec<Session> {
        let now = unix_millis();
        let mut sessions = self.inner.write();
        let expired: Vec<String> = sessions
            .values()
            .filter(|s| now.saturating_sub(s.last_seen_ms) > timeout_ms)
            .map(|s| s.token.clone())
            .collect();
        expired
            .iter()
            .filter_map(|token| sessions.remove(token))
            .collect()
    }
}

/// Periodically remove players whose session went idle. Runs for the
/// lifetime of the process.
pub async fn run_session_sweeper(state: AppState) {
    let timeout_ms = state.config.session_idle_timeout_ms;
    let mut interval = tokio::time::interval(Duration::from_secs(5));

    loop {
        interval.tick().await;

        for session in state.sessions.take_expired(timeout_ms) {
            info!(
                room_id = %session.room_id,
                player_id = %session.player_id,
                "Session expired, removing player"
            );
            if let Some(room) = state.rooms.get(&session.room_id) {
                let _ = room
                    .command_tx
                    .send(RoomCommand::Leave {
                        player_id: session.player_id,
                    })
                    .await;
            }
        }
    }
}
