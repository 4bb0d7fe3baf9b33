//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::rooms::RoomRegistry;

use super::sessions::SessionStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub rooms: Arc<RoomRegistry>,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let rooms = Arc::new(RoomRegistry::new(config.tick_rate));
        let sessions = SessionStore::new();

        Self {
            config,
            rooms,
            sessions,
        }
    }
}
