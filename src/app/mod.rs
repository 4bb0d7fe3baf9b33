//! Shared application state and session lifecycle.

pub mod sessions;
pub mod state;

pub use sessions::{run_session_sweeper, SessionStore};
pub use state::AppState;
