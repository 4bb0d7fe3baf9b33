//! Authoritative game simulation.
//!
//! One `WorldState` per room, mutated only by the sequential tick in
//! `r#match::tick` and the command surface (`lobby`, `r#match`). No locks:
//! rooms never share state, so the driver may tick rooms concurrently.

pub mod combat;
pub mod constants;
pub mod ctf;
pub mod dodgeball;
pub mod geom;
pub mod lobby;
pub mod r#match;
pub mod physics;
pub mod snapshot;
pub mod world;

pub use world::WorldState;

use thiserror::Error;

/// Errors returned by mutating room operations. The network layer surfaces
/// the message to the offending client only; a failed operation never
/// aborts the tick loop or affects other players.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GameError {
    /// Malformed or out-of-range input.
    #[error("{0}")]
    Validation(String),
    /// A non-host attempted a host-only room mutation.
    #[error("{0}")]
    Authorization(String),
    /// Operation is invalid for the current match phase.
    #[error("{0}")]
    State(String),
}

impl GameError {
    pub fn code(&self) -> &'static str {
        match self {
            GameError::Validation(_) => "validation",
            GameError::Authorization(_) => "authorization",
            GameError::State(_) => "state",
        }
    }
}

pub type GameResult<T> = Result<T, GameError>;
