//! One room = one tokio task owning that room's `WorldState`.
//!
//! Commands arrive over an mpsc channel and are applied between ticks, so
//! the simulation never sees input mid-tick. Every tick the task drains the
//! event queue and broadcasts events, the room view and the full snapshot
//! to all subscribers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{info, warn};

use crate::game::lobby::{self, JoinRequest};
use crate::game::r#match;
use crate::game::snapshot;
use crate::game::world::{MatchConfig, RawMatchConfig, Team, WorldMode, WorldState};
use crate::game::GameResult;
use crate::util::time::tick_interval_ms;
use crate::ws::protocol::{InputFrame, ServerMsg};

/// Commands from client connections to a room task.
pub enum RoomCommand {
    Join {
        player_id: String,
        player_name: String,
        team: Option<String>,
        match_config: Option<RawMatchConfig>,
        respond: oneshot::Sender<GameResult<JoinReply>>,
    },
    Leave {
        player_id: String,
    },
    Input {
        player_id: String,
        frame: InputFrame,
    },
    Ready {
        player_id: String,
        ready: bool,
        respond: oneshot::Sender<GameResult<bool>>,
    },
    Ping {
        player_id: String,
        rtt_ms: f64,
    },
}

/// What the connection needs to build the welcome message.
#[derive(Debug, Clone)]
pub struct JoinReply {
    pub player_id: String,
    pub player_name: String,
    pub team: Team,
    pub reconnect: bool,
    pub match_config: MatchConfig,
}

/// Cheap cloneable handle to a running room task.
#[derive(Clone)]
pub struct RoomHandle {
    pub room_id: String,
    pub command_tx: mpsc::Sender<RoomCommand>,
    pub broadcast_tx: broadcast::Sender<ServerMsg>,
    pub player_count: Arc<AtomicUsize>,
}

impl RoomHandle {
    pub fn player_count(&self) -> usize {
        self.player_count.load(Ordering::Relaxed)
    }
}

/// The room task: owns the world, ticks it, publishes state.
pub struct GameRoom {
    room_id: String,
    state: WorldState,
    command_rx: mpsc::Receiver<RoomCommand>,
    broadcast_tx: broadcast::Sender<ServerMsg>,
    tick_rate: u32,
    player_count: Arc<AtomicUsize>,
}

impl GameRoom {
    pub fn new(room_id: String, tick_rate: u32) -> (Self, RoomHandle) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (broadcast_tx, _) = broadcast::channel(64);
        let player_count = Arc::new(AtomicUsize::new(0));

        let handle = RoomHandle {
            room_id: room_id.clone(),
            command_tx,
            broadcast_tx: broadcast_tx.clone(),
            player_count: player_count.clone(),
        };

        let room = Self {
            room_id,
            state: WorldState::new(rand::random::<u64>()),
            command_rx,
            broadcast_tx,
            tick_rate,
            player_count,
        };

        (room, handle)
    }

    /// Run the fixed-rate tick loop, applying commands between ticks.
    pub async fn run(self) {
        let GameRoom {
            room_id,
            mut state,
            mut command_rx,
            broadcast_tx,
            tick_rate,
            player_count,
        } = self;

        info!(room_id = %room_id, tick_rate, "Room task started");

        let tick_ms = tick_interval_ms(tick_rate);
        let dt = tick_ms as f64 / 1000.0;
        let mut interval = tokio::time::interval(Duration::from_millis(tick_ms));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    r#match::tick(&mut state, dt);
                    publish(&mut state, &broadcast_tx, &player_count);
                }
                command = command_rx.recv() => {
                    match command {
                        Some(command) => {
                            handle_command(&room_id, &mut state, &broadcast_tx, &player_count, command);
                        }
                        None => break,
                    }
                }
            }
        }

        info!(room_id = %room_id, "Room task stopped");
    }
}

fn handle_command(
    room_id: &str,
    state: &mut WorldState,
    broadcast_tx: &broadcast::Sender<ServerMsg>,
    player_count: &Arc<AtomicUsize>,
    command: RoomCommand,
) {
    match command {
        RoomCommand::Join {
            player_id,
            player_name,
            team,
            match_config,
            respond,
        } => {
            handle_join(
                room_id,
                state,
                broadcast_tx,
                player_count,
                player_id,
                player_name,
                team,
                match_config,
                respond,
            );
        }
        RoomCommand::Leave { player_id } => {
            if lobby::remove_player(state, &player_id) {
                info!(room_id = %room_id, player_id = %player_id, "Player left room");
                publish(state, broadcast_tx, player_count);
            }
        }
        RoomCommand::Input { player_id, frame } => {
            r#match::apply_input(state, &player_id, &frame);
        }
        RoomCommand::Ready {
            player_id,
            ready,
            respond,
        } => {
            let result = lobby::set_player_ready(state, &player_id, ready);
            let ok = result.is_ok();
            let _ = respond.send(result);
            if ok {
                publish(state, broadcast_tx, player_count);
            }
        }
        RoomCommand::Ping { player_id, rtt_ms } => {
            r#match::record_ping(state, &player_id, rtt_ms);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn handle_join(
    room_id: &str,
    state: &mut WorldState,
    broadcast_tx: &broadcast::Sender<ServerMsg>,
    player_count: &Arc<AtomicUsize>,
    player_id: String,
    player_name: String,
    team: Option<String>,
    match_config: Option<RawMatchConfig>,
    respond: oneshot::Sender<GameResult<JoinReply>>,
) {
    let result = lobby::register_player(
        state,
        JoinRequest {
            player_id: &player_id,
            player_name: &player_name,
            team: team.as_deref(),
        },
    );

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(error) => {
            let _ = respond.send(Err(error));
            return;
        }
    };

    let is_host = state.host_player_id.as_deref() == Some(player_id.as_str());
    if let (Some(raw), true) = (match_config.as_ref(), is_host) {
        if let Err(error) = lobby::configure_room(state, Some(raw), Some(&player_id)) {
            warn!(
                room_id = %room_id,
                player_id = %player_id,
                error = %error,
                "Room configuration rejected"
            );
        }
    }

    // Matches auto-start whenever the room is not already playing.
    if state.mode != WorldMode::Playing {
        if let Err(error) = r#match::start_match(state, match_config.as_ref()) {
            warn!(room_id = %room_id, error = %error, "Auto-start failed");
        }
    }

    info!(
        room_id = %room_id,
        player_id = %player_id,
        reconnect = outcome.reconnect,
        player_count = state.players.len(),
        "Player joined room"
    );

    let reply = JoinReply {
        player_id: outcome.player_id,
        player_name: outcome.name,
        team: outcome.team,
        reconnect: outcome.reconnect,
        match_config: state.match_config,
    };
    let _ = respond.send(Ok(reply));
    publish(state, broadcast_tx, player_count);
}

/// Drain events and broadcast the room view plus a full snapshot.
/// Delivery is at-most-once; a send with no subscribers is fine.
fn publish(
    state: &mut WorldState,
    broadcast_tx: &broadcast::Sender<ServerMsg>,
    player_count: &Arc<AtomicUsize>,
) {
    for record in state.consume_events() {
        let _ = broadcast_tx.send(ServerMsg::Event(record));
    }
    let _ = broadcast_tx.send(ServerMsg::RoomState(snapshot::build_room_state(state)));
    let _ = broadcast_tx.send(ServerMsg::Snapshot(snapshot::build_snapshot(state)));
    player_count.store(state.players.len(), Ordering::Relaxed);
}
