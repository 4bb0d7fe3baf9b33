//! Entity lifecycle: join/reconnect/leave, host assignment, room
//! configuration, ready toggles and bot population sizing.

use crate::ws::protocol::GameEvent;

use super::constants::{NAME_MAX, NAME_MIN};
use super::world::{
    sanitize_match_config, sanitize_player_name, Bot, Player, RawMatchConfig, RoomPhase, Team,
    WorldMode, WorldState,
};
use super::{ctf, dodgeball, GameError, GameResult};

#[derive(Debug, Clone)]
pub struct JoinRequest<'a> {
    pub player_id: &'a str,
    pub player_name: &'a str,
    pub team: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub player_id: String,
    pub name: String,
    pub team: Team,
    pub reconnect: bool,
}

/// Register a player, or revive an existing one under the same id.
/// Reconnects keep the player's position and never create a duplicate.
pub fn register_player(state: &mut WorldState, req: JoinRequest<'_>) -> GameResult<JoinOutcome> {
    let clean_name = sanitize_player_name(req.player_name);
    if clean_name.chars().count() < NAME_MIN {
        return Err(GameError::Validation(format!(
            "player name must be {}-{} characters",
            NAME_MIN, NAME_MAX
        )));
    }

    let team = Team::normalize(req.team);
    let reconnect = if let Some(player) = state.player_mut(req.player_id) {
        player.name = clean_name.clone();
        player.core.team = team;
        player.ready = false;
        true
    } else {
        state
            .players
            .push(Player::new(req.player_id.to_string(), clean_name.clone(), team));
        if state.host_player_id.is_none() {
            state.host_player_id = Some(req.player_id.to_string());
        }
        if state.room.phase == RoomPhase::Lobby {
            state.room.phase = RoomPhase::ReadyCheck;
        }
        false
    };

    state.push_event(GameEvent::Join {
        player_id: req.player_id.to_string(),
        player_name: clean_name.clone(),
        team,
        reconnect,
    });

    Ok(JoinOutcome {
        player_id: req.player_id.to_string(),
        name: clean_name,
        team,
        reconnect,
    })
}

/// Remove a player. Unknown ids are a no-op returning false. Drops anything
/// the player carried, reassigns the host and resets the room when empty.
pub fn remove_player(state: &mut WorldState, player_id: &str) -> bool {
    let Some(index) = state.players.iter().position(|p| p.core.id == player_id) else {
        return false;
    };
    let player = state.players.remove(index);

    state.push_event(GameEvent::Leave {
        player_id: player.core.id.clone(),
        player_name: player.name.clone(),
        team: player.core.team,
    });

    ctf::drop_carried_flag(state, player_id, player.core.pos);
    if state.match_config.mode == super::world::MatchMode::Dodgeball && player.core.has_ball {
        dodgeball::spawn_ground_ball_at(state, player.core.pos.x, player.core.pos.z);
    }

    if state.players.is_empty() {
        state.mode = WorldMode::Lobby;
        state.host_player_id = None;
        state.time_left_sec = state.match_config.duration_sec as f64;
        state.bots.clear();
        state.balls.clear();
        state.room.phase = RoomPhase::Lobby;
        state.room.countdown_left_sec = 0.0;
    } else if state.host_player_id.as_deref() == Some(player_id) {
        state.host_player_id = state.players.first().map(|p| p.core.id.clone());
    }

    if state.mode != WorldMode::Playing && state.room.phase != RoomPhase::Lobby {
        state.room.phase = RoomPhase::ReadyCheck;
        state.room.countdown_left_sec = 0.0;
    }
    if state.match_config.mode == super::world::MatchMode::Dodgeball {
        dodgeball::ensure_ball_invariant(state);
    }
    true
}

/// Apply a (host-only) room configuration. Every field is re-clamped; caller
/// ranges are never trusted. Resets ready flags and ball possession.
pub fn configure_room(
    state: &mut WorldState,
    raw: Option<&RawMatchConfig>,
    requested_by: Option<&str>,
) -> GameResult<()> {
    if state.players.is_empty() {
        return Err(GameError::State("no players connected".to_string()));
    }
    if state.mode == WorldMode::Playing {
        return Err(GameError::State("match already in progress".to_string()));
    }
    if let (Some(requester), Some(host)) = (requested_by, state.host_player_id.as_deref()) {
        if requester != host {
            return Err(GameError::Authorization(
                "only the host can change room settings".to_string(),
            ));
        }
    }

    state.match_config = match raw {
        Some(raw) => sanitize_match_config(raw),
        None => state.match_config,
    };
    state.mode = WorldMode::Lobby;
    state.room.phase = RoomPhase::ReadyCheck;
    state.room.countdown_left_sec = 0.0;
    for player in &mut state.players {
        player.ready = false;
        player.core.has_ball = false;
    }
    for bot in &mut state.bots {
        bot.core.has_ball = false;
    }
    state.balls.clear();
    Ok(())
}

/// Toggle a player's ready flag. Rejected once the match has started.
pub fn set_player_ready(state: &mut WorldState, player_id: &str, ready: bool) -> GameResult<bool> {
    if state.player(player_id).is_none() {
        return Err(GameError::Validation("unknown player".to_string()));
    }
    if state.mode == WorldMode::Playing {
        return Err(GameError::State("match already started".to_string()));
    }
    if let Some(player) = state.player_mut(player_id) {
        player.ready = ready;
    }

    if matches!(state.room.phase, RoomPhase::Lobby | RoomPhase::Postmatch) {
        state.room.phase = RoomPhase::ReadyCheck;
    }
    if state.room.phase == RoomPhase::Countdown && !ready {
        state.room.phase = RoomPhase::ReadyCheck;
        state.room.countdown_left_sec = 0.0;
        state.push_event(GameEvent::CountdownCancel {
            reason: "player_unready".to_string(),
            player_id: player_id.to_string(),
        });
    }
    Ok(ready)
}

/// Grow or truncate the bot roster to match the configured count.
pub fn ensure_bots(state: &mut WorldState) {
    let wanted = state.match_config.bot_count as usize;
    while state.bots.len() < wanted {
        let index = state.bots.len();
        let bot = Bot::new(index, state.match_config.bot_count, &mut state.rng);
        state.bots.push(bot);
    }
    state.bots.truncate(wanted);
}
