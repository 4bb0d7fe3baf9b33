//! Wire-format state building: the full snapshot and the lightweight
//! room-state view, with precision reduction to shrink the payload.

use crate::ws::protocol::{
    BallView, BotView, CtfView, DodgeballView, FlagView, FlagsView, ObjectivesView, PlayerView,
    RoomPlayerView, RoomStateView, Snapshot, VecView, WorldInfo,
};

use super::constants::{ARENA_A, ARENA_B, DODGEBALL_BALL_CAP, MAP_ID, WALK_OUTER_FACTOR};
use super::world::{Flag, WorldState};

/// Round to a fixed number of decimals for the wire.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}

/// Lobby-facing room view: phase, host, ready counts and the player list.
pub fn build_room_state(state: &WorldState) -> RoomStateView {
    let players = state
        .players
        .iter()
        .map(|player| RoomPlayerView {
            id: player.core.id.clone(),
            name: player.name.clone(),
            team: player.core.team,
            ready: player.ready,
            is_host: state.host_player_id.as_deref() == Some(player.core.id.as_str()),
        })
        .collect();

    let min_ready = if state.players.is_empty() {
        state.room.min_ready_players
    } else {
        state.room.min_ready_players.min(state.players.len())
    };

    RoomStateView {
        phase: state.room.phase,
        host_player_id: state.host_player_id.clone(),
        ready_count: state.ready_player_count(),
        total_players: state.players.len(),
        min_ready_players: min_ready,
        countdown_left_sec: round_to(state.room.countdown_left_sec, 2),
        match_config: state.match_config,
        players,
    }
}

fn flag_view(flag: &Flag) -> FlagView {
    FlagView {
        team: flag.team,
        home_pos: VecView {
            x: round_to(flag.home_pos.x, 2),
            y: round_to(flag.home_pos.y, 2),
            z: round_to(flag.home_pos.z, 2),
        },
        pos: VecView {
            x: round_to(flag.pos.x, 2),
            y: round_to(flag.pos.y, 2),
            z: round_to(flag.pos.z, 2),
        },
        carrier_id: flag.carrier_id.clone(),
        is_at_base: flag.is_at_base,
        return_timer_sec: round_to(flag.return_timer_sec, 2),
    }
}

/// Full state snapshot for interpolating clients: positions at 3 decimals,
/// timers at 2, angles at 4.
pub fn build_snapshot(state: &WorldState) -> Snapshot {
    let ctf = state.ctf.as_ref().map(|ctf| CtfView {
        captures: ctf.captures,
        flags: FlagsView {
            red: flag_view(&ctf.red_flag),
            blue: flag_view(&ctf.blue_flag),
        },
    });

    let dodgeball = DodgeballView {
        score_target: state.match_config.dodgeball_score_target,
        ball_cap: DODGEBALL_BALL_CAP,
        carried_balls: state.count_carried_balls(),
        ground_balls: state.count_ground_balls(),
        projectile_balls: state.count_projectile_balls(),
        total_balls: state.count_balls_in_play(),
    };

    Snapshot {
        mode: state.mode,
        room: build_room_state(state),
        server_tick: state.server_tick,
        now_sec: round_to(state.now_sec, 3),
        time_left_sec: round_to(state.time_left_sec, 2),
        score: state.score,
        match_config: state.match_config,
        world: WorldInfo {
            map_id: MAP_ID,
            arena_a: ARENA_A,
            arena_b: ARENA_B,
            walk_outer_factor: WALK_OUTER_FACTOR,
        },
        last_match_summary: state.last_match_summary.clone(),
        players: state
            .players
            .iter()
            .map(|player| PlayerView {
                id: player.core.id.clone(),
                name: player.name.clone(),
                team: player.core.team,
                ready: player.ready,
                x: round_to(player.core.pos.x, 3),
                y: round_to(player.core.pos.y, 3),
                z: round_to(player.core.pos.z, 3),
                yaw: round_to(player.core.yaw, 4),
                pitch: round_to(player.core.pitch, 4),
                state: player.core.state,
                disabled_timer_sec: round_to(player.core.disabled_timer_sec, 2),
                on_ground: player.core.on_ground,
                tag_cooldown_sec: round_to(player.core.tag_cooldown_sec, 2),
                throw_cooldown_sec: round_to(player.core.throw_cooldown_sec, 2),
                has_ball: player.core.has_ball,
                input_seq: player.input.seq,
                ping_ms: player.ping_ms,
            })
            .collect(),
        bots: state
            .bots
            .iter()
            .map(|bot| BotView {
                id: bot.core.id.clone(),
                team: bot.core.team,
                x: round_to(bot.core.pos.x, 3),
                y: round_to(bot.core.pos.y, 3),
                z: round_to(bot.core.pos.z, 3),
                yaw: round_to(bot.core.yaw, 4),
                state: bot.core.state,
                disabled_timer_sec: round_to(bot.core.disabled_timer_sec, 2),
                has_ball: bot.core.has_ball,
            })
            .collect(),
        balls: state
            .balls
            .iter()
            .map(|ball| BallView {
                id: ball.id.clone(),
                kind: ball.kind,
                owner_id: ball.owner_id.clone(),
                team: ball.team,
                x: round_to(ball.pos.x, 3),
                y: round_to(ball.pos.y, 3),
                z: round_to(ball.pos.z, 3),
            })
            .collect(),
        objectives: ObjectivesView { ctf, dodgeball },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::lobby::{self, JoinRequest};
    use crate::game::world::{RoomPhase, WorldState};

    fn seeded_world() -> WorldState {
        let mut state = WorldState::new(31);
        for (id, team) in [("player-a", "red"), ("player-b", "blue")] {
            lobby::register_player(
                &mut state,
                JoinRequest {
                    player_id: id,
                    player_name: "Tester",
                    team: Some(team),
                },
            )
            .unwrap();
        }
        state.consume_events();
        state
    }

    #[test]
    fn round_to_truncates_wire_precision() {
        assert_eq!(round_to(1.23456789, 3), 1.235);
        assert_eq!(round_to(-0.00049, 3), -0.0);
        assert_eq!(round_to(3.14159, 4), 3.1416);
        assert_eq!(round_to(10.0, 2), 10.0);
    }

    #[test]
    fn room_state_counts_ready_players_and_marks_the_host() {
        let mut state = seeded_world();
        state.player_mut("player-b").unwrap().ready = true;

        let view = build_room_state(&state);
        assert_eq!(view.total_players, 2);
        assert_eq!(view.ready_count, 1);
        assert_eq!(view.phase, RoomPhase::ReadyCheck);
        assert_eq!(view.host_player_id.as_deref(), Some("player-a"));
        assert!(view.players[0].is_host);
        assert!(!view.players[1].is_host);
        assert_eq!(view.min_ready_players, 2);
    }

    #[test]
    fn snapshot_positions_are_rounded() {
        let mut state = seeded_world();
        state.player_mut("player-a").unwrap().core.pos.x = 1.23456789;
        state.player_mut("player-a").unwrap().core.yaw = 0.123456789;
        state.now_sec = 12.3456789;

        let snapshot = build_snapshot(&state);
        assert_eq!(snapshot.players[0].x, 1.235);
        assert_eq!(snapshot.players[0].yaw, 0.1235);
        assert_eq!(snapshot.now_sec, 12.346);
    }

    #[test]
    fn snapshot_serializes_to_camel_case_json() {
        let state = seeded_world();
        let snapshot = build_snapshot(&state);
        let value = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(value["mode"], "lobby");
        assert_eq!(value["serverTick"], 0);
        assert!(value["matchConfig"]["botCount"].is_number());
        assert_eq!(value["players"][0]["id"], "player-a");
        assert_eq!(value["objectives"]["dodgeball"]["ballCap"], 10);
        assert_eq!(value["objectives"]["ctf"]["flags"]["red"]["isAtBase"], true);
        assert_eq!(value["world"]["arenaA"], 34.0);
    }
}
