//! Match flow control and the authoritative tick entrypoint.
//!
//! The external driver calls `tick` at a fixed rate; everything else in the
//! simulation is reached from here in a fixed order (movement, actions,
//! bots, mode engine, balls, win check).

use crate::ws::protocol::{GameEvent, InputFrame};

use super::world::{
    CtfState, MatchMode, RawMatchConfig, RoomPhase, TeamScore, WorldMode, WorldState,
};
use super::{combat, ctf, dodgeball, lobby, physics, GameResult};

/// Advance the world by one tick. The dt is clamped server-side so a slow
/// tick can never blow up the physics; time only advances while playing.
pub fn tick(state: &mut WorldState, dt_sec: f64) {
    let dt = dt_sec.clamp(0.001, 0.05);
    state.server_tick += 1;

    if state.mode != WorldMode::Playing {
        update_room_flow(state);
        return;
    }

    state.now_sec += dt;
    state.time_left_sec = (state.time_left_sec - dt).max(0.0);

    physics::update_players(state, dt);
    combat::process_player_actions(state);
    physics::update_bots(state, dt);

    if state.match_config.mode == MatchMode::Ctf {
        ctf::update_ctf(state, dt);
        // CTF score mirrors the capture counters.
        if let Some(ctf) = &state.ctf {
            state.score = ctf.captures;
        }
    }

    dodgeball::update_balls(state, dt);
    evaluate_win_conditions(state);
}

/// Merge a received command into the player's pending input. Unknown player
/// ids are a silent no-op; stale references after a disconnect are expected.
pub fn apply_input(state: &mut WorldState, player_id: &str, frame: &InputFrame) {
    let Some(player) = state.player_mut(player_id) else {
        return;
    };

    player.input.seq = frame.seq.max(player.input.seq);
    if let Some(dt_ms) = frame.dt_ms {
        if dt_ms.is_finite() {
            player.last_input_dt_ms = dt_ms.clamp(0.0, 1000.0);
        }
    }

    let buttons = &frame.input;
    player.input.forward = buttons.forward;
    player.input.back = buttons.back;
    player.input.left = buttons.left;
    player.input.right = buttons.right;
    player.input.sprint = buttons.sprint;
    // One-shot flags OR-combine so a press between ticks is never lost.
    player.input.jump = player.input.jump || buttons.jump;
    player.input.action =
        player.input.action || buttons.action || buttons.tag || buttons.throw_ball;

    if let Some(yaw) = buttons.yaw {
        if yaw.is_finite() {
            player.input.yaw = yaw;
        }
    }
    if let Some(pitch) = buttons.pitch {
        if pitch.is_finite() {
            player.input.pitch = pitch;
        }
    }
}

/// Record a measured round-trip time for a player. Silent no-op when the
/// player is unknown.
pub fn record_ping(state: &mut WorldState, player_id: &str, rtt_ms: f64) {
    let Some(player) = state.player_mut(player_id) else {
        return;
    };
    let rtt = if rtt_ms.is_finite() { rtt_ms } else { 0.0 };
    player.ping_ms = Some(rtt.clamp(0.0, 60_000.0));
}

/// Configure (optionally) and start a match in one step.
pub fn start_match(state: &mut WorldState, raw: Option<&RawMatchConfig>) -> GameResult<()> {
    lobby::configure_room(state, raw, None)?;
    start_match_internal(state);
    Ok(())
}

/// Reset all transient per-match state and spawn everyone for a new match.
pub(crate) fn start_match_internal(state: &mut WorldState) {
    state.mode = WorldMode::Playing;
    state.room.phase = RoomPhase::Playing;
    state.room.countdown_left_sec = 0.0;
    state.now_sec = 0.0;
    state.time_left_sec = state.match_config.duration_sec as f64;
    state.score = TeamScore::default();
    state.last_match_summary.clear();
    state.balls.clear();
    state.ball_counter = 0;
    state.ctf = Some(CtfState::new());

    lobby::ensure_bots(state);

    let player_ids: Vec<String> = state.players.iter().map(|p| p.core.id.clone()).collect();
    for id in &player_ids {
        if let Some(player) = state.player_mut(id) {
            player.ready = false;
        }
        state.reset_player_for_match(id);
    }

    let reference = state.reference_player_pos();
    for index in 0..state.bots.len() {
        state.reset_bot_for_match(index, reference);
    }

    if state.match_config.mode == MatchMode::Dodgeball {
        dodgeball::spawn_initial_balls(state);
        dodgeball::ensure_ball_invariant(state);
    }

    let match_config = state.match_config;
    state.push_event(GameEvent::MatchStart { match_config });
}

/// End the current match. Idempotent while not playing.
pub fn finish_match(state: &mut WorldState, reason: &str) {
    if state.mode != WorldMode::Playing {
        return;
    }
    state.mode = WorldMode::Postmatch;
    state.room.phase = RoomPhase::Postmatch;
    state.room.countdown_left_sec = 0.0;

    for player in &mut state.players {
        player.ready = false;
    }

    let winner = if state.score.red == state.score.blue {
        "draw"
    } else if state.score.red > state.score.blue {
        "red wins"
    } else {
        "blue wins"
    };
    let mode_label = match state.match_config.mode {
        MatchMode::Dodgeball => "Dodgeball",
        MatchMode::Ctf => "Capture the flag",
    };
    state.last_match_summary = format!(
        "{} over: {}. Score {}-{}.",
        mode_label, winner, state.score.red, state.score.blue
    );

    let score = state.score;
    let mode = state.match_config.mode;
    let summary = state.last_match_summary.clone();
    state.push_event(GameEvent::MatchEnd {
        reason: reason.to_string(),
        mode,
        score,
        summary,
    });
}

/// Room flow while no match is running: empty rooms fall back to the lobby;
/// otherwise a match auto-starts. The ready/countdown machinery exists in
/// the data model but the shipped flow starts unconditionally.
fn update_room_flow(state: &mut WorldState) {
    if state.players.is_empty() {
        state.room.phase = RoomPhase::Lobby;
        state.room.countdown_left_sec = 0.0;
        return;
    }
    start_match_internal(state);
}

/// Win checks, evaluated every playing tick: capture target, score target
/// and the match clock.
fn evaluate_win_conditions(state: &mut WorldState) {
    if state.match_config.mode == MatchMode::Ctf {
        let captures = state.ctf.as_ref().map(|ctf| ctf.captures);
        if let Some(captures) = captures {
            let target = state.match_config.ctf_captures_to_win;
            if captures.red >= target || captures.blue >= target {
                finish_match(state, "ctf_target");
                return;
            }
        }
    }

    if state.match_config.mode == MatchMode::Dodgeball {
        let target = state.match_config.dodgeball_score_target;
        if state.score.red >= target || state.score.blue >= target {
            finish_match(state, "dodgeball_target");
            return;
        }
    }

    if state.time_left_sec <= 0.0 {
        finish_match(state, "time");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::lobby::JoinRequest;
    use crate::game::world::{EntityState, Team};
    use crate::ws::protocol::InputButtons;

    fn join(state: &mut WorldState, id: &str, team: &str) {
        lobby::register_player(
            state,
            JoinRequest {
                player_id: id,
                player_name: "Tester",
                team: Some(team),
            },
        )
        .unwrap();
    }

    #[test]
    fn rooms_with_players_auto_start_on_the_next_tick() {
        let mut state = WorldState::new(7);
        join(&mut state, "player-a", "red");
        join(&mut state, "player-b", "blue");
        state.consume_events();

        tick(&mut state, 0.05);

        assert_eq!(state.mode, WorldMode::Playing);
        assert_eq!(state.room.phase, RoomPhase::Playing);

        // Players spawned into team lanes facing their team direction.
        let red = state.player("player-a").unwrap();
        assert_eq!(red.core.pos.z, -18.0);
        assert_eq!(red.core.yaw, 0.0);
        let blue = state.player("player-b").unwrap();
        assert_eq!(blue.core.pos.z, 18.0);
        assert_eq!(blue.core.yaw, std::f64::consts::PI);

        let events = state.consume_events();
        let values: Vec<_> = events
            .iter()
            .map(|record| serde_json::to_value(record).unwrap())
            .collect();
        assert!(values.iter().any(|v| v["event"] == "match_start"));
    }

    #[test]
    fn empty_rooms_fall_back_to_the_lobby_phase() {
        let mut state = WorldState::new(7);
        state.room.phase = RoomPhase::Postmatch;
        tick(&mut state, 0.05);
        assert_eq!(state.mode, WorldMode::Lobby);
        assert_eq!(state.room.phase, RoomPhase::Lobby);
    }

    #[test]
    fn tick_clamps_dt_and_advances_the_clock() {
        let mut state = WorldState::new(7);
        join(&mut state, "player-a", "red");
        tick(&mut state, 0.05); // auto-start

        let before = state.time_left_sec;
        tick(&mut state, 1000.0); // absurd dt clamps to 0.05
        assert!((before - state.time_left_sec - 0.05).abs() < 1e-9);
        assert!((state.now_sec - 0.05).abs() < 1e-9);
        assert_eq!(state.server_tick, 2);
    }

    #[test]
    fn ctf_capture_target_ends_the_match() {
        let mut state = WorldState::new(7);
        join(&mut state, "player-a", "red");
        tick(&mut state, 0.05);
        state.consume_events();

        if let Some(ctf) = state.ctf.as_mut() {
            ctf.captures.red = state.match_config.ctf_captures_to_win;
        }
        tick(&mut state, 0.05);

        assert_eq!(state.mode, WorldMode::Postmatch);
        assert_eq!(state.score.red, state.match_config.ctf_captures_to_win);
        assert!(state.last_match_summary.contains("red wins"));

        let events = state.consume_events();
        let values: Vec<_> = events
            .iter()
            .map(|record| serde_json::to_value(record).unwrap())
            .collect();
        assert!(values
            .iter()
            .any(|v| v["event"] == "match_end" && v["payload"]["reason"] == "ctf_target"));
    }

    #[test]
    fn dodgeball_score_target_ends_the_match() {
        let mut state = WorldState::new(7);
        join(&mut state, "player-a", "red");
        let raw = RawMatchConfig {
            mode: Some("dodgeball".to_string()),
            dodgeball_score_target: Some(5.0),
            ..RawMatchConfig::default()
        };
        start_match(&mut state, Some(&raw)).unwrap();
        state.consume_events();

        state.score.blue = 5;
        tick(&mut state, 0.05);
        assert_eq!(state.mode, WorldMode::Postmatch);
        assert!(state.last_match_summary.contains("blue wins"));
    }

    #[test]
    fn time_expiry_ends_the_match_in_a_draw() {
        let mut state = WorldState::new(7);
        join(&mut state, "player-a", "red");
        tick(&mut state, 0.05);
        state.consume_events();

        state.time_left_sec = 0.01;
        tick(&mut state, 0.05);
        assert_eq!(state.mode, WorldMode::Postmatch);
        assert!(state.last_match_summary.contains("draw"));

        // And the next tick auto-starts a fresh match.
        tick(&mut state, 0.05);
        assert_eq!(state.mode, WorldMode::Playing);
        assert_eq!(state.time_left_sec, state.match_config.duration_sec as f64);
    }

    #[test]
    fn finish_match_is_idempotent_outside_playing() {
        let mut state = WorldState::new(7);
        join(&mut state, "player-a", "red");
        state.consume_events();

        finish_match(&mut state, "time");
        assert_eq!(state.mode, WorldMode::Lobby);
        assert!(state.consume_events().is_empty());
    }

    #[test]
    fn apply_input_coalesces_one_shot_flags() {
        let mut state = WorldState::new(7);
        join(&mut state, "player-a", "red");

        let mut frame = InputFrame {
            seq: 5,
            dt_ms: Some(16.0),
            input: InputButtons {
                jump: true,
                action: true,
                yaw: Some(0.5),
                ..InputButtons::default()
            },
        };
        apply_input(&mut state, "player-a", &frame);

        // A later frame without the flags keeps them latched.
        frame.seq = 6;
        frame.input.jump = false;
        frame.input.action = false;
        frame.input.forward = true;
        apply_input(&mut state, "player-a", &frame);

        let input = &state.player("player-a").unwrap().input;
        assert!(input.jump);
        assert!(input.action);
        assert!(input.forward);
        assert_eq!(input.seq, 6);
        assert_eq!(input.yaw, 0.5);
    }

    #[test]
    fn apply_input_seq_never_decreases() {
        let mut state = WorldState::new(7);
        join(&mut state, "player-a", "red");

        let mut frame = InputFrame {
            seq: 10,
            ..InputFrame::default()
        };
        apply_input(&mut state, "player-a", &frame);
        frame.seq = 3; // stale, out-of-order frame
        apply_input(&mut state, "player-a", &frame);
        assert_eq!(state.player("player-a").unwrap().input.seq, 10);
    }

    #[test]
    fn apply_input_ignores_unknown_players() {
        let mut state = WorldState::new(7);
        apply_input(&mut state, "ghost", &InputFrame::default());
        record_ping(&mut state, "ghost", 42.0);
        // No panic, no state change.
        assert!(state.players.is_empty());
    }

    #[test]
    fn record_ping_clamps_the_rtt() {
        let mut state = WorldState::new(7);
        join(&mut state, "player-a", "red");
        record_ping(&mut state, "player-a", 1e9);
        assert_eq!(state.player("player-a").unwrap().ping_ms, Some(60_000.0));
        record_ping(&mut state, "player-a", -5.0);
        assert_eq!(state.player("player-a").unwrap().ping_ms, Some(0.0));
    }

    #[test]
    fn legacy_tag_and_throw_aliases_latch_the_action() {
        let mut state = WorldState::new(7);
        join(&mut state, "player-a", "red");

        let frame = InputFrame {
            seq: 1,
            dt_ms: None,
            input: InputButtons {
                tag: true,
                ..InputButtons::default()
            },
        };
        apply_input(&mut state, "player-a", &frame);
        assert!(state.player("player-a").unwrap().input.action);
    }

    #[test]
    fn dodgeball_match_start_lays_out_the_ball_ring() {
        let mut state = WorldState::new(7);
        join(&mut state, "player-a", "red");
        let raw = RawMatchConfig {
            mode: Some("dodgeball".to_string()),
            bot_count: Some(6.0),
            ..RawMatchConfig::default()
        };
        start_match(&mut state, Some(&raw)).unwrap();

        assert_eq!(state.mode, WorldMode::Playing);
        assert_eq!(state.bots.len(), 6);
        assert_eq!(
            state.count_balls_in_play(),
            crate::game::constants::DODGEBALL_BALL_CAP
        );
        assert!(state
            .players
            .iter()
            .all(|p| p.core.state == EntityState::Active && !p.core.has_ball));
        assert!(state.bots.iter().all(|b| b.core.team == Team::Red
            || b.core.team == Team::Blue));
    }
}
