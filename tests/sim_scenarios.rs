//! End-to-end scenarios driven through the public simulation API.

use arena_game_server::game::constants::{DODGEBALL_BALL_CAP, PLAYER_HEIGHT};
use arena_game_server::game::lobby::{self, JoinRequest};
use arena_game_server::game::r#match;
use arena_game_server::game::world::{
    BallKind, EntityState, RawMatchConfig, RoomPhase, Team, WorldMode, WorldState,
};
use arena_game_server::game::GameError;

fn join(state: &mut WorldState, id: &str, name: &str, team: &str) {
    lobby::register_player(
        state,
        JoinRequest {
            player_id: id,
            player_name: name,
            team: Some(team),
        },
    )
    .expect("join should succeed");
}

fn dodgeball_config() -> RawMatchConfig {
    RawMatchConfig {
        mode: Some("dodgeball".to_string()),
        ..RawMatchConfig::default()
    }
}

#[test]
fn two_players_in_a_fresh_room_auto_start_a_ctf_match() {
    let mut state = WorldState::new(1001);
    join(&mut state, "player-red", "Rojo", "red");
    join(&mut state, "player-blue", "Azul", "blue");

    r#match::tick(&mut state, 0.05);

    assert_eq!(state.mode, WorldMode::Playing);
    assert_eq!(state.room.phase, RoomPhase::Playing);
    assert!(state.ctf.is_some());
    assert_eq!(state.bots.len(), 0, "default config has no bots");

    let red = state.player("player-red").unwrap();
    assert_eq!(red.core.pos.z, -18.0);
    assert_eq!(red.core.pos.y, PLAYER_HEIGHT);
    assert_eq!(red.core.yaw, 0.0, "red lane faces +z");

    let blue = state.player("player-blue").unwrap();
    assert_eq!(blue.core.pos.z, 18.0);
    assert_eq!(blue.core.yaw, std::f64::consts::PI, "blue lane faces -z");
}

#[test]
fn flag_runs_score_one_capture_and_reset_the_flag() {
    let mut state = WorldState::new(1002);
    join(&mut state, "player-red", "Rojo", "red");
    join(&mut state, "player-blue", "Azul", "blue");
    r#match::tick(&mut state, 0.05); // auto-start
    state.consume_events();

    let blue_home = state.ctf.as_ref().unwrap().flag(Team::Blue).home_pos;
    let red_home = state.ctf.as_ref().unwrap().flag(Team::Red).home_pos;

    // Step onto the enemy flag.
    state.player_mut("player-red").unwrap().core.pos = blue_home;
    r#match::tick(&mut state, 0.05);
    assert_eq!(
        state
            .ctf
            .as_ref()
            .unwrap()
            .flag(Team::Blue)
            .carrier_id
            .as_deref(),
        Some("player-red")
    );

    // Carry it back home while the own flag sits at base.
    state.player_mut("player-red").unwrap().core.pos = red_home;
    r#match::tick(&mut state, 0.05);

    let ctf = state.ctf.as_ref().unwrap();
    assert_eq!(ctf.captures.red, 1);
    assert_eq!(state.score.red, 1, "score mirrors captures");
    assert!(ctf.flag(Team::Blue).is_at_base);
    assert!(ctf.flag(Team::Blue).carrier_id.is_none());
}

#[test]
fn a_direct_dodgeball_hit_disables_and_scores() {
    let mut state = WorldState::new(1003);
    join(&mut state, "player-red", "Rojo", "red");
    join(&mut state, "player-blue", "Azul", "blue");
    r#match::start_match(&mut state, Some(&dodgeball_config())).unwrap();

    // Burn through the spawn invulnerability window.
    for _ in 0..30 {
        r#match::tick(&mut state, 0.05);
    }
    state.consume_events();

    // Hand the thrower a ball by taking one out of the world, as a pickup
    // would.
    state.balls.pop();
    {
        let red = state.player_mut("player-red").unwrap();
        red.core.pos = arena_game_server::game::geom::vec3(0.0, PLAYER_HEIGHT, 0.0);
        red.input.yaw = 0.0; // facing +z
        red.input.pitch = 0.0;
        red.core.has_ball = true;
        red.input.action = true;
    }
    state.player_mut("player-blue").unwrap().core.pos =
        arena_game_server::game::geom::vec3(0.0, PLAYER_HEIGHT, 3.0);

    let mut disabled_at = None;
    for i in 0..20 {
        r#match::tick(&mut state, 0.05);
        if state.player("player-blue").unwrap().core.state == EntityState::DisabledSpectator {
            disabled_at = Some(i);
            break;
        }
        // Hold position against movement integration while the ball flies.
        state.player_mut("player-blue").unwrap().core.pos =
            arena_game_server::game::geom::vec3(0.0, PLAYER_HEIGHT, 3.0);
    }

    assert!(disabled_at.is_some(), "the throw should connect");
    assert_eq!(state.score.red, 1, "thrower's team scores the hit");
    assert!(
        state.balls.iter().any(|b| b.kind == BallKind::Ground),
        "the ball drops to the ground at the contact point"
    );
    assert_eq!(state.count_balls_in_play(), DODGEBALL_BALL_CAP);
}

#[test]
fn last_player_leaving_resets_the_room() {
    let mut state = WorldState::new(1004);
    join(&mut state, "player-red", "Rojo", "red");
    let raw = RawMatchConfig {
        mode: Some("dodgeball".to_string()),
        bot_count: Some(4.0),
        ..RawMatchConfig::default()
    };
    r#match::start_match(&mut state, Some(&raw)).unwrap();
    assert_eq!(state.bots.len(), 4);
    assert_eq!(state.mode, WorldMode::Playing);

    assert!(lobby::remove_player(&mut state, "player-red"));

    assert_eq!(state.mode, WorldMode::Lobby);
    assert_eq!(state.room.phase, RoomPhase::Lobby);
    assert!(state.bots.is_empty());
    assert!(state.balls.is_empty());
    assert!(state.host_player_id.is_none());
}

#[test]
fn non_host_configuration_is_rejected_and_changes_nothing() {
    let mut state = WorldState::new(1005);
    join(&mut state, "player-red", "Rojo", "red");
    join(&mut state, "player-blue", "Azul", "blue");
    let before = state.match_config;

    let raw = RawMatchConfig {
        mode: Some("dodgeball".to_string()),
        bot_count: Some(12.0),
        ..RawMatchConfig::default()
    };
    let result = lobby::configure_room(&mut state, Some(&raw), Some("player-blue"));

    assert!(matches!(result, Err(GameError::Authorization(_))));
    assert_eq!(state.match_config, before);

    // The host is allowed to make the same change.
    lobby::configure_room(&mut state, Some(&raw), Some("player-red")).unwrap();
    assert_eq!(state.match_config.bot_count, 12);
}
