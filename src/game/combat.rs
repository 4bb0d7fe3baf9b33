//! Combat and interaction resolution: melee tag validity, the
//! disable/respawn lifecycle and per-tick player action processing.

use crate::ws::protocol::GameEvent;

use super::constants::{TAG_COOLDOWN_SEC, TAG_FACING_DOT, TAG_RANGE, THROW_COOLDOWN_SEC};
use super::geom::{dist_sq, forward_2d_from_yaw, Vec3};
use super::world::{
    spectator_rest_pos_for_team, EntityState, MatchMode, Team, WorldState,
};
use super::{ctf, dodgeball};

/// Nearest active enemy of an entity, across players and bots.
#[derive(Debug, Clone)]
pub struct EnemyTarget {
    pub id: String,
    pub pos: Vec3,
}

pub fn nearest_enemy(state: &WorldState, entity_id: &str) -> Option<EnemyTarget> {
    let me = state.entity(entity_id)?;
    let my_team = me.team;
    let my_pos = me.pos;

    let mut best: Option<EnemyTarget> = None;
    let mut best_dist_sq = f64::INFINITY;
    for core in state.entity_cores() {
        if core.id == entity_id || core.team == my_team || core.state != EntityState::Active {
            continue;
        }
        let d = dist_sq(my_pos, core.pos);
        if d < best_dist_sq {
            best_dist_sq = d;
            best = Some(EnemyTarget {
                id: core.id.clone(),
                pos: core.pos,
            });
        }
    }
    best
}

/// A melee tag lands only on an active enemy inside range that the attacker
/// is facing, while the attacker is off cooldown and the target is not
/// invulnerable. The frontal cone is a forward-dot threshold, so tags are
/// never omnidirectional.
pub fn can_melee_tag(state: &WorldState, attacker_id: &str, target_id: &str) -> bool {
    let (Some(attacker), Some(target)) = (state.entity(attacker_id), state.entity(target_id))
    else {
        return false;
    };
    if attacker.id == target.id || attacker.team == target.team {
        return false;
    }
    if attacker.state != EntityState::Active || target.state != EntityState::Active {
        return false;
    }
    if attacker.tag_cooldown_sec > 0.0 {
        return false;
    }
    if state.now_sec < target.invuln_until_sec {
        return false;
    }

    let dx = target.pos.x - attacker.pos.x;
    let dz = target.pos.z - attacker.pos.z;
    let d2 = dx * dx + dz * dz;
    if d2 > TAG_RANGE * TAG_RANGE {
        return false;
    }

    let (fx, fz) = forward_2d_from_yaw(attacker.yaw);
    let dist = {
        let d = d2.sqrt();
        if d > 0.0 {
            d
        } else {
            1.0
        }
    };
    (fx * dx + fz * dz) / dist > TAG_FACING_DOT
}

/// Transition an entity to `disabled_spectator`. Anything carried drops at
/// the entity's position at disable time; a disabled player is then moved
/// to the team's spectator rest point while bots stay in place. Returns
/// false when the target is missing, already disabled or invulnerable.
pub fn disable_entity(
    state: &mut WorldState,
    target_id: &str,
    source_id: Option<&str>,
    source_team: Option<Team>,
    reason: &str,
) -> bool {
    let now = state.now_sec;
    let disabled_sec = state.match_config.disabled_sec;
    let mode = state.match_config.mode;

    let (target_team, drop_pos, dropped_ball) = {
        let Some(target) = state.entity_mut(target_id) else {
            return false;
        };
        if target.state != EntityState::Active || now < target.invuln_until_sec {
            return false;
        }
        target.state = EntityState::DisabledSpectator;
        target.disabled_timer_sec = disabled_sec as f64;
        target.vel = Vec3::ZERO;
        target.tag_cooldown_sec = 0.0;
        target.throw_cooldown_sec = 0.0;
        let mut dropped_ball = false;
        if mode == MatchMode::Dodgeball && target.has_ball {
            target.has_ball = false;
            dropped_ball = true;
        }
        (target.team, target.pos, dropped_ball)
    };

    if dropped_ball {
        dodgeball::spawn_ground_ball_at(state, drop_pos.x, drop_pos.z);
        state.push_event(GameEvent::BallDrop {
            ball_id: None,
            by_id: Some(target_id.to_string()),
            reason: "disabled".to_string(),
        });
    }

    // Carried flags drop where the entity was hit, before any relocation.
    ctf::drop_carried_flag(state, target_id, drop_pos);

    if state.is_player(target_id) {
        let rest = spectator_rest_pos_for_team(target_team);
        if let Some(target) = state.entity_mut(target_id) {
            target.pos = rest;
        }
    }

    if let Some(scoring_team) = source_team {
        if scoring_team != target_team && mode == MatchMode::Dodgeball {
            state.score.add(scoring_team, 1);
        }
    }

    let score = state.score;
    state.push_event(GameEvent::PlayerDisabledSpectator {
        target_id: target_id.to_string(),
        target_team,
        source_id: source_id.map(|s| s.to_string()),
        source_team,
        reason: reason.to_string(),
        disabled_sec,
        score,
    });
    true
}

/// Re-enable a disabled entity: players return to a team-lane spawn with a
/// fresh invulnerability window, bots get a spawn far from the reference
/// player. Unknown ids are ignored.
pub fn respawn_entity(state: &mut WorldState, entity_id: &str) {
    if state.is_player(entity_id) {
        state.reset_player_for_match(entity_id);
        state.push_event(GameEvent::PlayerReenabled {
            player_id: entity_id.to_string(),
        });
        return;
    }

    if let Some(index) = state.bots.iter().position(|b| b.core.id == entity_id) {
        let reference = state.reference_player_pos();
        state.reset_bot_for_match(index, reference);
    }
}

/// Consume each player's pending one-shot action: a melee tag attempt in
/// CTF, a ball throw in dodgeball. The action flag is always cleared.
pub fn process_player_actions(state: &mut WorldState) {
    let mode = state.match_config.mode;
    let ids: Vec<String> = state.players.iter().map(|p| p.core.id.clone()).collect();

    for id in ids {
        let Some(player) = state.player(&id) else {
            continue;
        };
        let active = player.core.state == EntityState::Active;
        let action = player.input.action;
        let tag_ready = player.core.tag_cooldown_sec <= 0.0;
        let throw_ready = player.core.throw_cooldown_sec <= 0.0;
        let team = player.core.team;

        if !active {
            if let Some(player) = state.player_mut(&id) {
                player.input.action = false;
            }
            continue;
        }
        if !action {
            continue;
        }

        match mode {
            MatchMode::Ctf => {
                if tag_ready {
                    if let Some(target) = nearest_enemy(state, &id) {
                        if can_melee_tag(state, &id, &target.id) {
                            if let Some(player) = state.player_mut(&id) {
                                player.core.tag_cooldown_sec = TAG_COOLDOWN_SEC;
                            }
                            disable_entity(state, &target.id, Some(&id), Some(team), "tag");
                            state.push_event(GameEvent::TagContact {
                                source_id: id.clone(),
                                source_team: team,
                                target_id: target.id,
                            });
                        }
                    }
                }
            }
            MatchMode::Dodgeball => {
                if throw_ready {
                    if dodgeball::throw_ball(state, &id) {
                        if let Some(player) = state.player_mut(&id) {
                            player.core.throw_cooldown_sec = THROW_COOLDOWN_SEC;
                        }
                    } else {
                        state.push_event(GameEvent::DryThrow {
                            player_id: id.clone(),
                            team,
                        });
                    }
                }
            }
        }

        if let Some(player) = state.player_mut(&id) {
            player.input.action = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::{INVULN_SEC, PLAYER_HEIGHT};
    use crate::game::geom::vec3;
    use crate::game::lobby::{self, JoinRequest};
    use crate::game::world::{BallKind, EntityState, WorldState};

    fn two_player_world() -> WorldState {
        let mut state = WorldState::new(5);
        for (id, name, team) in [
            ("player-red", "Rojo", "red"),
            ("player-blue", "Azul", "blue"),
        ] {
            lobby::register_player(
                &mut state,
                JoinRequest {
                    player_id: id,
                    player_name: name,
                    team: Some(team),
                },
            )
            .unwrap();
        }
        state.consume_events();
        state
    }

    /// Put the red player right behind the blue player, facing them.
    fn stage_tag_setup(state: &mut WorldState) {
        {
            let red = state.player_mut("player-red").unwrap();
            red.core.pos = vec3(0.0, PLAYER_HEIGHT, 0.0);
            red.core.yaw = 0.0; // facing +z
        }
        {
            let blue = state.player_mut("player-blue").unwrap();
            blue.core.pos = vec3(0.0, PLAYER_HEIGHT, 1.0);
            blue.core.invuln_until_sec = 0.0;
        }
    }

    #[test]
    fn melee_tag_requires_a_frontal_cone() {
        let mut state = two_player_world();
        stage_tag_setup(&mut state);
        assert!(can_melee_tag(&state, "player-red", "player-blue"));

        // Turn the attacker around; the target is now behind them.
        state.player_mut("player-red").unwrap().core.yaw = std::f64::consts::PI;
        assert!(!can_melee_tag(&state, "player-red", "player-blue"));
    }

    #[test]
    fn melee_tag_respects_range_cooldown_and_teams() {
        let mut state = two_player_world();
        stage_tag_setup(&mut state);

        state.player_mut("player-blue").unwrap().core.pos = vec3(0.0, PLAYER_HEIGHT, 10.0);
        assert!(!can_melee_tag(&state, "player-red", "player-blue"));

        stage_tag_setup(&mut state);
        state.player_mut("player-red").unwrap().core.tag_cooldown_sec = 0.3;
        assert!(!can_melee_tag(&state, "player-red", "player-blue"));

        stage_tag_setup(&mut state);
        state.player_mut("player-blue").unwrap().core.team = Team::Red;
        assert!(!can_melee_tag(&state, "player-red", "player-blue"));
    }

    #[test]
    fn disable_moves_players_to_their_spectator_rest_point() {
        let mut state = two_player_world();
        assert!(disable_entity(
            &mut state,
            "player-blue",
            Some("player-red"),
            Some(Team::Red),
            "tag"
        ));

        let blue = state.player("player-blue").unwrap();
        assert_eq!(blue.core.state, EntityState::DisabledSpectator);
        assert_eq!(blue.core.pos, spectator_rest_pos_for_team(Team::Blue));
        assert_eq!(
            blue.core.disabled_timer_sec,
            state.match_config.disabled_sec as f64
        );
        // CTF mode: a tag never scores.
        assert_eq!(state.score.red, 0);
    }

    #[test]
    fn invulnerable_targets_cannot_be_disabled() {
        let mut state = two_player_world();
        state.now_sec = 10.0;
        state.player_mut("player-blue").unwrap().core.invuln_until_sec = 10.0 + INVULN_SEC;

        assert!(!disable_entity(
            &mut state,
            "player-blue",
            Some("player-red"),
            Some(Team::Red),
            "tag"
        ));
        assert_eq!(
            state.player("player-blue").unwrap().core.state,
            EntityState::Active
        );
    }

    #[test]
    fn repeated_disable_attempts_fail_until_respawn() {
        let mut state = two_player_world();
        assert!(disable_entity(&mut state, "player-blue", None, None, "tag"));
        assert!(!disable_entity(&mut state, "player-blue", None, None, "tag"));

        state.now_sec = 3.0;
        respawn_entity(&mut state, "player-blue");
        let blue = state.player("player-blue").unwrap();
        assert_eq!(blue.core.state, EntityState::Active);
        assert_eq!(blue.core.invuln_until_sec, 3.0 + INVULN_SEC);

        // Fresh invulnerability window blocks an immediate re-tag.
        assert!(!disable_entity(&mut state, "player-blue", None, None, "tag"));
    }

    #[test]
    fn dodgeball_disable_scores_and_drops_the_carried_ball() {
        let mut state = two_player_world();
        state.match_config.mode = MatchMode::Dodgeball;
        {
            let blue = state.player_mut("player-blue").unwrap();
            blue.core.has_ball = true;
            blue.core.pos = vec3(3.0, PLAYER_HEIGHT, 4.0);
        }

        assert!(disable_entity(
            &mut state,
            "player-blue",
            Some("player-red"),
            Some(Team::Red),
            "ball_hit"
        ));

        assert_eq!(state.score.red, 1);
        assert!(!state.player("player-blue").unwrap().core.has_ball);
        // The carried ball became a ground ball at the hit position.
        assert_eq!(state.balls.len(), 1);
        assert_eq!(state.balls[0].kind, BallKind::Ground);
        assert!((state.balls[0].pos.x - 3.0).abs() < 1e-9);
    }

    #[test]
    fn friendly_hits_never_score() {
        let mut state = two_player_world();
        state.match_config.mode = MatchMode::Dodgeball;
        state.player_mut("player-blue").unwrap().core.team = Team::Red;

        assert!(disable_entity(
            &mut state,
            "player-blue",
            Some("player-red"),
            Some(Team::Red),
            "ball_hit"
        ));
        assert_eq!(state.score.red, 0);
        assert_eq!(state.score.blue, 0);
    }

    #[test]
    fn action_flag_triggers_a_tag_and_is_consumed() {
        let mut state = two_player_world();
        stage_tag_setup(&mut state);
        state.player_mut("player-red").unwrap().input.action = true;

        process_player_actions(&mut state);

        assert_eq!(
            state.player("player-blue").unwrap().core.state,
            EntityState::DisabledSpectator
        );
        let red = state.player("player-red").unwrap();
        assert!(!red.input.action);
        assert_eq!(red.core.tag_cooldown_sec, TAG_COOLDOWN_SEC);

        let events = state.consume_events();
        let names: Vec<_> = events
            .iter()
            .map(|record| serde_json::to_value(record).unwrap()["event"].clone())
            .collect();
        assert!(names.iter().any(|n| n == "player_disabled_spectator"));
        assert!(names.iter().any(|n| n == "tag_contact"));
    }

    #[test]
    fn dry_throw_is_reported_when_no_ball_is_carried() {
        let mut state = two_player_world();
        state.match_config.mode = MatchMode::Dodgeball;
        state.player_mut("player-red").unwrap().input.action = true;

        process_player_actions(&mut state);

        let events = state.consume_events();
        let value = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(value["event"], "dry_throw");
    }
}
