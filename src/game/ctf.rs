//! Capture-the-flag engine: pickup, carry, capture and auto-return.

use crate::ws::protocol::GameEvent;

use super::constants::{FLAG_CAPTURE_RANGE, FLAG_PICKUP_RANGE, FLAG_RETURN_SEC, PLAYER_HEIGHT};
use super::geom::{dist_sq, vec3, Vec3};
use super::snapshot::round_to;
use super::world::{EntityState, Team, WorldState};

/// Drop any flag carried by `carrier_id` at `drop_pos` and start its return
/// timer. Safe to call with ids that carry nothing.
pub fn drop_carried_flag(state: &mut WorldState, carrier_id: &str, drop_pos: Vec3) {
    let mut dropped: Vec<(Team, f64, f64)> = Vec::new();
    if let Some(ctf) = state.ctf.as_mut() {
        for flag in ctf.flags_mut() {
            if flag.carrier_id.as_deref() != Some(carrier_id) {
                continue;
            }
            flag.carrier_id = None;
            flag.is_at_base = false;
            flag.return_timer_sec = FLAG_RETURN_SEC;
            flag.pos = vec3(drop_pos.x, PLAYER_HEIGHT, drop_pos.z);
            dropped.push((flag.team, flag.pos.x, flag.pos.z));
        }
    }
    for (team, x, z) in dropped {
        state.push_event(GameEvent::FlagDrop {
            flag_team: team,
            carrier_id: carrier_id.to_string(),
            x: round_to(x, 2),
            z: round_to(z, 2),
        });
    }
}

/// One CTF tick: every active entity may pick up the enemy flag, a carried
/// flag tracks its carrier, and a capture lands only while the carrier's own
/// flag sits at base. Uncarried away flags count down and return home.
pub fn update_ctf(state: &mut WorldState, dt: f64) {
    if state.ctf.is_none() {
        return;
    }

    struct EntityInfo {
        id: String,
        team: Team,
        pos: Vec3,
    }
    let entities: Vec<EntityInfo> = state
        .entity_cores()
        .filter(|core| core.state == EntityState::Active)
        .map(|core| EntityInfo {
            id: core.id.clone(),
            team: core.team,
            pos: core.pos,
        })
        .collect();

    for entity in &entities {
        let enemy_team = entity.team.enemy();

        let picked = {
            let Some(ctf) = state.ctf.as_mut() else { return };
            let enemy_flag = ctf.flag_mut(enemy_team);
            if enemy_flag.carrier_id.is_none()
                && dist_sq(entity.pos, enemy_flag.pos) <= FLAG_PICKUP_RANGE * FLAG_PICKUP_RANGE
            {
                enemy_flag.carrier_id = Some(entity.id.clone());
                enemy_flag.is_at_base = false;
                enemy_flag.return_timer_sec = 0.0;
                true
            } else {
                false
            }
        };
        if picked {
            state.push_event(GameEvent::FlagPickup {
                flag_team: enemy_team,
                carrier_id: entity.id.clone(),
                carrier_team: entity.team,
            });
        }

        let captured = {
            let Some(ctf) = state.ctf.as_mut() else { return };
            let home_at_base = ctf.flag(entity.team).is_at_base;
            let home_pos = ctf.flag(entity.team).home_pos;
            let enemy_flag = ctf.flag_mut(enemy_team);
            if enemy_flag.carrier_id.as_deref() == Some(entity.id.as_str()) {
                enemy_flag.pos = vec3(entity.pos.x, PLAYER_HEIGHT, entity.pos.z);
                let near_home =
                    dist_sq(entity.pos, home_pos) <= FLAG_CAPTURE_RANGE * FLAG_CAPTURE_RANGE;
                if home_at_base && near_home {
                    enemy_flag.reset_to_home();
                    ctf.captures.add(entity.team, 1);
                    true
                } else {
                    false
                }
            } else {
                false
            }
        };
        if captured {
            state.score.add(entity.team, 1);
            let captures = state.ctf.as_ref().map(|c| c.captures).unwrap_or_default();
            let score = state.score;
            state.push_event(GameEvent::FlagCapture {
                by_team: entity.team,
                carrier_id: entity.id.clone(),
                captures,
                score,
            });
        }
    }

    let mut returned: Vec<Team> = Vec::new();
    if let Some(ctf) = state.ctf.as_mut() {
        for flag in ctf.flags_mut() {
            if flag.carrier_id.is_some() || flag.is_at_base {
                continue;
            }
            flag.return_timer_sec = (flag.return_timer_sec - dt).max(0.0);
            if flag.return_timer_sec <= 0.0 {
                flag.reset_to_home();
                returned.push(flag.team);
            }
        }
    }
    for team in returned {
        state.push_event(GameEvent::FlagReturn { flag_team: team });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::lobby::{self, JoinRequest};
    use crate::game::world::WorldState;

    fn ctf_world() -> WorldState {
        let mut state = WorldState::new(11);
        for (id, team) in [("player-red", "red"), ("player-blue", "blue")] {
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

    fn blue_flag_home(state: &WorldState) -> Vec3 {
        state.ctf.as_ref().unwrap().flag(Team::Blue).home_pos
    }

    #[test]
    fn entity_in_range_picks_up_the_enemy_flag_only() {
        let mut state = ctf_world();
        let blue_home = blue_flag_home(&state);
        state.player_mut("player-red").unwrap().core.pos = blue_home;

        update_ctf(&mut state, 0.05);

        let ctf = state.ctf.as_ref().unwrap();
        assert_eq!(
            ctf.flag(Team::Blue).carrier_id.as_deref(),
            Some("player-red")
        );
        assert!(!ctf.flag(Team::Blue).is_at_base);
        // Own flag is untouched even though the red player stands nowhere
        // near it.
        assert!(ctf.flag(Team::Red).is_at_base);

        let events = state.consume_events();
        let value = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(value["event"], "flag_pickup");
    }

    #[test]
    fn carried_flag_tracks_the_carrier() {
        let mut state = ctf_world();
        let blue_home = blue_flag_home(&state);
        state.player_mut("player-red").unwrap().core.pos = blue_home;
        update_ctf(&mut state, 0.05);

        state.player_mut("player-red").unwrap().core.pos = vec3(5.0, PLAYER_HEIGHT, 5.0);
        update_ctf(&mut state, 0.05);

        let flag_pos = state.ctf.as_ref().unwrap().flag(Team::Blue).pos;
        assert!((flag_pos.x - 5.0).abs() < 1e-9);
        assert!((flag_pos.z - 5.0).abs() < 1e-9);
    }

    #[test]
    fn carrying_the_flag_home_captures_and_resets() {
        let mut state = ctf_world();
        let blue_home = blue_flag_home(&state);
        state.player_mut("player-red").unwrap().core.pos = blue_home;
        update_ctf(&mut state, 0.05);
        state.consume_events();

        let red_home = state.ctf.as_ref().unwrap().flag(Team::Red).home_pos;
        state.player_mut("player-red").unwrap().core.pos = red_home;
        update_ctf(&mut state, 0.05);

        let ctf = state.ctf.as_ref().unwrap();
        assert_eq!(ctf.captures.red, 1);
        assert_eq!(state.score.red, 1);
        assert!(ctf.flag(Team::Blue).is_at_base);
        assert!(ctf.flag(Team::Blue).carrier_id.is_none());

        let events = state.consume_events();
        let value = serde_json::to_value(&events[0]).unwrap();
        assert_eq!(value["event"], "flag_capture");
        assert_eq!(value["payload"]["captures"]["red"], 1);
    }

    #[test]
    fn capture_is_blocked_while_own_flag_is_away() {
        let mut state = ctf_world();
        // Both players grab each other's flag.
        let blue_home = blue_flag_home(&state);
        let red_home = state.ctf.as_ref().unwrap().flag(Team::Red).home_pos;
        state.player_mut("player-red").unwrap().core.pos = blue_home;
        state.player_mut("player-blue").unwrap().core.pos = red_home;
        update_ctf(&mut state, 0.05);

        // Red runs home while blue still holds the red flag.
        state.player_mut("player-red").unwrap().core.pos = red_home;
        state.player_mut("player-blue").unwrap().core.pos = vec3(10.0, PLAYER_HEIGHT, 0.0);
        update_ctf(&mut state, 0.05);

        let ctf = state.ctf.as_ref().unwrap();
        assert_eq!(ctf.captures.red, 0, "cannot score while own flag is away");
        assert_eq!(
            ctf.flag(Team::Blue).carrier_id.as_deref(),
            Some("player-red")
        );
    }

    #[test]
    fn dropped_flags_return_home_after_the_timer() {
        let mut state = ctf_world();
        let blue_home = blue_flag_home(&state);
        state.player_mut("player-red").unwrap().core.pos = blue_home;
        update_ctf(&mut state, 0.05);
        state.consume_events();

        let drop_pos = vec3(4.0, PLAYER_HEIGHT, -3.0);
        drop_carried_flag(&mut state, "player-red", drop_pos);
        {
            let ctf = state.ctf.as_ref().unwrap();
            let flag = ctf.flag(Team::Blue);
            assert!(flag.carrier_id.is_none());
            assert_eq!(flag.return_timer_sec, FLAG_RETURN_SEC);
            assert!((flag.pos.x - 4.0).abs() < 1e-9);
        }

        // Move the red player far away so nothing re-picks the flag up.
        state.player_mut("player-red").unwrap().core.pos = vec3(-20.0, PLAYER_HEIGHT, 0.0);

        let mut elapsed = 0.0;
        while elapsed < FLAG_RETURN_SEC + 1.0 {
            update_ctf(&mut state, 0.5);
            elapsed += 0.5;
        }

        let ctf = state.ctf.as_ref().unwrap();
        assert!(ctf.flag(Team::Blue).is_at_base);
        let events = state.consume_events();
        let values: Vec<_> = events
            .iter()
            .map(|record| serde_json::to_value(record).unwrap())
            .collect();
        assert!(values.iter().any(|v| v["event"] == "flag_return"));
        assert!(values.iter().any(|v| v["event"] == "flag_drop"));
    }
}
