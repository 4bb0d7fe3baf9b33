//! Per-tick movement integration: active and spectator movement for
//! players, bot steering, and the iterative push-apart separation passes.

use rand::Rng;

use super::combat;
use super::constants::*;
use super::dodgeball;
use super::geom::{
    clamp_pitch, clamp_to_playable_ellipse, clamp_to_spectator_bounds, dist_sq,
    forward_2d_from_yaw, forward_3d_from_yaw_pitch, normalize_yaw, playable_ellipse_axes,
    sample_point_in_ellipse,
};
use super::world::{EntityCore, EntityState, InputState, MatchMode, WorldState};

/// Walk/sprint movement with gravity, a single jump impulse and ground
/// collision. The position is then clamped into the playable ellipse by
/// radial rescaling, never a wall bounce.
pub fn update_active_movement(core: &mut EntityCore, input: &mut InputState, dt: f64) {
    core.yaw = normalize_yaw(if input.yaw.is_finite() {
        input.yaw
    } else {
        core.yaw
    });
    core.pitch = clamp_pitch(if input.pitch.is_finite() {
        input.pitch
    } else {
        core.pitch
    });

    let (fx, fz) = forward_2d_from_yaw(core.yaw);
    let (rx, rz) = (fz, -fx);

    let mut mx = 0.0;
    let mut mz = 0.0;
    if input.forward {
        mx += fx;
        mz += fz;
    }
    if input.back {
        mx -= fx;
        mz -= fz;
    }
    if input.right {
        mx += rx;
        mz += rz;
    }
    if input.left {
        mx -= rx;
        mz -= rz;
    }

    let mag = (mx * mx + mz * mz).sqrt();
    if mag > 0.0 {
        mx /= mag;
        mz /= mag;
    }

    let speed = if input.sprint { SPEED_SPRINT } else { SPEED_WALK };
    core.vel.x = mx * speed;
    core.vel.z = mz * speed;

    if core.on_ground && input.jump {
        core.vel.y = JUMP_SPEED;
        core.on_ground = false;
    }
    input.jump = false;

    core.vel.y -= GRAVITY * dt;
    let vel = core.vel;
    core.pos.add_scaled(vel, dt);

    if core.pos.y < PLAYER_HEIGHT {
        core.pos.y = PLAYER_HEIGHT;
        core.vel.y = 0.0;
        core.on_ground = true;
    }

    clamp_to_playable_ellipse(&mut core.pos);
}

/// Free-fly movement for disabled spectators: full 3D input basis, jump/
/// sprint mapped to up/down, clamped to the wider spectator bounds.
pub fn update_spectator_movement(core: &mut EntityCore, input: &mut InputState, dt: f64) {
    core.yaw = normalize_yaw(if input.yaw.is_finite() {
        input.yaw
    } else {
        core.yaw
    });
    core.pitch = clamp_pitch(if input.pitch.is_finite() {
        input.pitch
    } else {
        core.pitch
    });

    let fwd = forward_3d_from_yaw_pitch(core.yaw, core.pitch);
    let (rx, rz) = (core.yaw.cos(), -core.yaw.sin());

    let mut mx = 0.0;
    let mut my = 0.0;
    let mut mz = 0.0;
    if input.forward {
        mx += fwd.x;
        mz += fwd.z;
    }
    if input.back {
        mx -= fwd.x;
        mz -= fwd.z;
    }
    if input.right {
        mx += rx;
        mz += rz;
    }
    if input.left {
        mx -= rx;
        mz -= rz;
    }
    if input.jump {
        my += 1.0;
    }
    if input.sprint {
        my -= 1.0;
    }

    let mag = (mx * mx + my * my + mz * mz).sqrt();
    if mag > 0.0 {
        mx /= mag;
        my /= mag;
        mz /= mag;
    }

    core.pos.x += mx * SPEED_SPECTATOR * dt;
    core.pos.y += my * SPEED_SPECTATOR * dt;
    core.pos.z += mz * SPEED_SPECTATOR * dt;
    clamp_to_spectator_bounds(&mut core.pos);

    input.jump = false;
}

/// Advance all players: cooldowns, movement for their current state,
/// disable-timer countdown with respawn, and dodgeball ground pickups.
pub fn update_players(state: &mut WorldState, dt: f64) {
    let mut to_respawn: Vec<String> = Vec::new();
    let mut pickup_candidates: Vec<String> = Vec::new();

    for player in &mut state.players {
        player.core.tag_cooldown_sec = (player.core.tag_cooldown_sec - dt).max(0.0);
        player.core.throw_cooldown_sec = (player.core.throw_cooldown_sec - dt).max(0.0);

        if player.core.state == EntityState::DisabledSpectator {
            update_spectator_movement(&mut player.core, &mut player.input, dt);
            player.core.disabled_timer_sec = (player.core.disabled_timer_sec - dt).max(0.0);
            if player.core.disabled_timer_sec <= 0.0 {
                to_respawn.push(player.core.id.clone());
            }
            continue;
        }

        update_active_movement(&mut player.core, &mut player.input, dt);
        pickup_candidates.push(player.core.id.clone());
    }

    for id in to_respawn {
        combat::respawn_entity(state, &id);
    }

    if state.match_config.mode == MatchMode::Dodgeball {
        for id in pickup_candidates {
            dodgeball::try_pickup_ground_ball(state, &id);
        }
    }
}

/// Advance all bots: wander/seek steering, movement, mode actions and the
/// two-pass positional separation. Approximate relaxation, not a solver.
pub fn update_bots(state: &mut WorldState, dt: f64) {
    let (a, b) = playable_ellipse_axes();
    let reference_pos = state.reference_player_pos();
    let mode = state.match_config.mode;

    for i in 0..state.bots.len() {
        {
            let core = &mut state.bots[i].core;
            core.tag_cooldown_sec = (core.tag_cooldown_sec - dt).max(0.0);
            core.throw_cooldown_sec = (core.throw_cooldown_sec - dt).max(0.0);
        }

        if state.bots[i].core.state == EntityState::DisabledSpectator {
            let expired = {
                let core = &mut state.bots[i].core;
                core.disabled_timer_sec = (core.disabled_timer_sec - dt).max(0.0);
                core.disabled_timer_sec <= 0.0
            };
            if expired {
                let id = state.bots[i].core.id.clone();
                combat::respawn_entity(state, &id);
            }
            continue;
        }

        let bot_id = state.bots[i].core.id.clone();
        let bot_pos = state.bots[i].core.pos;
        let bot_has_ball = state.bots[i].core.has_ball;

        let enemy = combat::nearest_enemy(state, &bot_id);
        let ground_target = if mode == MatchMode::Dodgeball && !bot_has_ball {
            dodgeball::find_closest_ground_ball(state, bot_pos, f64::INFINITY)
                .map(|(index, _)| state.balls[index].pos)
        } else {
            None
        };

        // Seek a loose ball first, then the nearest enemy, else wander.
        let new_yaw = if let Some(target) = ground_target {
            (target.x - bot_pos.x).atan2(target.z - bot_pos.z)
        } else if let Some(enemy) = &enemy {
            (enemy.pos.x - bot_pos.x).atan2(enemy.pos.z - bot_pos.z)
        } else {
            let target = state.bots[i].target;
            let dx = target.x - bot_pos.x;
            let dz = target.z - bot_pos.z;
            if dx * dx + dz * dz < BOT_WANDER_REACHED_DIST_SQ {
                state.bots[i].target = sample_point_in_ellipse(
                    a * BOT_WANDER_FACTOR,
                    b * BOT_WANDER_FACTOR,
                    &mut state.rng,
                );
            }
            dx.atan2(dz)
        };

        {
            let core = &mut state.bots[i].core;
            core.yaw = new_yaw;
            let (fx, fz) = forward_2d_from_yaw(core.yaw);
            let speed = SPEED_WALK * BOT_SPEED_MULT;
            core.vel.x = fx * speed;
            core.vel.z = fz * speed;
            core.vel.y -= GRAVITY * dt;
            let vel = core.vel;
            core.pos.add_scaled(vel, dt);
            if core.pos.y < PLAYER_HEIGHT {
                core.pos.y = PLAYER_HEIGHT;
                core.vel.y = 0.0;
                core.on_ground = true;
            }
            clamp_to_playable_ellipse(&mut core.pos);
        }

        match mode {
            MatchMode::Ctf => {
                let Some(enemy) = enemy else { continue };
                if state.bots[i].core.tag_cooldown_sec <= 0.0
                    && combat::can_melee_tag(state, &bot_id, &enemy.id)
                {
                    let jitter = state.rng.gen::<f64>() * 0.25;
                    let team = state.bots[i].core.team;
                    state.bots[i].core.tag_cooldown_sec = TAG_COOLDOWN_SEC + jitter;
                    combat::disable_entity(state, &enemy.id, Some(&bot_id), Some(team), "tag");
                }
            }
            MatchMode::Dodgeball => {
                dodgeball::try_pickup_ground_ball(state, &bot_id);
                let Some(enemy) = enemy else { continue };
                if !state.bots[i].core.has_ball {
                    continue;
                }
                let in_range =
                    dist_sq(state.bots[i].core.pos, enemy.pos) < BOT_THROW_RANGE * BOT_THROW_RANGE;
                if state.bots[i].core.throw_cooldown_sec <= 0.0 && in_range {
                    let jitter = state.rng.gen::<f64>() * 0.25;
                    state.bots[i].core.throw_cooldown_sec = THROW_COOLDOWN_SEC + jitter;
                    state.bots[i].core.pitch = -0.12;
                    dodgeball::throw_ball(state, &bot_id);
                }
            }
        }
    }

    if state.bots.is_empty() {
        return;
    }

    // Pairwise bot-bot separation, applied sequentially so earlier
    // corrections feed into later pairs.
    for i in 0..state.bots.len() {
        if state.bots[i].core.state != EntityState::Active {
            continue;
        }
        for j in (i + 1)..state.bots.len() {
            if state.bots[j].core.state != EntityState::Active {
                continue;
            }
            let dx = state.bots[j].core.pos.x - state.bots[i].core.pos.x;
            let dz = state.bots[j].core.pos.z - state.bots[i].core.pos.z;
            let d2 = dx * dx + dz * dz;
            if d2 >= BOT_SEPARATION_DIST * BOT_SEPARATION_DIST {
                continue;
            }
            let d = {
                let d = d2.sqrt();
                if d > 0.0 {
                    d
                } else {
                    1e-4
                }
            };
            let nx = dx / d;
            let nz = dz / d;
            let push = (BOT_SEPARATION_DIST - d) * 0.5;
            {
                let pos = &mut state.bots[i].core.pos;
                pos.x -= nx * push;
                pos.z -= nz * push;
                clamp_to_playable_ellipse(pos);
            }
            {
                let pos = &mut state.bots[j].core.pos;
                pos.x += nx * push;
                pos.z += nz * push;
                clamp_to_playable_ellipse(pos);
            }
        }
    }

    // Keep a small standoff from the reference player.
    for bot in &mut state.bots {
        if bot.core.state != EntityState::Active {
            continue;
        }
        let dx = bot.core.pos.x - reference_pos.x;
        let dz = bot.core.pos.z - reference_pos.z;
        if dx * dx + dz * dz < BOT_PLAYER_STANDOFF * BOT_PLAYER_STANDOFF {
            let d = {
                let d = (dx * dx + dz * dz).sqrt();
                if d > 0.0 {
                    d
                } else {
                    1e-4
                }
            };
            bot.core.pos.x += (dx / d) * BOT_PLAYER_PUSH;
            bot.core.pos.z += (dz / d) * BOT_PLAYER_PUSH;
            clamp_to_playable_ellipse(&mut bot.core.pos);
        }
    }
}
