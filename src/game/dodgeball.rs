//! Dodgeball engine: ball population invariant, throws, pickups, passes
//! and hits.

use crate::ws::protocol::GameEvent;

use super::constants::{
    BALL_GROUND_Y, BALL_PICKUP_RANGE, BALL_RADIUS, BALL_TTL_SEC, DODGEBALL_BALL_CAP,
    DODGEBALL_REFILL_FACTOR, DODGEBALL_SPAWN_RADIUS_FACTOR, THROW_GRAVITY, THROW_SPEED,
};
use super::geom::{
    clamp_to_playable_ellipse, dist_sq, dist_sq_2d, ellipse_quotient, forward_3d_from_yaw_pitch,
    playable_ellipse_axes, sample_point_in_ellipse, vec3, Vec3,
};
use super::snapshot::round_to;
use super::world::{Ball, BallKind, EntityState, MatchMode, WorldMode, WorldState};
use super::combat;

/// Spawn a resting ball at the given ground position, clamped into the
/// playable ellipse.
pub fn spawn_ground_ball_at(state: &mut WorldState, x: f64, z: f64) {
    let id = state.next_ball_id();
    let mut pos = vec3(x, BALL_GROUND_Y, z);
    clamp_to_playable_ellipse(&mut pos);
    pos.y = BALL_GROUND_Y;
    state.balls.push(Ball {
        id,
        kind: BallKind::Ground,
        owner_id: None,
        team: None,
        pos,
        vel: Vec3::ZERO,
        ttl_sec: 0.0,
    });
}

/// Convert a ball in place into a ground ball resting at (x, z).
pub fn to_ground_ball(ball: &mut Ball, x: f64, z: f64) {
    ball.kind = BallKind::Ground;
    ball.owner_id = None;
    ball.team = None;
    ball.pos = vec3(x, BALL_GROUND_Y, z);
    ball.vel = Vec3::ZERO;
    ball.ttl_sec = 0.0;
    clamp_to_playable_ellipse(&mut ball.pos);
    ball.pos.y = BALL_GROUND_Y;
}

/// Lay out the initial ring of ground balls at match start.
pub fn spawn_initial_balls(state: &mut WorldState) {
    state.balls.clear();
    let (a, b) = playable_ellipse_axes();
    let r = DODGEBALL_SPAWN_RADIUS_FACTOR;
    for i in 0..DODGEBALL_BALL_CAP {
        let angle = (i as f64 / DODGEBALL_BALL_CAP as f64) * std::f64::consts::TAU;
        spawn_ground_ball_at(state, a * r * angle.cos(), b * r * angle.sin());
    }
}

/// Top up balls in play (ground + projectile + carried) to the cap. Only
/// active while a dodgeball match is playing.
pub fn ensure_ball_invariant(state: &mut WorldState) {
    if state.match_config.mode != MatchMode::Dodgeball || state.mode != WorldMode::Playing {
        return;
    }
    while state.count_balls_in_play() < DODGEBALL_BALL_CAP {
        let (a, b) = playable_ellipse_axes();
        let p = sample_point_in_ellipse(
            a * DODGEBALL_REFILL_FACTOR,
            b * DODGEBALL_REFILL_FACTOR,
            &mut state.rng,
        );
        spawn_ground_ball_at(state, p.x, p.z);
    }
}

/// Index and squared distance of the closest ground ball within
/// `max_dist_sq` of `pos`.
pub fn find_closest_ground_ball(
    state: &WorldState,
    pos: Vec3,
    max_dist_sq: f64,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    let mut best_dist_sq = max_dist_sq;
    for (index, ball) in state.balls.iter().enumerate() {
        if ball.kind != BallKind::Ground {
            continue;
        }
        let d = dist_sq_2d(pos, ball.pos);
        if d >= best_dist_sq {
            continue;
        }
        best = Some((index, d));
        best_dist_sq = d;
    }
    best
}

/// Pick up the closest ground ball in range. The ball leaves the world and
/// becomes carried state on the entity, so a ball is never in two places.
pub fn try_pickup_ground_ball(state: &mut WorldState, entity_id: &str) -> bool {
    if state.match_config.mode != MatchMode::Dodgeball {
        return false;
    }
    let Some(entity) = state.entity(entity_id) else {
        return false;
    };
    if entity.state != EntityState::Active || entity.has_ball {
        return false;
    }
    let pos = entity.pos;
    let team = entity.team;

    let max_dist_sq = BALL_PICKUP_RANGE * BALL_PICKUP_RANGE;
    let Some((index, _)) = find_closest_ground_ball(state, pos, max_dist_sq) else {
        return false;
    };

    let picked = state.balls.remove(index);
    if let Some(entity) = state.entity_mut(entity_id) {
        entity.has_ball = true;
    }
    state.push_event(GameEvent::BallPickup {
        by_id: entity_id.to_string(),
        by_team: team,
        ball_id: picked.id,
    });
    true
}

/// Throw the carried ball along the owner's view direction with a
/// reduced-gravity arc. Returns false when nothing is carried.
pub fn throw_ball(state: &mut WorldState, owner_id: &str) -> bool {
    let Some(owner) = state.entity(owner_id) else {
        return false;
    };
    if !owner.has_ball {
        return false;
    }
    let yaw = owner.yaw;
    let pitch = owner.pitch;
    let origin = owner.pos;
    let team = owner.team;

    let dir = forward_3d_from_yaw_pitch(yaw, pitch);
    let id = state.next_ball_id();
    let ball = Ball {
        id: id.clone(),
        kind: BallKind::Projectile,
        owner_id: Some(owner_id.to_string()),
        team: Some(team),
        pos: vec3(
            origin.x + dir.x * 1.1,
            origin.y + 1.0,
            origin.z + dir.z * 1.1,
        ),
        vel: vec3(
            dir.x * THROW_SPEED,
            dir.y * THROW_SPEED * 0.55 + 1.3,
            dir.z * THROW_SPEED,
        ),
        ttl_sec: BALL_TTL_SEC,
    };

    if let Some(owner) = state.entity_mut(owner_id) {
        owner.has_ball = false;
    }
    let (x, z) = (ball.pos.x, ball.pos.z);
    state.balls.push(ball);
    state.push_event(GameEvent::BallThrow {
        ball_id: id,
        owner_id: owner_id.to_string(),
        owner_team: team,
        x: round_to(x, 2),
        z: round_to(z, 2),
    });
    true
}

/// One ball tick: integrate projectiles, convert out-of-bounds or expired
/// ones to ground balls, deliver passes to teammates and resolve enemy
/// hits. Outside dodgeball mode all balls and carry flags are cleared.
pub fn update_balls(state: &mut WorldState, dt: f64) {
    if state.match_config.mode != MatchMode::Dodgeball {
        state.balls.clear();
        for player in &mut state.players {
            player.core.has_ball = false;
        }
        for bot in &mut state.bots {
            bot.core.has_ball = false;
        }
        return;
    }

    let mut i = state.balls.len();
    while i > 0 {
        i -= 1;
        if state.balls[i].kind != BallKind::Projectile {
            continue;
        }

        {
            let ball = &mut state.balls[i];
            ball.ttl_sec -= dt;
            ball.vel.y -= THROW_GRAVITY * dt;
            let vel = ball.vel;
            ball.pos.add_scaled(vel, dt);
        }

        let (ball_id, ball_pos, ball_team, ball_owner, ttl) = {
            let ball = &state.balls[i];
            (
                ball.id.clone(),
                ball.pos,
                ball.team,
                ball.owner_id.clone(),
                ball.ttl_sec,
            )
        };

        let (a, b) = playable_ellipse_axes();
        let out_of_bounds =
            ttl <= 0.0 || ball_pos.y < 0.35 || ellipse_quotient(ball_pos, a, b) > 1.2;
        if out_of_bounds {
            let ball = &mut state.balls[i];
            let (x, z) = (ball.pos.x, ball.pos.z);
            to_ground_ball(ball, x, z);
            state.push_event(GameEvent::BallDrop {
                ball_id: Some(ball_id),
                by_id: None,
                reason: "out".to_string(),
            });
            continue;
        }

        let hit_radius_sq = (BALL_RADIUS + 0.75) * (BALL_RADIUS + 0.75);
        let hit = state
            .entity_cores()
            .find(|core| {
                Some(core.id.as_str()) != ball_owner.as_deref()
                    && core.state == EntityState::Active
                    && dist_sq(core.pos, ball_pos) <= hit_radius_sq
            })
            .map(|core| (core.id.clone(), core.team, core.pos, core.has_ball));
        let Some((target_id, target_team, target_pos, target_has_ball)) = hit else {
            continue;
        };

        if Some(target_team) == ball_team {
            if !target_has_ball {
                // Clean pass: the teammate takes over the carry.
                if let Some(entity) = state.entity_mut(&target_id) {
                    entity.has_ball = true;
                }
                state.push_event(GameEvent::BallPass {
                    ball_id,
                    source_id: ball_owner,
                    source_team: ball_team,
                    target_id,
                    target_team,
                    dropped: false,
                });
                state.balls.remove(i);
            } else {
                // Teammate already carries one; drop at their feet instead
                // of double-carrying.
                let ball = &mut state.balls[i];
                to_ground_ball(ball, target_pos.x, target_pos.z);
                state.push_event(GameEvent::BallPass {
                    ball_id,
                    source_id: ball_owner,
                    source_team: ball_team,
                    target_id,
                    target_team,
                    dropped: true,
                });
            }
            continue;
        }

        let disabled = combat::disable_entity(
            state,
            &target_id,
            ball_owner.as_deref(),
            ball_team,
            "ball_hit",
        );
        let score = state.score;
        state.push_event(GameEvent::BallHit {
            ball_id: ball_id.clone(),
            source_id: ball_owner,
            source_team: ball_team,
            target_id,
            disabled,
            score,
        });
        {
            let ball = &mut state.balls[i];
            to_ground_ball(ball, target_pos.x, target_pos.z);
        }
        state.push_event(GameEvent::BallDrop {
            ball_id: Some(ball_id),
            by_id: None,
            reason: "hit".to_string(),
        });
    }

    ensure_ball_invariant(state);
}
