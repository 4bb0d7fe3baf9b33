//! 3D vector helpers and the elliptical arena boundary math.

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::constants::{
    ARENA_A, ARENA_B, PLAYABLE_MARGIN, SPECTATOR_MAX_Y, SPECTATOR_MIN_Y, SPECTATOR_OUTER_FACTOR,
    WALK_OUTER_FACTOR,
};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Add `src * scale` in place (velocity integration).
    pub fn add_scaled(&mut self, src: Vec3, scale: f64) {
        self.x += src.x * scale;
        self.y += src.y * scale;
        self.z += src.z * scale;
    }
}

/// Shorthand constructor.
pub fn vec3(x: f64, y: f64, z: f64) -> Vec3 {
    Vec3::new(x, y, z)
}

/// Squared 3D distance.
pub fn dist_sq(a: Vec3, b: Vec3) -> f64 {
    let dx = a.x - b.x;
    let dy = a.y - b.y;
    let dz = a.z - b.z;
    dx * dx + dy * dy + dz * dz
}

/// Squared distance in the ground plane (x/z only).
pub fn dist_sq_2d(a: Vec3, b: Vec3) -> f64 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    dx * dx + dz * dz
}

/// Half-axes of the playable (walkable) ellipse.
pub fn playable_ellipse_axes() -> (f64, f64) {
    (
        ARENA_A * WALK_OUTER_FACTOR - PLAYABLE_MARGIN,
        ARENA_B * WALK_OUTER_FACTOR - PLAYABLE_MARGIN,
    )
}

/// Ellipse quotient `(x/a)² + (z/b)²`; <= 1 means inside.
pub fn ellipse_quotient(pos: Vec3, a: f64, b: f64) -> f64 {
    (pos.x * pos.x) / (a * a) + (pos.z * pos.z) / (b * b)
}

/// Clamp a position into the playable ellipse by radial rescaling.
/// Never bounces; the y component is untouched.
pub fn clamp_to_playable_ellipse(pos: &mut Vec3) {
    let (a, b) = playable_ellipse_axes();
    let q = ellipse_quotient(*pos, a, b);
    if q <= 1.0 {
        return;
    }
    let s = 1.0 / q.sqrt();
    pos.x *= s;
    pos.z *= s;
}

/// Clamp a spectator position into the larger spectator ellipse and the
/// vertical flight band.
pub fn clamp_to_spectator_bounds(pos: &mut Vec3) {
    let (a, b) = playable_ellipse_axes();
    let outer_a = a * SPECTATOR_OUTER_FACTOR;
    let outer_b = b * SPECTATOR_OUTER_FACTOR;
    let q = ellipse_quotient(*pos, outer_a, outer_b);
    if q > 1.0 {
        let s = 1.0 / q.sqrt();
        pos.x *= s;
        pos.z *= s;
    }
    pos.y = pos.y.clamp(SPECTATOR_MIN_Y, SPECTATOR_MAX_Y);
}

/// Sample a uniformly distributed ground point inside an ellipse.
pub fn sample_point_in_ellipse(a: f64, b: f64, rng: &mut impl Rng) -> Vec3 {
    let t = rng.gen::<f64>() * std::f64::consts::TAU;
    let r = rng.gen::<f64>().sqrt();
    vec3(a * r * t.cos(), 0.0, b * r * t.sin())
}

/// Clamp pitch just short of straight up/down to avoid gimbal lock.
pub fn clamp_pitch(pitch: f64) -> f64 {
    let limit = std::f64::consts::FRAC_PI_2 - 0.01;
    pitch.clamp(-limit, limit)
}

/// Wrap yaw into (-π, π].
pub fn normalize_yaw(yaw: f64) -> f64 {
    let mut value = yaw;
    while value > std::f64::consts::PI {
        value -= std::f64::consts::TAU;
    }
    while value < -std::f64::consts::PI {
        value += std::f64::consts::TAU;
    }
    value
}

/// Ground-plane forward vector for a yaw angle. Yaw 0 faces +z.
pub fn forward_2d_from_yaw(yaw: f64) -> (f64, f64) {
    (yaw.sin(), yaw.cos())
}

/// Full 3D forward vector for a yaw/pitch pair.
pub fn forward_3d_from_yaw_pitch(yaw: f64, pitch: f64) -> Vec3 {
    let cp = pitch.cos();
    vec3(yaw.sin() * cp, pitch.sin(), yaw.cos() * cp)
}
