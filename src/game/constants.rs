//! Arena dimensions, movement/combat tuning and match-config limits.
//!
//! Everything gameplay-visible lives here so the snapshot layer and the
//! client can agree on the same numbers.

/// Eye height of a standing player; also the ground snap height.
pub const PLAYER_HEIGHT: f64 = 1.7;

/// Arena ellipse half-axis along x.
pub const ARENA_A: f64 = 34.0;
/// Arena ellipse half-axis along z.
pub const ARENA_B: f64 = 24.0;
/// The walkable ring extends this factor beyond the arena floor.
pub const WALK_OUTER_FACTOR: f64 = 1.22;
/// Margin kept between the walkable ellipse edge and entity centers.
pub const PLAYABLE_MARGIN: f64 = 0.8;

pub const GRAVITY: f64 = 22.0;
pub const SPEED_WALK: f64 = 6.4;
pub const SPEED_SPRINT: f64 = 8.2;
pub const SPEED_SPECTATOR: f64 = 11.5;
pub const JUMP_SPEED: f64 = 7.6;

pub const TAG_RANGE: f64 = 2.0;
pub const TAG_COOLDOWN_SEC: f64 = 0.55;
/// Minimum forward-vector dot product for a melee tag (frontal cone).
pub const TAG_FACING_DOT: f64 = 0.12;

pub const THROW_SPEED: f64 = 13.5;
pub const THROW_COOLDOWN_SEC: f64 = 0.9;
/// Projectiles arc under reduced gravity compared to entities.
pub const THROW_GRAVITY: f64 = 18.0;

pub const BALL_RADIUS: f64 = 0.55;
pub const BALL_TTL_SEC: f64 = 4.0;
pub const BALL_PICKUP_RANGE: f64 = 1.35;
/// Resting height of a ground ball.
pub const BALL_GROUND_Y: f64 = 0.58;
/// Total balls kept in play (ground + projectile + carried) in dodgeball.
pub const DODGEBALL_BALL_CAP: usize = 10;
/// Initial ball ring radius as a fraction of the playable ellipse.
pub const DODGEBALL_SPAWN_RADIUS_FACTOR: f64 = 0.56;
/// Refill balls are sampled inside this fraction of the playable ellipse.
pub const DODGEBALL_REFILL_FACTOR: f64 = 0.62;

pub const INVULN_SEC: f64 = 1.0;

pub const BOT_SPEED_MULT: f64 = 0.72;
pub const BOT_RESPAWN_MIN_PLAYER_DIST: f64 = 7.0;
/// Bots wander toward waypoints inside this fraction of the ellipse.
pub const BOT_WANDER_FACTOR: f64 = 0.84;
/// Bots spawn on a ring at this fraction of the ellipse.
pub const BOT_SPAWN_RING_FACTOR: f64 = 0.66;
/// Bots throw at enemies within this range.
pub const BOT_THROW_RANGE: f64 = 21.0;
/// Squared distance at which a bot re-rolls its wander waypoint.
pub const BOT_WANDER_REACHED_DIST_SQ: f64 = 3.5;
/// Minimum separation kept between two bots.
pub const BOT_SEPARATION_DIST: f64 = 1.2;
/// Bots keep this standoff from the reference player.
pub const BOT_PLAYER_STANDOFF: f64 = 1.6;
pub const BOT_PLAYER_PUSH: f64 = 0.2;

pub const FLAG_PICKUP_RANGE: f64 = 1.7;
pub const FLAG_CAPTURE_RANGE: f64 = 2.0;
/// Seconds before a dropped flag returns home on its own.
pub const FLAG_RETURN_SEC: f64 = 12.0;

pub const SPECTATOR_MIN_Y: f64 = 2.5;
pub const SPECTATOR_MAX_Y: f64 = 17.0;
/// Spectators may roam this factor beyond the playable ellipse.
pub const SPECTATOR_OUTER_FACTOR: f64 = 1.28;

/// Identifier of the arena map shipped to clients for scene setup.
pub const MAP_ID: &str = "colosseum_arena_v1";

// Match-config limits. Every host-supplied value is clamped into these
// ranges independently; malformed values fall back to the defaults.
pub const NAME_MIN: usize = 2;
pub const NAME_MAX: usize = 20;
pub const BOT_MIN: u32 = 0;
pub const BOT_MAX: u32 = 35;
pub const DURATION_MIN_SEC: u32 = 120;
pub const DURATION_MAX_SEC: u32 = 480;
pub const DEFAULT_BOT_COUNT: u32 = 0;
pub const DEFAULT_DURATION_SEC: u32 = 240;
pub const CTF_CAPTURES_MIN: u32 = 1;
pub const CTF_CAPTURES_MAX: u32 = 7;
pub const DEFAULT_CTF_CAPTURES: u32 = 3;
pub const DODGEBALL_TARGET_MIN: u32 = 5;
pub const DODGEBALL_TARGET_MAX: u32 = 200;
pub const DEFAULT_DODGEBALL_TARGET: u32 = 50;
pub const DISABLED_MIN_SEC: u32 = 5;
pub const DISABLED_MAX_SEC: u32 = 20;
pub const DEFAULT_DISABLED_SEC: u32 = 10;
