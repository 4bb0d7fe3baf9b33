//! Authoritative world state: the mutable record of one room's match.
//!
//! The world is owned and mutated exclusively by the tick function; the
//! network layer only talks to it through the command surface in
//! `game::r#match` and `game::lobby`. Cross-entity relationships
//! (flag carrier, ball owner, host) are plain id strings resolved through
//! lookups so dangling references degrade to no-ops.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::ws::protocol::{EventRecord, GameEvent};

use super::constants::*;
use super::geom::{sample_point_in_ellipse, vec3, playable_ellipse_axes, Vec3};
use super::snapshot::round_to;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    /// Unknown or missing teams are coerced to red, never rejected.
    pub fn normalize(raw: Option<&str>) -> Team {
        match raw {
            Some("blue") => Team::Blue,
            _ => Team::Red,
        }
    }

    pub fn enemy(self) -> Team {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    Ctf,
    Dodgeball,
}

impl MatchMode {
    /// Unknown or missing modes are coerced to CTF.
    pub fn normalize(raw: Option<&str>) -> MatchMode {
        match raw {
            Some("dodgeball") => MatchMode::Dodgeball,
            _ => MatchMode::Ctf,
        }
    }
}

/// Top-level simulation phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorldMode {
    Lobby,
    Playing,
    Postmatch,
}

/// Presentation-facing room phase. `ReadyCheck` and `Countdown` are modeled
/// but the shipped flow auto-starts matches without gating on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomPhase {
    Lobby,
    ReadyCheck,
    Countdown,
    Playing,
    Postmatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityState {
    Active,
    DisabledSpectator,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamScore {
    pub red: u32,
    pub blue: u32,
}

impl TeamScore {
    pub fn add(&mut self, team: Team, amount: u32) {
        match team {
            Team::Red => self.red += amount,
            Team::Blue => self.blue += amount,
        }
    }

    pub fn get(&self, team: Team) -> u32 {
        match team {
            Team::Red => self.red,
            Team::Blue => self.blue,
        }
    }
}

/// Sanitized match configuration. Produced only by `sanitize_match_config`
/// so every stored instance is already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchConfig {
    pub mode: MatchMode,
    pub bot_count: u32,
    pub duration_sec: u32,
    pub ctf_captures_to_win: u32,
    pub dodgeball_score_target: u32,
    pub disabled_sec: u32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            mode: MatchMode::Ctf,
            bot_count: DEFAULT_BOT_COUNT,
            duration_sec: DEFAULT_DURATION_SEC,
            ctf_captures_to_win: DEFAULT_CTF_CAPTURES,
            dodgeball_score_target: DEFAULT_DODGEBALL_TARGET,
            disabled_sec: DEFAULT_DISABLED_SEC,
        }
    }
}

/// Untrusted match-config overrides as they arrive off the wire. All fields
/// optional; numbers may be arbitrary floats.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMatchConfig {
    pub mode: Option<String>,
    pub bot_count: Option<f64>,
    pub duration_sec: Option<f64>,
    pub ctf_captures_to_win: Option<f64>,
    pub dodgeball_score_target: Option<f64>,
    pub disabled_sec: Option<f64>,
}

/// Clamp a raw numeric field into `[min, max]`, falling back when the value
/// is missing or not finite.
pub fn clamp_config_int(raw: Option<f64>, min: u32, max: u32, fallback: u32) -> u32 {
    match raw {
        Some(v) if v.is_finite() => (v.trunc() as i64).clamp(min as i64, max as i64) as u32,
        _ => fallback,
    }
}

/// Sanitize every field independently. Idempotent: sanitizing an already
/// sanitized config is the identity.
pub fn sanitize_match_config(raw: &RawMatchConfig) -> MatchConfig {
    MatchConfig {
        mode: MatchMode::normalize(raw.mode.as_deref()),
        bot_count: clamp_config_int(raw.bot_count, BOT_MIN, BOT_MAX, DEFAULT_BOT_COUNT),
        duration_sec: clamp_config_int(
            raw.duration_sec,
            DURATION_MIN_SEC,
            DURATION_MAX_SEC,
            DEFAULT_DURATION_SEC,
        ),
        ctf_captures_to_win: clamp_config_int(
            raw.ctf_captures_to_win,
            CTF_CAPTURES_MIN,
            CTF_CAPTURES_MAX,
            DEFAULT_CTF_CAPTURES,
        ),
        dodgeball_score_target: clamp_config_int(
            raw.dodgeball_score_target,
            DODGEBALL_TARGET_MIN,
            DODGEBALL_TARGET_MAX,
            DEFAULT_DODGEBALL_TARGET,
        ),
        disabled_sec: clamp_config_int(
            raw.disabled_sec,
            DISABLED_MIN_SEC,
            DISABLED_MAX_SEC,
            DEFAULT_DISABLED_SEC,
        ),
    }
}

impl MatchConfig {
    /// Wire form of this config, for re-sanitation round trips.
    pub fn to_raw(&self) -> RawMatchConfig {
        RawMatchConfig {
            mode: Some(
                match self.mode {
                    MatchMode::Ctf => "ctf",
                    MatchMode::Dodgeball => "dodgeball",
                }
                .to_string(),
            ),
            bot_count: Some(self.bot_count as f64),
            duration_sec: Some(self.duration_sec as f64),
            ctf_captures_to_win: Some(self.ctf_captures_to_win as f64),
            dodgeball_score_target: Some(self.dodgeball_score_target as f64),
            disabled_sec: Some(self.disabled_sec as f64),
        }
    }
}

/// Strip a display name down to letters, numbers, spaces, `_` and `-`,
/// collapse runs of whitespace and clamp the length.
pub fn sanitize_player_name(raw: &str) -> String {
    let filtered: String = raw
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '_' | '-'))
        .collect();
    let collapsed = filtered.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(NAME_MAX).collect()
}

/// Latest coalesced input for a player, consumed at the next tick boundary.
/// One-shot flags (`jump`, `action`) OR-combine across frames and are
/// cleared by the consumer; continuous fields are last-write-wins.
#[derive(Debug, Clone, Default)]
pub struct InputState {
    pub seq: u32,
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub sprint: bool,
    pub jump: bool,
    pub action: bool,
    pub yaw: f64,
    pub pitch: f64,
}

/// Movement/combat fields shared by players and bots.
#[derive(Debug, Clone)]
pub struct EntityCore {
    pub id: String,
    pub team: Team,
    pub pos: Vec3,
    pub vel: Vec3,
    pub yaw: f64,
    pub pitch: f64,
    pub on_ground: bool,
    pub state: EntityState,
    pub disabled_timer_sec: f64,
    /// Absolute sim time before which this entity cannot be disabled.
    pub invuln_until_sec: f64,
    pub tag_cooldown_sec: f64,
    pub throw_cooldown_sec: f64,
    pub has_ball: bool,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub core: EntityCore,
    pub name: String,
    pub ready: bool,
    pub input: InputState,
    pub last_input_dt_ms: f64,
    pub ping_ms: Option<f64>,
}

impl Player {
    pub fn new(id: String, name: String, team: Team) -> Self {
        let spawn = player_spawn_for_team(team, 0);
        Self {
            core: EntityCore {
                id,
                team,
                pos: spawn.pos,
                vel: Vec3::ZERO,
                yaw: spawn.yaw,
                pitch: spawn.pitch,
                on_ground: true,
                state: EntityState::Active,
                disabled_timer_sec: 0.0,
                invuln_until_sec: 0.0,
                tag_cooldown_sec: 0.0,
                throw_cooldown_sec: 0.0,
                has_ball: false,
            },
            name,
            ready: false,
            input: InputState {
                yaw: spawn.yaw,
                pitch: spawn.pitch,
                ..InputState::default()
            },
            last_input_dt_ms: 50.0,
            ping_ms: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Bot {
    pub core: EntityCore,
    /// Wander waypoint, re-rolled when reached.
    pub target: Vec3,
}

impl Bot {
    /// Bots spawn evenly spaced on a ring, alternating teams, with staggered
    /// cooldowns so they do not all act on the same tick.
    pub fn new(index: usize, bot_count: u32, rng: &mut impl Rng) -> Self {
        let (a, b) = playable_ellipse_axes();
        let n = bot_count.max(1) as f64;
        let angle = (index as f64 / n) * std::f64::consts::TAU;
        let pos = vec3(
            a * BOT_SPAWN_RING_FACTOR * angle.cos(),
            PLAYER_HEIGHT,
            b * BOT_SPAWN_RING_FACTOR * angle.sin(),
        );
        Self {
            core: EntityCore {
                id: format!("bot-{}", index),
                team: if index % 2 == 0 { Team::Red } else { Team::Blue },
                pos,
                vel: Vec3::ZERO,
                yaw: angle + std::f64::consts::PI,
                pitch: -0.25,
                on_ground: true,
                state: EntityState::Active,
                disabled_timer_sec: 0.0,
                invuln_until_sec: 0.0,
                tag_cooldown_sec: (index % 6) as f64 * 0.08,
                throw_cooldown_sec: (index % 5) as f64 * 0.11,
                has_ball: false,
            },
            target: sample_point_in_ellipse(a * BOT_WANDER_FACTOR, b * BOT_WANDER_FACTOR, rng),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BallKind {
    Ground,
    Projectile,
}

#[derive(Debug, Clone)]
pub struct Ball {
    pub id: String,
    pub kind: BallKind,
    pub owner_id: Option<String>,
    pub team: Option<Team>,
    pub pos: Vec3,
    pub vel: Vec3,
    pub ttl_sec: f64,
}

#[derive(Debug, Clone)]
pub struct Flag {
    pub team: Team,
    pub home_pos: Vec3,
    pub pos: Vec3,
    pub carrier_id: Option<String>,
    pub is_at_base: bool,
    pub return_timer_sec: f64,
}

impl Flag {
    fn new(team: Team) -> Self {
        let home = match team {
            Team::Red => vec3(0.0, PLAYER_HEIGHT, -20.0),
            Team::Blue => vec3(0.0, PLAYER_HEIGHT, 20.0),
        };
        Self {
            team,
            home_pos: home,
            pos: home,
            carrier_id: None,
            is_at_base: true,
            return_timer_sec: 0.0,
        }
    }

    pub fn reset_to_home(&mut self) {
        self.carrier_id = None;
        self.is_at_base = true;
        self.return_timer_sec = 0.0;
        self.pos = self.home_pos;
    }
}

#[derive(Debug, Clone)]
pub struct CtfState {
    pub captures: TeamScore,
    pub red_flag: Flag,
    pub blue_flag: Flag,
}

impl CtfState {
    pub fn new() -> Self {
        Self {
            captures: TeamScore::default(),
            red_flag: Flag::new(Team::Red),
            blue_flag: Flag::new(Team::Blue),
        }
    }

    pub fn flag(&self, team: Team) -> &Flag {
        match team {
            Team::Red => &self.red_flag,
            Team::Blue => &self.blue_flag,
        }
    }

    pub fn flag_mut(&mut self, team: Team) -> &mut Flag {
        match team {
            Team::Red => &mut self.red_flag,
            Team::Blue => &mut self.blue_flag,
        }
    }

    pub fn flags_mut(&mut self) -> [&mut Flag; 2] {
        [&mut self.red_flag, &mut self.blue_flag]
    }
}

impl Default for CtfState {
    fn default() -> Self {
        Self::new()
    }
}

/// Room-flow bookkeeping. Countdown fields are presentation state only; the
/// shipped flow never enters the countdown phase.
#[derive(Debug, Clone)]
pub struct RoomFlow {
    pub phase: RoomPhase,
    pub countdown_left_sec: f64,
    pub countdown_duration_sec: f64,
    pub min_ready_players: usize,
}

impl Default for RoomFlow {
    fn default() -> Self {
        Self {
            phase: RoomPhase::Lobby,
            countdown_left_sec: 0.0,
            countdown_duration_sec: 5.0,
            min_ready_players: 2,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SpawnPoint {
    pub pos: Vec3,
    pub yaw: f64,
    pub pitch: f64,
}

/// Team spawn lane. Lanes cycle every six players along x; blue faces -z
/// from the far side, red faces +z.
pub fn player_spawn_for_team(team: Team, index: usize) -> SpawnPoint {
    let lane_offset = (index % 6) as f64 * 2.0 - 5.0;
    match team {
        Team::Blue => SpawnPoint {
            pos: vec3(lane_offset, PLAYER_HEIGHT, 18.0),
            yaw: std::f64::consts::PI,
            pitch: -0.4,
        },
        Team::Red => SpawnPoint {
            pos: vec3(lane_offset, PLAYER_HEIGHT, -18.0),
            yaw: 0.0,
            pitch: -0.4,
        },
    }
}

pub fn spectator_rest_pos_for_team(team: Team) -> Vec3 {
    match team {
        Team::Blue => vec3(-22.0, 7.0, 22.0),
        Team::Red => vec3(22.0, 7.0, -22.0),
    }
}

/// Sample a bot spawn away from the reference player. Rejection-samples up
/// to 20 candidates and falls back to the farthest one seen.
pub fn sample_bot_spawn(player_pos: Vec3, rng: &mut impl Rng) -> Vec3 {
    let (a, b) = playable_ellipse_axes();
    let min_dist_sq = BOT_RESPAWN_MIN_PLAYER_DIST * BOT_RESPAWN_MIN_PLAYER_DIST;
    let mut best = sample_point_in_ellipse(a * 0.75, b * 0.75, rng);
    let mut best_dist_sq = -1.0;

    for _ in 0..20 {
        let candidate = sample_point_in_ellipse(a * 0.75, b * 0.75, rng);
        let dx = candidate.x - player_pos.x;
        let dz = candidate.z - player_pos.z;
        let d = dx * dx + dz * dz;
        if d >= min_dist_sq {
            return vec3(candidate.x, PLAYER_HEIGHT, candidate.z);
        }
        if d > best_dist_sq {
            best = candidate;
            best_dist_sq = d;
        }
    }

    vec3(best.x, PLAYER_HEIGHT, best.z)
}

/// One room's authoritative world.
pub struct WorldState {
    pub mode: WorldMode,
    pub host_player_id: Option<String>,
    pub server_tick: u64,
    pub now_sec: f64,
    pub time_left_sec: f64,
    pub score: TeamScore,
    pub match_config: MatchConfig,
    /// Insertion order is join order; spawn lanes, host reassignment and the
    /// bot reference player all depend on it.
    pub players: Vec<Player>,
    pub bots: Vec<Bot>,
    pub balls: Vec<Ball>,
    pub ball_counter: u64,
    pub ctf: Option<CtfState>,
    pub room: RoomFlow,
    pub last_match_summary: String,
    pub pending_events: Vec<EventRecord>,
    pub rng: ChaCha8Rng,
}

impl WorldState {
    pub fn new(seed: u64) -> Self {
        Self {
            mode: WorldMode::Lobby,
            host_player_id: None,
            server_tick: 0,
            now_sec: 0.0,
            time_left_sec: DEFAULT_DURATION_SEC as f64,
            score: TeamScore::default(),
            match_config: MatchConfig::default(),
            players: Vec::new(),
            bots: Vec::new(),
            balls: Vec::new(),
            ball_counter: 0,
            ctf: Some(CtfState::new()),
            room: RoomFlow::default(),
            last_match_summary: String::new(),
            pending_events: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.core.id == id)
    }

    pub fn player_mut(&mut self, id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.core.id == id)
    }

    pub fn is_player(&self, id: &str) -> bool {
        self.players.iter().any(|p| p.core.id == id)
    }

    /// Resolve an id to a player or bot core. Dangling ids resolve to None.
    pub fn entity(&self, id: &str) -> Option<&EntityCore> {
        self.players
            .iter()
            .map(|p| &p.core)
            .chain(self.bots.iter().map(|b| &b.core))
            .find(|c| c.id == id)
    }

    pub fn entity_mut(&mut self, id: &str) -> Option<&mut EntityCore> {
        if let Some(i) = self.players.iter().position(|p| p.core.id == id) {
            return Some(&mut self.players[i].core);
        }
        self.bots
            .iter_mut()
            .map(|b| &mut b.core)
            .find(|c| c.id == id)
    }

    pub fn entity_cores(&self) -> impl Iterator<Item = &EntityCore> {
        self.players
            .iter()
            .map(|p| &p.core)
            .chain(self.bots.iter().map(|b| &b.core))
    }

    pub fn ready_player_count(&self) -> usize {
        self.players.iter().filter(|p| p.ready).count()
    }

    /// Join-order index of a player within their team; used for spawn lanes.
    pub fn team_spawn_index(&self, player_id: &str, team: Team) -> usize {
        let mut index = 0;
        for player in &self.players {
            if player.core.team != team {
                continue;
            }
            if player.core.id == player_id {
                return index;
            }
            index += 1;
        }
        index
    }

    /// Position of the first-joined player, used as the bot AI reference.
    pub fn reference_player_pos(&self) -> Vec3 {
        self.players
            .first()
            .map(|p| p.core.pos)
            .unwrap_or_else(|| vec3(0.0, PLAYER_HEIGHT, 0.0))
    }

    pub fn next_ball_id(&mut self) -> String {
        let id = format!("ball-{}", self.ball_counter);
        self.ball_counter += 1;
        id
    }

    pub fn count_carried_balls(&self) -> usize {
        self.entity_cores().filter(|c| c.has_ball).count()
    }

    pub fn count_ground_balls(&self) -> usize {
        self.balls
            .iter()
            .filter(|b| b.kind == BallKind::Ground)
            .count()
    }

    pub fn count_projectile_balls(&self) -> usize {
        self.balls
            .iter()
            .filter(|b| b.kind == BallKind::Projectile)
            .count()
    }

    /// Total balls in play: ground + projectile + carried.
    pub fn count_balls_in_play(&self) -> usize {
        self.balls.len() + self.count_carried_balls()
    }

    pub fn push_event(&mut self, event: GameEvent) {
        self.pending_events.push(EventRecord {
            at_sec: round_to(self.now_sec, 3),
            event,
        });
    }

    /// Drain the queued events. Called once per tick by the publisher;
    /// delivery is at-most-once with no replay.
    pub fn consume_events(&mut self) -> Vec<EventRecord> {
        std::mem::take(&mut self.pending_events)
    }

    /// Reset a player to their team-lane spawn for match start or respawn.
    pub fn reset_player_for_match(&mut self, player_id: &str) {
        let Some(i) = self.players.iter().position(|p| p.core.id == player_id) else {
            return;
        };
        let team = self.players[i].core.team;
        let spawn_index = self.team_spawn_index(player_id, team);
        let spawn = player_spawn_for_team(team, spawn_index);
        let now = self.now_sec;

        let player = &mut self.players[i];
        player.core.pos = spawn.pos;
        player.core.vel = Vec3::ZERO;
        player.core.yaw = spawn.yaw;
        player.core.pitch = spawn.pitch;
        player.core.on_ground = true;
        player.core.state = EntityState::Active;
        player.core.disabled_timer_sec = 0.0;
        player.core.invuln_until_sec = now + INVULN_SEC;
        player.core.tag_cooldown_sec = 0.0;
        player.core.throw_cooldown_sec = 0.0;
        player.core.has_ball = false;
        player.input.action = false;
        player.input.jump = false;
    }

    /// Reset a bot to a fresh spawn far from the reference player.
    pub fn reset_bot_for_match(&mut self, bot_index: usize, reference_pos: Vec3) {
        let spawn = sample_bot_spawn(reference_pos, &mut self.rng);
        let now = self.now_sec;
        let Some(bot) = self.bots.get_mut(bot_index) else {
            return;
        };
        bot.core.pos = spawn;
        bot.core.vel = Vec3::ZERO;
        bot.core.state = EntityState::Active;
        bot.core.disabled_timer_sec = 0.0;
        bot.core.invuln_until_sec = now + INVULN_SEC;
        bot.core.tag_cooldown_sec = 0.0;
        bot.core.throw_cooldown_sec = 0.0;
        bot.core.has_ball = false;
    }
}
