//! WebSocket protocol message definitions.
//! These are the wire types for client-server communication; field names are
//! camelCase to match the JavaScript client.

use serde::{Deserialize, Serialize};

use crate::game::constants::{
    BOT_MAX, BOT_MIN, DURATION_MAX_SEC, DURATION_MIN_SEC, NAME_MAX, NAME_MIN,
};
use crate::game::world::{
    BallKind, EntityState, MatchConfig, MatchMode, RawMatchConfig, RoomPhase, Team, TeamScore,
    WorldMode,
};

pub const PROTOCOL_VERSION: u32 = 2;

/// Messages sent from client to server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ClientMsg {
    /// First message on a fresh connection: join (or resume) a room.
    #[serde(rename = "c_hello")]
    Hello {
        #[serde(default)]
        name: String,
        /// "red" | "blue"; anything else is coerced to red.
        team: Option<String>,
        /// Host-only match config overrides, clamped server-side.
        match_config: Option<RawMatchConfig>,
        /// Session token from a previous welcome, for reconnects.
        resume_token: Option<String>,
    },

    /// Latest input frame; coalesced into the player's pending input.
    #[serde(rename = "c_input")]
    Input(InputFrame),

    /// Ready toggle for the lobby.
    #[serde(rename = "c_room_ready")]
    Ready {
        #[serde(default)]
        ready: bool,
    },

    /// Ping for latency measurement.
    #[serde(rename = "c_ping")]
    Ping {
        #[serde(default)]
        sent_at_ms: f64,
    },

    /// Leave the room immediately instead of waiting for idle expiry.
    #[serde(rename = "c_leave")]
    Leave,
}

/// One input frame as sent by the client every render frame.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputFrame {
    pub seq: u32,
    pub dt_ms: Option<f64>,
    pub input: InputButtons,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputButtons {
    pub forward: bool,
    pub back: bool,
    pub left: bool,
    pub right: bool,
    pub sprint: bool,
    pub jump: bool,
    pub action: bool,
    /// Legacy aliases for `action` still sent by older clients.
    pub tag: bool,
    #[serde(rename = "throw")]
    pub throw_ball: bool,
    pub yaw: Option<f64>,
    pub pitch: Option<f64>,
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ServerMsg {
    #[serde(rename = "s_welcome")]
    Welcome(WelcomePayload),

    /// Lightweight lobby view, published every tick alongside the snapshot.
    #[serde(rename = "s_room_state")]
    RoomState(RoomStateView),

    /// Full authoritative state snapshot.
    #[serde(rename = "s_snapshot")]
    Snapshot(Snapshot),

    /// One discrete game event. Events are delivered at most once.
    #[serde(rename = "s_event")]
    Event(EventRecord),

    #[serde(rename = "s_pong")]
    Pong {
        sent_at_ms: f64,
        server_now_ms: u64,
        rtt_ms: f64,
    },

    #[serde(rename = "s_error")]
    Error { code: String, message: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WelcomePayload {
    pub player_id: String,
    pub resume_token: String,
    pub tick_rate: u32,
    pub protocol_version: u32,
    pub match_config: MatchConfig,
    pub limits: ConfigLimits,
    pub assigned_session: AssignedSession,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignedSession {
    pub player_name: String,
    pub team: Team,
}

/// The clamping ranges applied to names and match config, so clients can
/// validate before sending.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigLimits {
    pub name_min: usize,
    pub name_max: usize,
    pub bot_min: u32,
    pub bot_max: u32,
    pub duration_min: u32,
    pub duration_max: u32,
}

impl Default for ConfigLimits {
    fn default() -> Self {
        Self {
            name_min: NAME_MIN,
            name_max: NAME_MAX,
            bot_min: BOT_MIN,
            bot_max: BOT_MAX,
            duration_min: DURATION_MIN_SEC,
            duration_max: DURATION_MAX_SEC,
        }
    }
}

/// A queued game event plus the sim time it happened at.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    #[serde(flatten)]
    pub event: GameEvent,
    pub at_sec: f64,
}

/// Discrete game events, drained once per tick and published in order.
#[derive(Debug, Clone, Serialize)]
#[serde(
    tag = "event",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum GameEvent {
    Join {
        player_id: String,
        player_name: String,
        team: Team,
        reconnect: bool,
    },
    Leave {
        player_id: String,
        player_name: String,
        team: Team,
    },
    MatchStart {
        match_config: MatchConfig,
    },
    MatchEnd {
        reason: String,
        mode: MatchMode,
        score: TeamScore,
        summary: String,
    },
    PlayerDisabledSpectator {
        target_id: String,
        target_team: Team,
        source_id: Option<String>,
        source_team: Option<Team>,
        reason: String,
        disabled_sec: u32,
        score: TeamScore,
    },
    PlayerReenabled {
        player_id: String,
    },
    TagContact {
        source_id: String,
        source_team: Team,
        target_id: String,
    },
    FlagPickup {
        flag_team: Team,
        carrier_id: String,
        carrier_team: Team,
    },
    FlagCapture {
        by_team: Team,
        carrier_id: String,
        captures: TeamScore,
        score: TeamScore,
    },
    FlagDrop {
        flag_team: Team,
        carrier_id: String,
        x: f64,
        z: f64,
    },
    FlagReturn {
        flag_team: Team,
    },
    BallThrow {
        ball_id: String,
        owner_id: String,
        owner_team: Team,
        x: f64,
        z: f64,
    },
    BallPickup {
        by_id: String,
        by_team: Team,
        ball_id: String,
    },
    BallPass {
        ball_id: String,
        source_id: Option<String>,
        source_team: Option<Team>,
        target_id: String,
        target_team: Team,
        dropped: bool,
    },
    BallHit {
        ball_id: String,
        source_id: Option<String>,
        source_team: Option<Team>,
        target_id: String,
        disabled: bool,
        score: TeamScore,
    },
    BallDrop {
        #[serde(skip_serializing_if = "Option::is_none")]
        ball_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        by_id: Option<String>,
        reason: String,
    },
    DryThrow {
        player_id: String,
        team: Team,
    },
    CountdownCancel {
        reason: String,
        player_id: String,
    },
}

/// Lobby view exposed without a full snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomStateView {
    pub phase: RoomPhase,
    pub host_player_id: Option<String>,
    pub ready_count: usize,
    pub total_players: usize,
    pub min_ready_players: usize,
    pub countdown_left_sec: f64,
    pub match_config: MatchConfig,
    pub players: Vec<RoomPlayerView>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomPlayerView {
    pub id: String,
    pub name: String,
    pub team: Team,
    pub ready: bool,
    pub is_host: bool,
}

/// Full-state snapshot. Positions are rounded to 3 decimals, timers to 2 and
/// angles to 4 to shrink the wire payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub mode: WorldMode,
    pub room: RoomStateView,
    pub server_tick: u64,
    pub now_sec: f64,
    pub time_left_sec: f64,
    pub score: TeamScore,
    pub match_config: MatchConfig,
    pub world: WorldInfo,
    pub last_match_summary: String,
    pub players: Vec<PlayerView>,
    pub bots: Vec<BotView>,
    pub balls: Vec<BallView>,
    pub objectives: ObjectivesView,
}

/// Static arena facts the client needs for scene setup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldInfo {
    pub map_id: &'static str,
    pub arena_a: f64,
    pub arena_b: f64,
    pub walk_outer_factor: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: String,
    pub name: String,
    pub team: Team,
    pub ready: bool,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
    pub pitch: f64,
    pub state: EntityState,
    pub disabled_timer_sec: f64,
    pub on_ground: bool,
    pub tag_cooldown_sec: f64,
    pub throw_cooldown_sec: f64,
    pub has_ball: bool,
    pub input_seq: u32,
    pub ping_ms: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BotView {
    pub id: String,
    pub team: Team,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub yaw: f64,
    pub state: EntityState,
    pub disabled_timer_sec: f64,
    pub has_ball: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BallView {
    pub id: String,
    pub kind: BallKind,
    pub owner_id: Option<String>,
    pub team: Option<Team>,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectivesView {
    pub ctf: Option<CtfView>,
    pub dodgeball: DodgeballView,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CtfView {
    pub captures: TeamScore,
    pub flags: FlagsView,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagsView {
    pub red: FlagView,
    pub blue: FlagView,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagView {
    pub team: Team,
    pub home_pos: VecView,
    pub pos: VecView,
    pub carrier_id: Option<String>,
    pub is_at_base: bool,
    pub return_timer_sec: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct VecView {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DodgeballView {
    pub score_target: u32,
    pub ball_cap: usize,
    pub carried_balls: usize,
    pub ground_balls: usize,
    pub projectile_balls: usize,
    pub total_balls: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_input_message_parses() {
        let json = r#"{
            "type": "c_input",
            "seq": 42,
            "dtMs": 16.6,
            "input": {"forward": true, "jump": true, "yaw": 1.25, "throw": true}
        }"#;
        let msg: ClientMsg = serde_json::from_str(json).expect("parse c_input");
        match msg {
            ClientMsg::Input(frame) => {
                assert_eq!(frame.seq, 42);
                assert!(frame.input.forward);
                assert!(frame.input.jump);
                assert!(frame.input.throw_ball);
                assert!(!frame.input.back);
                assert_eq!(frame.input.yaw, Some(1.25));
                assert_eq!(frame.input.pitch, None);
            }
            other => panic!("expected input message, got {:?}", other),
        }
    }

    #[test]
    fn hello_message_parses_with_partial_config() {
        let json = r#"{
            "type": "c_hello",
            "name": "Ada",
            "team": "blue",
            "matchConfig": {"mode": "dodgeball", "botCount": 8}
        }"#;
        let msg: ClientMsg = serde_json::from_str(json).expect("parse c_hello");
        match msg {
            ClientMsg::Hello {
                name,
                team,
                match_config,
                resume_token,
            } => {
                assert_eq!(name, "Ada");
                assert_eq!(team.as_deref(), Some("blue"));
                assert_eq!(match_config.unwrap().bot_count, Some(8.0));
                assert!(resume_token.is_none());
            }
            other => panic!("expected hello message, got {:?}", other),
        }
    }

    #[test]
    fn leave_and_ping_parse() {
        let leave: ClientMsg = serde_json::from_str(r#"{"type": "c_leave"}"#).unwrap();
        assert!(matches!(leave, ClientMsg::Leave));

        let ping: ClientMsg =
            serde_json::from_str(r#"{"type": "c_ping", "sentAtMs": 123.0}"#).unwrap();
        match ping {
            ClientMsg::Ping { sent_at_ms } => assert_eq!(sent_at_ms, 123.0),
            other => panic!("expected ping, got {:?}", other),
        }
    }

    #[test]
    fn event_records_serialize_with_fixed_tags() {
        let record = EventRecord {
            at_sec: 1.234,
            event: GameEvent::PlayerDisabledSpectator {
                target_id: "bot-3".to_string(),
                target_team: Team::Blue,
                source_id: Some("player-a".to_string()),
                source_team: Some(Team::Red),
                reason: "tag".to_string(),
                disabled_sec: 10,
                score: TeamScore { red: 1, blue: 0 },
            },
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["event"], "player_disabled_spectator");
        assert_eq!(value["atSec"], 1.234);
        assert_eq!(value["payload"]["targetId"], "bot-3");
        assert_eq!(value["payload"]["sourceTeam"], "red");
        assert_eq!(value["payload"]["disabledSec"], 10);
    }

    #[test]
    fn server_messages_carry_protocol_tags() {
        let pong = ServerMsg::Pong {
            sent_at_ms: 5.0,
            server_now_ms: 10,
            rtt_ms: 5.0,
        };
        let value = serde_json::to_value(&pong).unwrap();
        assert_eq!(value["type"], "s_pong");
        assert_eq!(value["sentAtMs"], 5.0);

        let event = ServerMsg::Event(EventRecord {
            at_sec: 0.0,
            event: GameEvent::FlagReturn {
                flag_team: Team::Red,
            },
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "s_event");
        assert_eq!(value["event"], "flag_return");
    }

    #[test]
    fn ball_drop_event_omits_absent_ids() {
        let record = EventRecord {
            at_sec: 2.0,
            event: GameEvent::BallDrop {
                ball_id: Some("ball-1".to_string()),
                by_id: None,
                reason: "out".to_string(),
            },
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["payload"]["ballId"], "ball-1");
        assert!(value["payload"].get("byId").is_none());
    }
}
