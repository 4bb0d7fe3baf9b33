//! WebSocket upgrade handler and per-connection session loop.
//!
//! A connection must open with `c_hello`; after a successful join the
//! reader forwards commands to the room task and the writer fans the
//! room's broadcasts (plus targeted replies) back to the socket. A dropped
//! connection leaves the player in the room until the idle sweeper runs,
//! so a resume token can reconnect under the same id.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::world::RawMatchConfig;
use crate::http::middleware::{sign_session_token, verify_session_token};
use crate::rooms::{normalize_room_id, RoomCommand, RoomHandle};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{
    AssignedSession, ClientMsg, ConfigLimits, ServerMsg, WelcomePayload, PROTOCOL_VERSION,
};

/// How long a fresh connection may take to send its hello.
const HELLO_TIMEOUT: Duration = Duration::from_secs(10);

/// Query parameters for WebSocket connections
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Target room id; empty means the default room.
    pub room: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let room_id = normalize_room_id(query.room.as_deref().unwrap_or(""));
    ws.on_upgrade(move |socket| handle_socket(socket, room_id, state))
}

struct HelloPayload {
    name: String,
    team: Option<String>,
    match_config: Option<RawMatchConfig>,
    resume_token: Option<String>,
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, room_id: String, state: AppState) {
    info!(room_id = %room_id, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();

    let hello = match tokio::time::timeout(HELLO_TIMEOUT, wait_for_hello(&mut ws_stream)).await {
        Ok(Some(hello)) => hello,
        Ok(None) => {
            debug!(room_id = %room_id, "Connection closed before hello");
            return;
        }
        Err(_) => {
            warn!(room_id = %room_id, "Timed out waiting for hello");
            let _ = send_msg(
                &mut ws_sink,
                &ServerMsg::Error {
                    code: "hello_timeout".to_string(),
                    message: "No hello received".to_string(),
                },
            )
            .await;
            return;
        }
    };

    // A valid resume token for this room revives the same player id.
    let player_id = hello
        .resume_token
        .as_deref()
        .and_then(|token| {
            let claims = verify_session_token(token, &state.config.session_secret).ok()?;
            if claims.room_id != room_id || state.sessions.get(token).is_none() {
                return None;
            }
            state.sessions.remove(token);
            Some(claims.player_id)
        })
        .unwrap_or_else(issue_player_id);

    let room = state.rooms.ensure_room(&room_id);

    let (respond_tx, respond_rx) = oneshot::channel();
    let join_sent = room
        .command_tx
        .send(RoomCommand::Join {
            player_id: player_id.clone(),
            player_name: hello.name,
            team: hello.team,
            match_config: hello.match_config,
            respond: respond_tx,
        })
        .await
        .is_ok();

    let reply = match (join_sent, respond_rx.await) {
        (true, Ok(Ok(reply))) => reply,
        (true, Ok(Err(error))) => {
            warn!(room_id = %room_id, player_id = %player_id, error = %error, "Join rejected");
            let _ = send_msg(
                &mut ws_sink,
                &ServerMsg::Error {
                    code: error.code().to_string(),
                    message: error.to_string(),
                },
            )
            .await;
            return;
        }
        _ => {
            error!(room_id = %room_id, "Room task unavailable during join");
            return;
        }
    };

    let token = match sign_session_token(
        &player_id,
        &room_id,
        state.config.session_ttl_sec,
        &state.config.session_secret,
    ) {
        Ok(token) => token,
        Err(e) => {
            error!(room_id = %room_id, error = %e, "Failed to sign session token");
            return;
        }
    };
    state
        .sessions
        .insert(token.clone(), player_id.clone(), room_id.clone());

    let welcome = ServerMsg::Welcome(WelcomePayload {
        player_id: player_id.clone(),
        resume_token: token.clone(),
        tick_rate: state.config.tick_rate,
        protocol_version: PROTOCOL_VERSION,
        match_config: reply.match_config,
        limits: ConfigLimits::default(),
        assigned_session: AssignedSession {
            player_name: reply.player_name,
            team: reply.team,
        },
    });
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(player_id = %player_id, error = %e, "Failed to send welcome");
        return;
    }

    run_session(&state, &room, ws_sink, ws_stream, player_id, token).await;
}

/// Run the joined session with read/write split.
async fn run_session(
    state: &AppState,
    room: &RoomHandle,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    player_id: String,
    token: String,
) {
    let rate_limiter = PlayerRateLimiter::new();
    let mut broadcast_rx = room.broadcast_tx.subscribe();
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerMsg>(64);

    // Writer task: room broadcasts + targeted replies -> WebSocket
    let writer_player_id = player_id.clone();
    let writer_handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                result = broadcast_rx.recv() => match result {
                    Ok(msg) => {
                        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                            debug!(player_id = %writer_player_id, error = %e, "WebSocket send failed");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        // Slow consumers skip snapshots; never disconnect for lag.
                        warn!(player_id = %writer_player_id, lagged_count = n, "Client lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(player_id = %writer_player_id, "Broadcast channel closed");
                        break;
                    }
                },
                direct = direct_rx.recv() => match direct {
                    Some(msg) => {
                        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                            debug!(player_id = %writer_player_id, error = %e, "WebSocket send failed");
                            break;
                        }
                    }
                    None => break,
                },
            }
        }
    });

    // Reader loop: WebSocket -> room commands
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "Rate limited message");
                    continue;
                }
                state.sessions.touch(&token);

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(ClientMsg::Input(frame)) => {
                        let _ = room
                            .command_tx
                            .send(RoomCommand::Input {
                                player_id: player_id.clone(),
                                frame,
                            })
                            .await;
                    }
                    Ok(ClientMsg::Ready { ready }) => {
                        let (respond_tx, respond_rx) = oneshot::channel();
                        let sent = room
                            .command_tx
                            .send(RoomCommand::Ready {
                                player_id: player_id.clone(),
                                ready,
                                respond: respond_tx,
                            })
                            .await
                            .is_ok();
                        if sent {
                            if let Ok(Err(error)) = respond_rx.await {
                                let _ = direct_tx
                                    .send(ServerMsg::Error {
                                        code: error.code().to_string(),
                                        message: error.to_string(),
                                    })
                                    .await;
                            }
                        }
                    }
                    Ok(ClientMsg::Ping { sent_at_ms }) => {
                        let now = unix_millis();
                        let rtt_ms = if sent_at_ms > 0.0 {
                            (now as f64 - sent_at_ms).max(0.0)
                        } else {
                            0.0
                        };
                        let _ = room
                            .command_tx
                            .send(RoomCommand::Ping {
                                player_id: player_id.clone(),
                                rtt_ms,
                            })
                            .await;
                        let _ = direct_tx
                            .send(ServerMsg::Pong {
                                sent_at_ms,
                                server_now_ms: now,
                                rtt_ms,
                            })
                            .await;
                    }
                    Ok(ClientMsg::Leave) => {
                        info!(player_id = %player_id, "Client left");
                        let _ = room
                            .command_tx
                            .send(RoomCommand::Leave {
                                player_id: player_id.clone(),
                            })
                            .await;
                        state.sessions.remove(&token);
                        break;
                    }
                    Ok(ClientMsg::Hello { .. }) => {
                        warn!(player_id = %player_id, "Duplicate hello ignored");
                    }
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // No leave on a plain disconnect: the session lingers until idle expiry
    // so the client can resume with its token.
    writer_handle.abort();
    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Read messages until the hello arrives; pre-join commands are dropped.
async fn wait_for_hello(stream: &mut SplitStream<WebSocket>) -> Option<HelloPayload> {
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMsg>(&text) {
                Ok(ClientMsg::Hello {
                    name,
                    team,
                    match_config,
                    resume_token,
                }) => {
                    return Some(HelloPayload {
                        name,
                        team,
                        match_config,
                        resume_token,
                    });
                }
                Ok(_) => {
                    debug!("Dropping pre-join message");
                }
                Err(e) => {
                    warn!(error = %e, "Failed to parse message while waiting for hello");
                }
            },
            Ok(Message::Close(_)) => return None,
            Ok(_) => {}
            Err(_) => return None,
        }
    }
    None
}

fn issue_player_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("player-{}", &hex[..8])
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
