//! WebSocket upgrade handler

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{ArenaHandle, CommandKind};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{parse_keys, parse_name, parse_rotation, ClientMsg, ServerMsg};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let player_id = Uuid::new_v4();
    info!(player_id = %player_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe before the player exists so the first snapshot containing it is not missed
    let snapshot_rx = state.arena.subscribe();

    if !state.arena.send(player_id, CommandKind::Connect).await {
        error!(player_id = %player_id, "Arena is not running");
        return;
    }
    state.sessions.register(player_id);

    if let Err(e) = send_msg(&mut ws_sink, &ServerMsg::Init { player_id }).await {
        error!(player_id = %player_id, error = %e, "Failed to send init");
    } else {
        run_session(player_id, ws_sink, ws_stream, &state.arena, snapshot_rx).await;
    }

    // Cleanup on disconnect
    let _ = state.arena.send(player_id, CommandKind::Disconnect).await;
    let session_ms = state
        .sessions
        .unregister(&player_id)
        .map(|info| info.duration_ms(unix_millis()))
        .unwrap_or(0);

    info!(player_id = %player_id, session_ms, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    player_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    arena: &ArenaHandle,
    mut snapshot_rx: broadcast::Receiver<Arc<str>>,
) {
    let rate_limiter = PlayerRateLimiter::new();

    // Spawn writer task: broadcast snapshots -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            match snapshot_rx.recv().await {
                Ok(json) => {
                    if let Err(e) = ws_sink.send(Message::Text(json.to_string())).await {
                        debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(
                        player_id = %player_id,
                        lagged_count = n,
                        "Client lagged, skipping {} snapshots", n
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(player_id = %player_id, "Snapshot channel closed");
                    break;
                }
            }
        }
    });

    // Reader loop: WebSocket -> arena
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(player_id = %player_id, "Rate limited input message");
                    continue;
                }

                match ClientMsg::parse(&text) {
                    Ok(client_msg) => {
                        let Some(kind) = to_command(client_msg) else {
                            debug!(player_id = %player_id, "Ignoring invalid client message payload");
                            continue;
                        };
                        if !arena.send(player_id, kind).await {
                            debug!(player_id = %player_id, "Command channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                debug!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Validate a decoded client message field by field.
/// `None` means nothing usable was left and the message is dropped.
fn to_command(msg: ClientMsg) -> Option<CommandKind> {
    match msg {
        ClientMsg::Join { name } => parse_name(&name).map(|name| CommandKind::Join { name }),
        ClientMsg::Input { rotation, keys } => {
            let orientation = parse_rotation(&rotation);
            let keys = parse_keys(&keys);
            if orientation.is_none() && keys.is_none() {
                return None;
            }
            Some(CommandKind::Input { orientation, keys })
        }
        ClientMsg::Shoot => Some(CommandKind::Shoot),
        ClientMsg::Reload => Some(CommandKind::Reload),
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
