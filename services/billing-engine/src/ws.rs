//! Realtime billing gateway
//!
//! One WebSocket per participant. Inbound messages are `type`-tagged
//! [`SessionCommand`]s; outbound messages are the [`RoomEvent`]s of the
//! room the socket joined. `billing_start` joins its room implicitly
//! before the engine runs, so the initial zeroed update (or the
//! insufficient-funds refusal) always reaches the sender. Clients that
//! only watch a session send `join_room` first.
//!
//! Delivery is best-effort: a lagging socket loses the oldest events and
//! a malformed command is logged and ignored.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use mentora_billing_core::{NewSession, StopKind};
use mentora_types::{RoomEvent, SessionCommand, SessionId};

use crate::state::AppState;

/// Outbound queue depth between the room subscription and the socket
const OUTBOUND_BUFFER: usize = 64;

/// GET /ws
pub async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| room_socket(socket, state))
}

async fn room_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::channel::<RoomEvent>(OUTBOUND_BUFFER);
    let mut forward: Option<JoinHandle<()>> = None;
    let mut current_room: Option<SessionId> = None;

    loop {
        tokio::select! {
            inbound = receiver.next() => {
                match inbound {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<SessionCommand>(&text) {
                            Ok(command) => {
                                handle_command(
                                    &state,
                                    command,
                                    &mut forward,
                                    &mut current_room,
                                    &tx,
                                )
                                .await;
                            }
                            Err(e) => debug!(error = %e, "ignoring malformed gateway command"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "socket read failed");
                        break;
                    }
                }
            }
            outbound = rx.recv() => {
                let Some(event) = outbound else { break };
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if sender.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "dropping unencodable room event"),
                }
            }
        }
    }

    if let Some(task) = forward.take() {
        task.abort();
    }
    debug!(room = ?current_room, "socket closed");
}

async fn handle_command(
    state: &AppState,
    command: SessionCommand,
    forward: &mut Option<JoinHandle<()>>,
    current_room: &mut Option<SessionId>,
    tx: &mpsc::Sender<RoomEvent>,
) {
    match command {
        SessionCommand::JoinRoom { session_id } => {
            join_room(state, forward, current_room, tx, &session_id);
        }
        SessionCommand::BillingStart {
            session_id,
            advisor_id,
            client_id,
            rate_per_minute,
            start_time,
        } => {
            // join first so the start outcome is observable on this socket
            join_room(state, forward, current_room, tx, &session_id);
            let input = NewSession {
                session_id,
                client_id,
                advisor_id,
                rate_per_minute,
                started_at: start_time,
            };
            if let Err(e) = state.engine.start_session(input, Utc::now()).await {
                // refusals are published to the room by the engine itself
                if !e.is_insufficient_funds() {
                    warn!(error = %e, "billing start failed");
                }
            }
        }
        SessionCommand::BillingStop { session_id } => {
            state
                .engine
                .stop_session(&session_id, StopKind::Stop, Utc::now())
                .await;
        }
        SessionCommand::SessionEnded { session_id } => {
            state
                .engine
                .stop_session(&session_id, StopKind::Ended, Utc::now())
                .await;
        }
    }
}

fn join_room(
    state: &AppState,
    forward: &mut Option<JoinHandle<()>>,
    current_room: &mut Option<SessionId>,
    tx: &mpsc::Sender<RoomEvent>,
    session_id: &SessionId,
) {
    if current_room.as_ref() == Some(session_id) {
        return;
    }
    if let Some(task) = forward.take() {
        task.abort();
    }
    *forward = Some(spawn_forwarder(state.hub.subscribe(session_id), tx.clone()));
    *current_room = Some(session_id.clone());
    debug!(%session_id, "socket joined room");
}

/// Forward a room subscription into the socket's outbound queue
fn spawn_forwarder(
    mut room: broadcast::Receiver<RoomEvent>,
    tx: mpsc::Sender<RoomEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match room.recv().await {
                Ok(event) => {
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "room subscriber lagging, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
