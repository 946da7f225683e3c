//! WebSocket connection gateway.
//!
//! Authentication gates everything: the bearer token travels as a
//! query parameter with the upgrade request and is verified before the
//! upgrade. A missing or invalid token refuses the connection with 401
//! and no Session is ever created.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::messages::{ClientEvent, ServerEvent};
use super::session::Session;
use super::AppState;
use crate::chat::RoomEvent;
use crate::BanterError;

/// Query parameters for the WebSocket upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Bearer token from the external credential service.
    pub token: Option<String>,
}

/// WebSocket chat handler.
///
/// GET /ws?token={bearer_token}
pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
) -> Response {
    let Some(token) = query.token.as_deref() else {
        debug!("connection refused: missing token");
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    };

    let identity = match state.verifier.verify(token) {
        Ok(identity) => identity,
        Err(e) => {
            debug!("connection refused: {}", e);
            return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, identity))
}

/// Drive one authenticated connection until it closes.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, identity: crate::auth::Identity) {
    let mut session = Session::new(identity, state);
    info!(
        session = session.id(),
        user = %session.identity().username,
        "connected"
    );

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut room_events: Option<broadcast::Receiver<RoomEvent>> = None;

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientEvent>(&text) {
                            Ok(event) => {
                                handle_client_event(
                                    &mut ws_sender,
                                    &mut session,
                                    event,
                                    &mut room_events,
                                )
                                .await;
                            }
                            Err(e) => {
                                debug!(session = session.id(), "unparseable frame: {}", e);
                                send_frame(
                                    &mut ws_sender,
                                    &ServerEvent::error("invalidFrame", "Malformed event"),
                                )
                                .await;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(session = session.id(), "transport error: {}", e);
                        break;
                    }
                }
            }

            event = recv_room_event(&mut room_events) => {
                if let Some(event) = event {
                    if let Some(frame) = session.frame_for(event) {
                        if !send_frame(&mut ws_sender, &frame).await {
                            break;
                        }
                    }
                }
            }
        }
    }

    session.disconnect().await;
    info!(session = session.id(), "disconnected");
}

/// Await the next room event, or pend forever while no room is joined.
async fn recv_room_event(
    receiver: &mut Option<broadcast::Receiver<RoomEvent>>,
) -> Option<RoomEvent> {
    match receiver {
        Some(rx) => match rx.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "room event receiver lagged");
                None
            }
            Err(broadcast::error::RecvError::Closed) => None,
        },
        None => std::future::pending().await,
    }
}

/// Dispatch one client event. Event-level failures are answered with
/// an error frame to this sender only and never disturb room state.
async fn handle_client_event(
    ws_sender: &mut SplitSink<WebSocket, Message>,
    session: &mut Session,
    event: ClientEvent,
    room_events: &mut Option<broadcast::Receiver<RoomEvent>>,
) {
    match event {
        ClientEvent::Join { room } => match session.join(&room).await {
            Ok(outcome) => {
                *room_events = Some(outcome.receiver);
                send_frame(ws_sender, &ServerEvent::load_messages(&outcome.history)).await;
            }
            Err(e) => {
                debug!(session = session.id(), "join rejected: {}", e);
                send_frame(ws_sender, &ServerEvent::error("invalidRoom", e.to_string())).await;
            }
        },

        ClientEvent::SendMessage { room, message } => {
            match session.send_message(&room, &message).await {
                // Delivery happens through the room broadcast
                Ok(_) => {}
                Err(e @ BanterError::Validation(_)) => {
                    debug!(session = session.id(), "message rejected: {}", e);
                    send_frame(
                        ws_sender,
                        &ServerEvent::error("invalidMessage", e.to_string()),
                    )
                    .await;
                }
                Err(e) => {
                    warn!(session = session.id(), "message dropped: {}", e);
                    send_frame(
                        ws_sender,
                        &ServerEvent::error("persistenceFailed", "Message could not be saved"),
                    )
                    .await;
                }
            }
        }

        ClientEvent::Typing { room, is_typing } => {
            if let Err(e) = session.set_typing(&room, is_typing) {
                // Typing is best-effort; drop without an error frame
                debug!(session = session.id(), "typing dropped: {}", e);
            }
        }
    }
}

/// Serialize and send one frame. Returns false when the transport is
/// gone.
async fn send_frame(ws_sender: &mut SplitSink<WebSocket, Message>, frame: &ServerEvent) -> bool {
    match serde_json::to_string(frame) {
        Ok(json) => ws_sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!("frame serialization failed: {}", e);
            true
        }
    }
}
