use std::collections::HashSet;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{FromRef, Query, State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};

use crate::auth::claims::CurrentUser;
use crate::auth::jwt::JwtKeys;
use crate::error::AuthError;
use crate::state::AppState;

/// Broadcast fan-out shared by all connected chat clients.
#[derive(Clone)]
pub struct ChatHub {
    tx: broadcast::Sender<ChatEvent>,
}

impl ChatHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(256);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: ChatEvent) {
        // Errors only when no receiver exists.
        let _ = self.tx.send(event);
    }
}

impl Default for ChatHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Message relayed to every member of a room.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatEvent {
    pub room: String,
    pub from: String,
    pub body: String,
}

/// Frames accepted from clients.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClientFrame {
    Join {
        #[serde(rename = "joinRoom")]
        room: String,
    },
    Message {
        room: String,
        body: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Upgrade to a chat socket. The access token is checked before the
/// upgrade completes, so a missing or bad token never reaches the relay.
#[instrument(skip(state, query, ws))]
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, AuthError> {
    let token = query.token.ok_or(AuthError::Unauthorized)?;
    let keys = JwtKeys::from_ref(&state);
    let claims = match keys.verify_access(&token) {
        Ok(claims) => claims,
        Err(e) => {
            warn!("chat handshake with invalid token");
            return Err(e);
        }
    };
    let user = CurrentUser::from(claims);
    info!(email = %user.email, "chat client connected");
    Ok(ws.on_upgrade(move |socket| relay(socket, state.chat.clone(), user)))
}

async fn relay(socket: WebSocket, hub: ChatHub, user: CurrentUser) {
    let mut events = hub.subscribe();
    let (mut sink, mut stream) = socket.split();
    let mut joined: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            frame = stream.next() => {
                let Some(Ok(message)) = frame else { break };
                match message {
                    Message::Text(text) => match serde_json::from_str::<ClientFrame>(&text) {
                        Ok(ClientFrame::Join { room }) => {
                            joined.insert(room);
                        }
                        Ok(ClientFrame::Message { room, body }) => {
                            if joined.contains(&room) {
                                hub.publish(ChatEvent {
                                    room,
                                    from: user.email.clone(),
                                    body,
                                });
                            }
                        }
                        // Unknown frames are dropped.
                        Err(_) => {}
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            event = events.recv() => {
                match event {
                    Ok(event) if joined.contains(&event.room) => {
                        let Ok(text) = serde_json::to_string(&event) else { continue };
                        if sink.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
    info!(email = %user.email, "chat client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_frame_parses() {
        let frame: ClientFrame = serde_json::from_str(r#"{"joinRoom":"general"}"#).unwrap();
        assert!(matches!(frame, ClientFrame::Join { room } if room == "general"));
    }

    #[test]
    fn message_frame_parses() {
        let frame: ClientFrame =
            serde_json::from_str(r#"{"room":"general","body":"hello"}"#).unwrap();
        match frame {
            ClientFrame::Message { room, body } => {
                assert_eq!(room, "general");
                assert_eq!(body, "hello");
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }

    #[test]
    fn unknown_frame_is_rejected() {
        assert!(serde_json::from_str::<ClientFrame>(r#"{"ping":1}"#).is_err());
    }

    #[tokio::test]
    async fn hub_delivers_published_events() {
        let hub = ChatHub::new();
        let mut rx = hub.subscribe();

        hub.publish(ChatEvent {
            room: "general".into(),
            from: "alice@example.com".into(),
            body: "hi".into(),
        });

        let event = rx.recv().await.expect("event");
        assert_eq!(event.room, "general");
        assert_eq!(event.from, "alice@example.com");
        assert_eq!(event.body, "hi");
    }

    #[tokio::test]
    async fn hub_fans_out_to_every_subscriber() {
        let hub = ChatHub::new();
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        hub.publish(ChatEvent {
            room: "general".into(),
            from: "alice@example.com".into(),
            body: "hi".into(),
        });

        assert_eq!(first.recv().await.expect("event").body, "hi");
        assert_eq!(second.recv().await.expect("event").body, "hi");
    }
}
