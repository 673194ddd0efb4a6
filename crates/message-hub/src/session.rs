use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use rocket::State;
use rocket_ws as ws;
use serde::{Deserialize, Serialize};

use platform_core::auth::JwtVerifier;

use crate::events::ChatEvent;
use crate::hub::Hub;
use crate::presence::PresenceTracker;
use crate::typing::TypingTracker;

/// How long a freshly opened socket has to send its auth frame before the
/// session is closed.
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientFrame {
    Auth { token: String },
    Subscribe { room_id: String, sender_type: Option<String> },
    Unsubscribe { room_id: String },
    Typing { room_id: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerFrame<'a> {
    AuthOk,
    Error { message: &'a str },
    Subscribed { room_id: &'a str },
}

#[rocket::get("/ws")]
pub fn ws_connect(
    ws: ws::WebSocket,
    verifier: &State<Arc<JwtVerifier>>,
    hub: &State<Arc<Hub>>,
    presence: &State<Arc<PresenceTracker>>,
    typing: &State<Arc<TypingTracker>>,
) -> ws::Channel<'static> {
    let verifier = verifier.inner().clone();
    let hub = hub.inner().clone();
    let presence = presence.inner().clone();
    let typing = typing.inner().clone();

    ws.channel(move |stream| {
        Box::pin(async move {
            run_session(stream, verifier, hub, presence, typing).await;
            Ok(())
        })
    })
}

async fn run_session(
    mut stream: ws::stream::DuplexStream,
    verifier: Arc<JwtVerifier>,
    hub: Arc<Hub>,
    presence: Arc<PresenceTracker>,
    typing: Arc<TypingTracker>,
) {
    let session_id = uuid::Uuid::new_v4().to_string();
    let claims = match authenticate(&mut stream).await {
        Some(token) => match verifier.verify(&token) {
            Ok(claims) => claims,
            Err(_) => {
                send_frame(&mut stream, &ServerFrame::Error { message: "invalid token" }).await;
                return;
            }
        },
        None => {
            send_frame(&mut stream, &ServerFrame::Error { message: "auth timeout" }).await;
            return;
        }
    };
    send_frame(&mut stream, &ServerFrame::AuthOk).await;

    let mut subscribed_rooms: Vec<String> = Vec::new();
    let mut room_rx: Option<tokio::sync::mpsc::Receiver<ChatEvent>> = None;

    loop {
        tokio::select! {
            frame = next_frame(&mut stream) => {
                let Some(frame) = frame else { break };
                match frame {
                    ClientFrame::Auth { .. } => {}
                    ClientFrame::Subscribe { room_id, sender_type } => {
                        let rx = hub.subscribe(&room_id, session_id.clone()).await;
                        room_rx = Some(rx);
                        if let Some(entry) = presence.join(&room_id, &claims.username, sender_type.as_deref()) {
                            hub.publish(ChatEvent::PresenceJoined { room_id: room_id.clone(), entry }).await;
                        }
                        subscribed_rooms.push(room_id.clone());
                        send_frame(&mut stream, &ServerFrame::Subscribed { room_id: &room_id }).await;
                    }
                    ClientFrame::Unsubscribe { room_id } => {
                        hub.unsubscribe(&room_id, &session_id).await;
                        presence.leave(hub.clone(), room_id.clone(), claims.username.clone());
                        subscribed_rooms.retain(|r| r != &room_id);
                        room_rx = None;
                    }
                    ClientFrame::Typing { room_id } => {
                        typing.notify(&hub, &room_id, &claims.username, None).await;
                    }
                }
            }
            Some(event) = async {
                match room_rx.as_mut() {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending().await,
                }
            } => {
                if send_event(&mut stream, &event).await.is_err() {
                    break;
                }
            }
        }
    }

    for room_id in subscribed_rooms {
        hub.unsubscribe(&room_id, &session_id).await;
        presence.leave(hub.clone(), room_id, claims.username.clone());
    }
}

async fn authenticate(stream: &mut ws::stream::DuplexStream) -> Option<String> {
    let frame = tokio::time::timeout(AUTH_TIMEOUT, next_frame(stream)).await.ok()?;
    match frame? {
        ClientFrame::Auth { token } => Some(token),
        _ => None,
    }
}

async fn next_frame(stream: &mut ws::stream::DuplexStream) -> Option<ClientFrame> {
    loop {
        let message = stream.next().await?.ok()?;
        if let ws::Message::Text(text) = message {
            match serde_json::from_str(&text) {
                Ok(frame) => return Some(frame),
                Err(e) => {
                    tracing::warn!(error = %e, "session: dropping malformed client frame");
                    continue;
                }
            }
        }
    }
}

async fn send_frame(stream: &mut ws::stream::DuplexStream, frame: &ServerFrame<'_>) {
    if let Ok(text) = serde_json::to_string(frame) {
        let _ = stream.send(ws::Message::Text(text)).await;
    }
}

async fn send_event(stream: &mut ws::stream::DuplexStream, event: &ChatEvent) -> Result<(), ()> {
    let text = serde_json::to_string(event).map_err(|_| ())?;
    stream.send(ws::Message::Text(text)).await.map_err(|_| ())
}
