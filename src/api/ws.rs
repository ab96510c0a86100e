//! Payment notification WebSocket.
//!
//! A client waiting on the payment screen opens `/ws` and subscribes to its
//! booking reference:
//!
//! ```json
//! { "type": "subscribe", "topic": "BK0A1B2C3D4E" }
//! ```
//!
//! The server confirms with `{"type":"subscribed","topic":...}` and later pushes
//! `{"type":"paymentSuccess","bookingNumber":...}` when the transfer settles.
//! A connection listens on at most one topic; subscribing again switches topic.
//! Nothing is replayed, so a client that reconnects should re-read its booking.

use crate::{
    api::AppState,
    core::{
        notification::{PaymentNotification, PaymentNotificationHub, Subscription},
        reference::extract_reference_code,
    },
};
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ClientFrame {
    Subscribe { topic: String },
    Unsubscribe,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ServerFrame<'a> {
    Subscribed { topic: &'a str },
    Unsubscribed,
    Error { message: &'a str },
}

/// What woke the connection loop up.
enum Step {
    Client(Option<Result<Message, axum::Error>>),
    Notification(Option<PaymentNotification>),
}

/// `GET /ws`
#[allow(clippy::unused_async)]
pub async fn handle(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve(socket, state.hub))
}

/// Accepts only a bare reference code, in any letter case.
fn normalize_topic(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    extract_reference_code(trimmed).filter(|code| code.len() == trimmed.len())
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, frame: &T) -> bool {
    match serde_json::to_string(frame) {
        Ok(json) => socket.send(Message::Text(json)).await.is_ok(),
        Err(e) => {
            debug!("Failed to encode WebSocket frame: {}", e);
            true
        }
    }
}

async fn leave(hub: &PaymentNotificationHub, subscription: &mut Option<Subscription<PaymentNotification>>) {
    if let Some(current) = subscription.take() {
        hub.unsubscribe(current).await;
    }
}

async fn serve(mut socket: WebSocket, hub: PaymentNotificationHub) {
    debug!("Notification socket opened");
    let mut subscription: Option<Subscription<PaymentNotification>> = None;

    loop {
        let step = match subscription.as_mut() {
            Some(listening) => tokio::select! {
                frame = socket.recv() => Step::Client(frame),
                notification = listening.recv() => Step::Notification(notification),
            },
            None => Step::Client(socket.recv().await),
        };

        let keep_open = match step {
            Step::Client(Some(Ok(Message::Text(text)))) => {
                match serde_json::from_str::<ClientFrame>(&text) {
                    Ok(ClientFrame::Subscribe { topic }) => match normalize_topic(&topic) {
                        Some(topic) => {
                            leave(&hub, &mut subscription).await;
                            subscription = Some(hub.subscribe(topic.clone()).await);
                            send_json(&mut socket, &ServerFrame::Subscribed { topic: &topic }).await
                        }
                        None => {
                            let frame = ServerFrame::Error {
                                message: "topic must be a booking reference code",
                            };
                            send_json(&mut socket, &frame).await
                        }
                    },
                    Ok(ClientFrame::Unsubscribe) => {
                        leave(&hub, &mut subscription).await;
                        send_json(&mut socket, &ServerFrame::Unsubscribed).await
                    }
                    Err(e) => {
                        debug!("Ignoring malformed client frame: {}", e);
                        send_json(&mut socket, &ServerFrame::Error { message: "malformed frame" }).await
                    }
                }
            }
            Step::Client(Some(Ok(Message::Close(_)) | Err(_)) | None) => false,
            Step::Client(Some(Ok(_))) => true,
            Step::Notification(Some(notification)) => send_json(&mut socket, &notification).await,
            Step::Notification(None) => {
                subscription = None;
                true
            }
        };

        if !keep_open {
            break;
        }
    }

    leave(&hub, &mut subscription).await;
    info!("Notification socket closed");
}
