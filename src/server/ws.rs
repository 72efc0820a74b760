//! Live update channel. A client announces itself with `{"userId": ".."}`
//! as its first text message and from then on receives every update
//! published for that user.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;

use crate::notify::{Notifier, Subscription};

use super::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(connect))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Register {
    user_id: String,
}

async fn connect(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| serve_socket(socket, state.notifier))
}

async fn serve_socket(socket: WebSocket, notifier: Arc<Notifier>) {
    let (mut sink, mut stream) = socket.split();

    let subscription = loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<Register>(text.as_str()) {
                Ok(register) if !register.user_id.trim().is_empty() => {
                    break notifier.register(register.user_id.trim()).await;
                }
                Ok(_) => tracing::warn!("Ignoring registration without a user id"),
                Err(e) => tracing::warn!("Ignoring malformed registration: {}", e),
            },
            Some(Ok(Message::Close(_))) | None => return,
            Some(Err(e)) => {
                tracing::debug!("Connection dropped before registering: {}", e);
                return;
            }
            Some(Ok(_)) => {}
        }
    };

    let Subscription {
        id,
        user_id,
        mut receiver,
    } = subscription;
    tracing::debug!(
        "User {} now has {} open connections",
        user_id,
        notifier.connection_count(&user_id).await
    );

    let mut forward = tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            if let Err(e) = sink.send(Message::Text(message.into())).await {
                tracing::debug!("Write to connection failed: {}", e);
                break;
            }
        }
    });

    let reader_user = user_id.clone();
    let mut inbound = tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    tracing::debug!("Message from {}: {}", reader_user, text.as_str());
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!("Read from {} failed: {}", reader_user, e);
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut forward => inbound.abort(),
        _ = &mut inbound => forward.abort(),
    }
    notifier.unregister(&user_id, id).await;
}
