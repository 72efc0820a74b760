//! Live change fan-out to connected clients.
//!
//! Every duplex client connection is represented here by the sending half
//! of a channel; the transport task owns the receiving half and forwards
//! into the socket. A closed receiver is how a dead connection shows up.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::{mpsc, Mutex};

pub type ConnectionId = u64;

/// Receiving side handed to the transport for one registered connection.
pub struct Subscription {
    pub id: ConnectionId,
    pub user_id: String,
    pub receiver: mpsc::UnboundedReceiver<String>,
}

#[derive(Default)]
pub struct Notifier {
    clients: Mutex<HashMap<String, HashMap<ConnectionId, mpsc::UnboundedSender<String>>>>,
    next_id: AtomicU64,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, user_id: &str) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel();

        let mut clients = self.clients.lock().await;
        clients.entry(user_id.to_string()).or_default().insert(id, tx);
        tracing::info!("Registered connection {} for user {}", id, user_id);

        Subscription {
            id,
            user_id: user_id.to_string(),
            receiver: rx,
        }
    }

    pub async fn unregister(&self, user_id: &str, id: ConnectionId) {
        let mut clients = self.clients.lock().await;
        if let Some(connections) = clients.get_mut(user_id) {
            if connections.remove(&id).is_some() {
                tracing::info!("Dropped connection {} for user {}", id, user_id);
            }
            if connections.is_empty() {
                clients.remove(user_id);
            }
        }
    }

    /// Sends `payload` to every live connection of `user_id` and returns how
    /// many accepted it. Users without a connection get nothing; there is no
    /// queue.
    pub async fn publish<T: Serialize>(&self, user_id: &str, payload: &T) -> usize {
        match serde_json::to_string(payload) {
            Ok(message) => self.publish_text(user_id, message).await,
            Err(e) => {
                tracing::error!("Failed to encode update for {}: {}", user_id, e);
                0
            }
        }
    }

    pub async fn publish_text(&self, user_id: &str, message: String) -> usize {
        let mut clients = self.clients.lock().await;
        let Some(connections) = clients.get_mut(user_id) else {
            return 0;
        };

        let mut delivered = 0;
        connections.retain(|id, tx| match tx.send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(_) => {
                tracing::warn!("Pruning closed connection {} for user {}", id, user_id);
                false
            }
        });

        if connections.is_empty() {
            clients.remove(user_id);
        }
        delivered
    }

    pub async fn connection_count(&self, user_id: &str) -> usize {
        self.clients
            .lock()
            .await
            .get(user_id)
            .map_or(0, HashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn publish_reaches_only_the_owning_user() {
        let notifier = Notifier::new();
        let mut phone = notifier.register("alice").await;
        let mut laptop = notifier.register("alice").await;
        let mut other = notifier.register("bob").await;

        let delivered = notifier.publish("alice", &json!({"id": 1})).await;

        assert_eq!(delivered, 2);
        assert_eq!(phone.receiver.recv().await.unwrap(), r#"{"id":1}"#);
        assert_eq!(laptop.receiver.recv().await.unwrap(), r#"{"id":1}"#);
        assert!(other.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn dropped_connection_is_pruned_silently() {
        let notifier = Notifier::new();
        let gone = notifier.register("alice").await;
        let mut alive = notifier.register("alice").await;
        drop(gone);

        assert_eq!(notifier.publish("alice", &json!({"n": 1})).await, 1);
        assert_eq!(notifier.connection_count("alice").await, 1);
        assert!(alive.receiver.recv().await.is_some());
    }

    #[tokio::test]
    async fn unregister_stops_delivery() {
        let notifier = Notifier::new();
        let sub = notifier.register("alice").await;
        notifier.unregister("alice", sub.id).await;

        assert_eq!(notifier.publish("alice", &json!({})).await, 0);
        assert_eq!(notifier.connection_count("alice").await, 0);
    }

    #[tokio::test]
    async fn user_without_connections_gets_nothing() {
        let notifier = Notifier::new();
        assert_eq!(notifier.publish("nobody", &json!({"id": 3})).await, 0);
    }
}
