use std::{collections::HashMap, sync::Arc};

use axum::extract::ws::Message;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::models::OutboundMessage;

const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// One live WebSocket connection's outbound side. The Broadcaster is the
/// sole owner of `tx`; the connection's writer task holds only the paired
/// `Receiver`, so removing a subscriber from the map closes its channel and
/// the writer exits on its next `recv`.
struct Subscriber {
    tx: mpsc::Sender<Message>,
}

/// Fan-out to every live connection. `publish` is the hot path; it
/// serializes the event once and attempts a non-blocking send to each
/// subscriber's bounded queue, evicting any that can't keep up.
pub struct Broadcaster {
    subscribers: RwLock<HashMap<Uuid, Subscriber>>,
    queue_capacity: usize,
}

impl Broadcaster {
    pub fn new() -> Arc<Self> {
        Self::with_queue_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    /// Construct with the subscriber queue depth from `CanvasConfig`.
    pub fn with_queue_capacity(queue_capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            subscribers: RwLock::new(HashMap::new()),
            queue_capacity,
        })
    }

    /// Register a freshly accepted connection. Returns the id the
    /// IngressHandler must pass to `deregister` on exit and the receiving
    /// half its dedicated writer task drains onto the socket.
    pub async fn register(&self) -> (Uuid, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(self.queue_capacity);
        let id = Uuid::new_v4();
        self.subscribers.write().await.insert(id, Subscriber { tx });
        (id, rx)
    }

    pub async fn deregister(&self, id: Uuid) {
        self.subscribers.write().await.remove(&id);
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Broadcast one event to every current subscriber. Queue-full is
    /// treated as a slow subscriber: it is dropped from the set rather than
    /// retried, which closes its writer's channel and ends that connection.
    pub async fn publish(&self, event: &OutboundMessage) {
        let frame = Message::Text(event.to_json().into());
        let slow = self.try_send_all(&frame).await;
        self.evict(slow).await;
    }

    /// Address one event to a single subscriber, used for rejects that
    /// belong only to the originating connection. A no-op if the
    /// subscriber has already disconnected.
    pub async fn send_to(&self, id: Uuid, event: &OutboundMessage) {
        let frame = Message::Text(event.to_json().into());
        let slow = {
            let subscribers = self.subscribers.read().await;
            match subscribers.get(&id) {
                Some(subscriber) => subscriber.tx.try_send(frame).is_err(),
                None => false,
            }
        };
        if slow {
            self.evict(vec![id]).await;
        }
    }

    async fn try_send_all(&self, frame: &Message) -> Vec<Uuid> {
        let subscribers = self.subscribers.read().await;
        subscribers
            .iter()
            .filter_map(|(id, subscriber)| subscriber.tx.try_send(frame.clone()).err().map(|_| *id))
            .collect()
    }

    /// Close every live subscriber with a graceful close frame. Called once
    /// during Lifecycle shutdown, after the Applier's final broadcast has
    /// already been enqueued to everyone still connected at that point.
    pub async fn shutdown(&self) {
        let mut subscribers = self.subscribers.write().await;
        for subscriber in subscribers.values() {
            let _ = subscriber.tx.try_send(Message::Close(None));
        }
        subscribers.clear();
    }

    async fn evict(&self, ids: Vec<Uuid>) {
        if ids.is_empty() {
            return;
        }
        let mut subscribers = self.subscribers.write().await;
        for id in ids {
            tracing::warn!(subscriber = %id, "evicting slow subscriber");
            subscribers.remove(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn slow_subscriber_is_evicted_on_full_queue() {
        let broadcaster = Broadcaster::new();
        let (_id, _rx) = broadcaster.register().await;

        let event = OutboundMessage::HeartbeatAck { timestamp: Utc::now() };
        for _ in 0..DEFAULT_QUEUE_CAPACITY + 1 {
            broadcaster.publish(&event).await;
        }

        assert_eq!(broadcaster.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn deregister_removes_subscriber() {
        let broadcaster = Broadcaster::new();
        let (id, _rx) = broadcaster.register().await;
        assert_eq!(broadcaster.subscriber_count().await, 1);
        broadcaster.deregister(id).await;
        assert_eq!(broadcaster.subscriber_count().await, 0);
    }

    #[tokio::test]
    async fn send_to_unknown_subscriber_is_a_no_op() {
        let broadcaster = Broadcaster::new();
        let event = OutboundMessage::HeartbeatAck { timestamp: Utc::now() };
        broadcaster.send_to(Uuid::new_v4(), &event).await;
    }
}
