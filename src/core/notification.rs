//! Topic-keyed fan-out of payment notifications.
//!
//! Each topic (a booking reference code) owns a tokio `broadcast` channel that
//! exists only while someone is subscribed. Delivery is best-effort and
//! at-most-once: nothing is persisted, and a subscriber only sees messages
//! published after it subscribed. A client that reconnects must re-check the
//! booking itself.

use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, warn};

const CHANNEL_CAPACITY: usize = 16;

type Channels<M> = Arc<RwLock<HashMap<String, broadcast::Sender<M>>>>;

/// Events pushed to a client waiting on its booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PaymentNotification {
    /// The booking's transfer was matched and the booking is now paid
    #[serde(rename_all = "camelCase")]
    PaymentSuccess {
        /// Reference code of the settled booking
        booking_number: String,
    },
}

/// Hub used by the webhook endpoint and the WebSocket transport.
pub type PaymentNotificationHub = NotificationHub<PaymentNotification>;

/// In-process publish/subscribe hub keyed by topic.
pub struct NotificationHub<M> {
    channels: Channels<M>,
}

impl<M> NotificationHub<M>
where
    M: Clone + Send + Sync + 'static,
{
    /// Creates an empty hub.
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Joins `topic`, creating its channel on first use.
    pub async fn subscribe(&self, topic: impl Into<String>) -> Subscription<M> {
        let topic = topic.into();
        let mut channels = self.channels.write().await;
        let receiver = channels
            .entry(topic.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe();
        debug!("Subscribed to topic {}", topic);
        Subscription { topic, receiver }
    }

    /// Delivers `message` to the current subscribers of `topic`.
    ///
    /// Returns how many subscribers it reached. Publishing to a topic nobody
    /// listens on is not an error and creates nothing.
    pub async fn publish(&self, topic: &str, message: M) -> usize {
        let delivered = {
            let channels = self.channels.read().await;
            match channels.get(topic) {
                Some(sender) => sender.send(message).unwrap_or(0),
                None => return 0,
            }
        };

        if delivered == 0 {
            self.prune(topic).await;
        }
        debug!("Published to topic {} ({} subscribers)", topic, delivered);
        delivered
    }

    /// Leaves a topic; the topic is dropped once its last subscriber is gone.
    pub async fn unsubscribe(&self, subscription: Subscription<M>) {
        let Subscription { topic, receiver } = subscription;
        drop(receiver);
        self.prune(&topic).await;
        debug!("Unsubscribed from topic {}", topic);
    }

    /// Number of topics with a live channel.
    pub async fn topic_count(&self) -> usize {
        self.channels.read().await.len()
    }

    async fn prune(&self, topic: &str) {
        let mut channels = self.channels.write().await;
        if channels
            .get(topic)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(topic);
        }
    }
}

impl<M> Default for NotificationHub<M>
where
    M: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for NotificationHub<M> {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
        }
    }
}

/// One subscriber's handle on a topic.
pub struct Subscription<M> {
    topic: String,
    receiver: broadcast::Receiver<M>,
}

impl<M> Subscription<M>
where
    M: Clone,
{
    /// The topic this handle listens on.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Waits for the next message. Returns `None` once the hub is gone.
    ///
    /// A subscriber that falls behind skips what it missed rather than failing.
    pub async fn recv(&mut self) -> Option<M> {
        loop {
            match self.receiver.recv().await {
                Ok(message) => return Some(message),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Subscriber on {} lagged, skipped {} messages", self.topic, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
