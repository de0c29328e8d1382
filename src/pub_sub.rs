//! Channel based publish/subscribe.
//!
//! Each subscription owns a bounded queue. Publishing never waits on a subscriber:
//! when a queue is full the message is dropped for that subscriber only.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use bytes::Bytes;
use tokio::sync::{
    RwLock,
    mpsc::{self, error::TrySendError},
};
use tracing::{debug, warn};

use crate::resp::RespValue;

/// Pending messages a subscriber may have before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

pub const SUBSCRIBE: &str = "SUBSCRIBE";
pub const UNSUBSCRIBE: &str = "UNSUBSCRIBE";
pub const PUBLISH: &str = "PUBLISH";

pub fn is_pub_sub_command(name: &str) -> bool {
    matches!(name, SUBSCRIBE | UNSUBSCRIBE | PUBLISH)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug)]
struct Subscriber {
    id: SubscriptionId,
    sender: mpsc::Sender<RespValue>,
}

#[derive(Debug)]
pub struct PubSub {
    channels: RwLock<HashMap<Bytes, Vec<Subscriber>>>,
    next_id: AtomicU64,
    queue_capacity: usize,
}

impl PubSub {
    pub fn new(queue_capacity: usize) -> Self {
        PubSub {
            channels: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Registers a new subscription on `channel`.
    ///
    /// The receiver yields published messages and returns `None` once the
    /// subscription is removed.
    pub async fn subscribe(&self, channel: Bytes) -> (SubscriptionId, mpsc::Receiver<RespValue>) {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = mpsc::channel(self.queue_capacity);

        let mut channels = self.channels.write().await;
        channels
            .entry(channel)
            .or_default()
            .push(Subscriber { id, sender });

        (id, receiver)
    }

    /// Removes a subscription and closes its queue. Returns whether it existed.
    pub async fn unsubscribe(&self, channel: &[u8], id: SubscriptionId) -> bool {
        let mut channels = self.channels.write().await;

        let Some(subscribers) = channels.get_mut(channel) else {
            return false;
        };

        let before = subscribers.len();
        // Dropping the sender is what closes the subscriber's queue.
        subscribers.retain(|subscriber| subscriber.id != id);
        let removed = subscribers.len() != before;

        if subscribers.is_empty() {
            channels.remove(channel);
        }

        removed
    }

    /// Offers `message` to every subscriber of `channel` without waiting.
    ///
    /// Returns the number of subscribers the message was offered to, including those
    /// whose queue was full.
    pub async fn publish(&self, channel: &[u8], message: RespValue) -> usize {
        let channels = self.channels.read().await;

        let Some(subscribers) = channels.get(channel) else {
            return 0;
        };

        for subscriber in subscribers {
            match subscriber.sender.try_send(message.clone()) {
                Ok(()) => (),
                Err(TrySendError::Full(_)) => {
                    warn!(
                        "dropping message on channel '{}' for slow subscriber {:?}",
                        String::from_utf8_lossy(channel),
                        subscriber.id
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(
                        "subscriber {:?} on channel '{}' stopped receiving",
                        subscriber.id,
                        String::from_utf8_lossy(channel)
                    );
                }
            }
        }

        subscribers.len()
    }

    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }

    pub async fn subscriber_count(&self, channel: &[u8]) -> usize {
        self.channels
            .read()
            .await
            .get(channel)
            .map_or(0, |subscribers| subscribers.len())
    }
}

impl Default for PubSub {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
