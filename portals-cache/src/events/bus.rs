//! `EventBus` - In-process publish/subscribe channel
//!
//! `TigerStyle`: Typed events, handle-based subscriptions. Dropping a
//! `Subscription` (or calling `unsubscribe`) ends it; there is no tag
//! bookkeeping.

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};

use super::event::ChangeEvent;
use crate::config::CacheConfig;
use crate::constants::{EVENT_CHANNEL_CAPACITY_MAX, EVENT_CHANNEL_NAME};

/// Broadcast channel of change events.
///
/// Cheap to clone; clones publish into the same channel.
#[derive(Debug, Clone)]
pub struct EventBus {
    name: &'static str,
    sender: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    /// Create a bus buffering `capacity` events per subscriber.
    ///
    /// # Panics
    /// Panics if `capacity` is zero or above `EVENT_CHANNEL_CAPACITY_MAX`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        // Precondition
        assert!(
            (1..=EVENT_CHANNEL_CAPACITY_MAX).contains(&capacity),
            "capacity must be in [1, {EVENT_CHANNEL_CAPACITY_MAX}], got {capacity}"
        );

        let (sender, _) = broadcast::channel(capacity);
        Self {
            name: EVENT_CHANNEL_NAME,
            sender,
        }
    }

    /// Create a bus sized from `config`.
    #[must_use]
    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.event_channel_capacity)
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Publish an event; returns how many subscribers will see it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        match self.sender.send(event) {
            Ok(receivers) => receivers,
            Err(broadcast::error::SendError(event)) => {
                tracing::trace!(channel = self.name, id = %event.id, "no subscribers");
                0
            }
        }
    }

    /// Start receiving events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            channel: self.name,
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A live subscription.
#[derive(Debug)]
pub struct Subscription {
    channel: &'static str,
    receiver: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    /// Next event; `None` once every publisher is gone.
    ///
    /// Events missed because this subscriber lagged are skipped with a
    /// warning.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(channel = self.channel, missed, "subscriber lagged, events skipped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-published event, without waiting.
    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(TryRecvError::Lagged(missed)) => {
                    tracing::warn!(channel = self.channel, missed, "subscriber lagged, events skipped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// End the subscription.
    pub fn unsubscribe(self) {
        tracing::trace!(channel = self.channel, "unsubscribed");
    }
}
