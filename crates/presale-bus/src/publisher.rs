//! # Event Publisher
//!
//! Emitting side of the presale bus. The scheduler, sweeper, and service
//! publish here; delivery to subscribers is at most once and best effort,
//! with polling queries as the recovery path for anything missed.

use crate::events::{PresaleEvent, TopicFilter};
use crate::subscriber::{EventStream, Subscription};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Publishing interface for presale lifecycle events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event, returning how many subscribers received it.
    async fn publish(&self, event: PresaleEvent) -> usize;

    /// Total events published over the bus's lifetime.
    fn events_published(&self) -> u64;
}

/// Broadcast-backed bus for single-node operation.
///
/// A distributed deployment substitutes another `EventPublisher` over an
/// external broker; nothing in the engine assumes this one.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<PresaleEvent>,
    /// Live subscription counts keyed by topic, for introspection.
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    events_published: AtomicU64,
    capacity: usize,
}

impl InMemoryEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// A bus whose channel buffers `capacity` events per subscriber
    /// before slow consumers start lagging.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            subscriptions: Arc::new(RwLock::new(HashMap::new())),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Opens a filtered subscription.
    ///
    /// Joining or leaving never blocks round processing.
    #[must_use]
    pub fn subscribe(&self, filter: TopicFilter) -> Subscription {
        let receiver = self.sender.subscribe();
        let topic_key = format!("{:?}", filter.topics);

        if let Ok(mut subs) = self.subscriptions.write() {
            *subs.entry(topic_key.clone()).or_insert(0) += 1;
        }
        debug!(topics = ?filter.topics, "New subscription created");

        Subscription::new(receiver, filter, self.subscriptions.clone(), topic_key)
    }

    /// Opens a filtered subscription as a [`Stream`](tokio_stream::Stream).
    #[must_use]
    pub fn event_stream(&self, filter: TopicFilter) -> EventStream {
        self.subscribe(filter).into_stream()
    }

    /// Number of receivers currently attached to the channel.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: PresaleEvent) -> usize {
        let token = event.token_id().clone();
        // Counts attempts, not deliveries.
        self.events_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(event) {
            Ok(receiver_count) => {
                debug!(token = %token, receivers = receiver_count, "Event published");
                receiver_count
            }
            Err(e) => {
                warn!(token = %token, error = %e, "Event dropped (no receivers)");
                0
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}
