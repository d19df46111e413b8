//! # Event Subscriber
//!
//! Receiving side of the presale bus: filtered `Subscription` handles
//! and a `Stream` adapter over the same broadcast channel.

use crate::events::{PresaleEvent, TopicFilter};
use async_trait::async_trait;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::{Arc, RwLock};
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::Stream;
use tracing::debug;

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was closed.
    #[error("Event bus closed")]
    Closed,
}

/// Trait for subscribing to events from the bus.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Subscribe to events matching a filter.
    fn subscribe(&self, filter: TopicFilter) -> Subscription;
}

/// Ties one live consumer to the bus's per-topic subscription counts.
///
/// Both `Subscription` and `EventStream` carry one; whichever form the
/// consumer ends up holding, dropping it releases the topic slot.
struct TopicRegistration {
    subscriptions: Arc<RwLock<HashMap<String, usize>>>,
    topic_key: String,
}

impl Drop for TopicRegistration {
    fn drop(&mut self) {
        let Ok(mut subs) = self.subscriptions.write() else {
            return;
        };
        if let Some(count) = subs.get_mut(&self.topic_key) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                subs.remove(&self.topic_key);
            }
        }
        debug!(topic = %self.topic_key, "Subscription dropped");
    }
}

/// A handle for receiving events that match a filter.
///
/// Dropping the handle detaches it from the bus; a departing subscriber
/// never blocks round processing.
pub struct Subscription {
    receiver: broadcast::Receiver<PresaleEvent>,
    filter: TopicFilter,
    registration: TopicRegistration,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<PresaleEvent>,
        filter: TopicFilter,
        subscriptions: Arc<RwLock<HashMap<String, usize>>>,
        topic_key: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            registration: TopicRegistration {
                subscriptions,
                topic_key,
            },
        }
    }

    /// Receive the next event that matches the filter.
    ///
    /// Returns `None` once the bus has been dropped. A lagged receiver
    /// skips the overwritten events; delivery is at most once.
    pub async fn recv(&mut self) -> Option<PresaleEvent> {
        loop {
            let event = match self.receiver.recv().await {
                Ok(e) => e,
                Err(broadcast::error::RecvError::Closed) => return None,
                Err(broadcast::error::RecvError::Lagged(count)) => {
                    debug!(lagged = count, "Subscriber lagged, some events dropped");
                    continue;
                }
            };

            if self.filter.matches(&event) {
                return Some(event);
            }
        }
    }

    /// Receive without blocking.
    ///
    /// `Ok(None)` means nothing matching is buffered right now;
    /// `Err(Closed)` means the bus is gone.
    pub fn try_recv(&mut self) -> Result<Option<PresaleEvent>, SubscriptionError> {
        loop {
            let event = match self.receiver.try_recv() {
                Ok(e) => e,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            };

            if self.filter.matches(&event) {
                return Ok(Some(event));
            }
        }
    }

    /// The filter this subscription was created with.
    #[must_use]
    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }

    /// Converts the subscription into a [`Stream`] of matching events.
    #[must_use]
    pub fn into_stream(self) -> EventStream {
        EventStream::new(self)
    }
}

/// A `Stream` of matching events over a subscription's channel.
///
/// Built on [`BroadcastStream`], so a pending poll registers the task
/// with the channel and the next publish wakes it. Lagged stretches are
/// logged and skipped, and the stream ends when the bus is dropped.
pub struct EventStream {
    inner: BroadcastStream<PresaleEvent>,
    filter: TopicFilter,
    _registration: TopicRegistration,
}

impl EventStream {
    /// Create a new event stream from a subscription.
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        Self {
            inner: BroadcastStream::new(subscription.receiver),
            filter: subscription.filter,
            _registration: subscription.registration,
        }
    }

    /// The filter this stream was created with.
    #[must_use]
    pub fn filter(&self) -> &TopicFilter {
        &self.filter
    }
}

impl Stream for EventStream {
    type Item = PresaleEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => {
                    if this.filter.matches(&event) {
                        return Poll::Ready(Some(event));
                    }
                }
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(count)))) => {
                    debug!(lagged = count, "Stream subscriber lagged, some events dropped");
                }
                Poll::Ready(None) => return Poll::Ready(None),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
