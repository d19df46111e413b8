//! # Presale Bus - Notification Bus for Presale Lifecycle Events
//!
//! Publishes round and purchase lifecycle events to interested
//! subscribers.
//!
//! ## Delivery Contract
//!
//! - **At-most-once, best-effort**: no backlog, no replay. A subscriber
//!   that lags past the channel capacity loses the oldest events.
//! - **Non-blocking**: join/leave never blocks round processing; a missed
//!   delivery is recoverable only via the engine's polling queries.
//! - **Topic filtering**: subscribers join topics keyed by token id or
//!   wallet address.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │ RoundScheduler│                   │  Subscriber  │
//! │  / Service   │    publish()       │ (token topic)│
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │ Presale Bus  │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use events::{AdmissionSummary, EventTopic, PresaleEvent, TopicFilter};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use subscriber::{EventStream, EventSubscriber, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before lag drops the oldest.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
