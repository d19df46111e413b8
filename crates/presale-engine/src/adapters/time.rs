//! Manually driven time source.
//!
//! Lets tests and simulations control the clock the engine reads, so
//! payment windows and idempotency expiry can be exercised without real
//! sleeps.

use crate::ports::outbound::TimeSource;
use presale_types::Timestamp;
use std::sync::atomic::{AtomicU64, Ordering};

/// A `TimeSource` whose clock only moves when told to.
#[derive(Debug, Default)]
pub struct ManualTimeSource {
    now_ms: AtomicU64,
}

impl ManualTimeSource {
    /// Creates a clock at `start_ms`.
    #[must_use]
    pub fn starting_at(start_ms: Timestamp) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, delta_ms: u64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// Sets the clock to an absolute instant.
    pub fn set(&self, now_ms: Timestamp) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Timestamp {
        self.now_ms.load(Ordering::SeqCst)
    }
}
