//! Payment timeout sweep.
//!
//! A background task that periodically expires accepted requests whose
//! payment window elapsed without a reported settlement, and reclaims
//! expired idempotency records while it is at it. Each expiry is a
//! compare-and-set from `payment-requested`, so a client racing the sweep
//! with a payment report resolves to exactly one winner.

use crate::config::EngineConfig;
use crate::domain::errors::Result;
use crate::domain::payment;
use crate::idempotency::IdempotencyStore;
use crate::ports::outbound::{RequestStore, TimeSource};
use presale_types::PaymentStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Expires overdue payment windows and purges stale idempotency records.
pub struct PaymentSweeper {
    store: Arc<dyn RequestStore>,
    idempotency: Arc<IdempotencyStore>,
    time: Arc<dyn TimeSource>,
    config: EngineConfig,
}

/// Handle to the running sweep task.
pub struct SweeperHandle {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Whether the task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the sweep task.
    pub fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        self.task.abort();
        info!("[sweeper] Payment sweep stopped");
    }
}

impl PaymentSweeper {
    /// Creates a sweeper over the shared store and idempotency records.
    #[must_use]
    pub fn new(
        store: Arc<dyn RequestStore>,
        idempotency: Arc<IdempotencyStore>,
        time: Arc<dyn TimeSource>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            idempotency,
            time,
            config,
        }
    }

    /// One sweep pass; returns how many requests were expired.
    ///
    /// Safe to run concurrently with other passes and with client payment
    /// reports: every expiry is a conditional write from
    /// `payment-requested`, and a lost race is a no-op.
    pub async fn sweep_once(&self) -> Result<u64> {
        let now = self.time.now();
        let window_ms = self.config.payment_timeout_ms();
        let cutoff = now.saturating_sub(window_ms);

        let candidates = self.store.payment_requested_before(cutoff).await?;
        let mut expired: u64 = 0;
        for request in candidates {
            if !payment::is_due_for_expiry(&request, now, window_ms) {
                continue;
            }
            let won = self
                .store
                .compare_and_set_payment(
                    request.id,
                    PaymentStatus::PaymentRequested,
                    PaymentStatus::Expired,
                    None,
                    now,
                )
                .await?;
            if won {
                expired += 1;
                debug!(
                    request_id = %request.id,
                    token = %request.token_id,
                    "[sweeper] Payment window elapsed, request expired"
                );
            }
        }

        let purged = self.idempotency.purge_expired().await?;
        if expired > 0 || purged > 0 {
            info!(expired, purged, "[sweeper] Sweep pass complete");
        }
        Ok(expired)
    }

    /// Spawns the periodic sweep task.
    pub fn spawn(self: Arc<Self>) -> SweeperHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);
        let interval = Duration::from_secs(self.config.sweep_interval_secs);

        let task = tokio::task::spawn(async move {
            info!(?interval, "[sweeper] Payment sweep started");
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if stop_flag.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(err) = self.sweep_once().await {
                    warn!(error = %err, "[sweeper] Sweep pass failed");
                }
            }
        });

        SweeperHandle { stop, task }
    }
}
