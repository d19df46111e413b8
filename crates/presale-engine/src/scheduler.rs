//! Per-token round scheduling.
//!
//! Each actively-presaling token runs one scheduler task cycling through
//! Idle → Countdown → Closing → Settling → Idle. The task owns nothing
//! but timing: countdown ticks are published once per second, and at zero
//! the round is closed through [`PresaleService::close_round`], which
//! does the lock-evaluate-commit-settle work. Schedulers are independent;
//! one token's round never blocks another's.

use crate::config::EngineConfig;
use crate::domain::errors::EngineError;
use crate::service::PresaleService;
use presale_bus::{EventPublisher, PresaleEvent};
use presale_types::TokenId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Handle to one token's running scheduler task.
///
/// Obtained from [`PresaleService::start_presale`]; kept in the service's
/// token → handle table, never in ambient global state.
pub struct SchedulerHandle {
    token_id: TokenId,
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// The token this scheduler drives.
    #[must_use]
    pub fn token_id(&self) -> &TokenId {
        &self.token_id
    }

    /// Whether the task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops the scheduler.
    ///
    /// Countdown ticks stop immediately. In-flight payment-requested
    /// requests are not cancelled; they still resolve via the timeout
    /// sweep.
    pub fn stop(self) {
        self.stop.store(true, Ordering::SeqCst);
        self.task.abort();
        info!(token = %self.token_id, "[scheduler] Round scheduler stopped");
    }
}

/// Spawns the round scheduler task for one token.
pub(crate) fn spawn(
    service: Arc<PresaleService>,
    token_id: TokenId,
    config: EngineConfig,
) -> SchedulerHandle {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_flag = Arc::clone(&stop);
    let token = token_id.clone();

    let task = tokio::task::spawn(async move {
        info!(token = %token, "[scheduler] Round scheduler started");
        run_rounds(service, token, config, stop_flag).await;
    });

    SchedulerHandle {
        token_id,
        stop,
        task,
    }
}

/// The scheduler loop: one iteration per round.
async fn run_rounds(
    service: Arc<PresaleService>,
    token_id: TokenId,
    config: EngineConfig,
    stop: Arc<AtomicBool>,
) {
    let mut round_number: u32 = 1;

    'rounds: while !stop.load(Ordering::SeqCst) {
        // Idle: wait out a closed presale without ticking.
        match service.presale_open(&token_id).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(token = %token_id, "[scheduler] Presale closed, idling");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
            Err(err) => {
                warn!(token = %token_id, error = %err, "[scheduler] Registry lookup failed, idling");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        }

        // Countdown: one tick per second carrying remaining seconds.
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The interval's first tick resolves immediately; consume it so
        // the loop below waits a full second between ticks.
        ticker.tick().await;
        let mut remaining = config.round_duration_secs;
        while remaining > 0 {
            if stop.load(Ordering::SeqCst) {
                break 'rounds;
            }
            // Disabling the presale mid-round parks the scheduler without
            // closing; pending requests carry over to the next open round.
            match service.presale_open(&token_id).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(token = %token_id, round = round_number, "[scheduler] Presale disabled mid-countdown, idling");
                    continue 'rounds;
                }
                Err(err) => {
                    warn!(token = %token_id, error = %err, "[scheduler] Registry lookup failed mid-countdown");
                }
            }
            service
                .bus()
                .publish(PresaleEvent::RoundCountdown {
                    token_id: token_id.clone(),
                    round_number,
                    seconds_remaining: remaining,
                })
                .await;
            ticker.tick().await;
            remaining -= 1;
        }

        // Closing + Settling, with bounded backoff on retriable failures.
        // Evaluation and persistence happen in one lock-protected
        // transaction, so a failed attempt leaves the round's requests
        // pending for the next one.
        let mut attempt: u32 = 0;
        loop {
            match service.close_round(&token_id, round_number).await {
                Ok(summary) => {
                    info!(
                        token = %token_id,
                        round = round_number,
                        accepted = summary.accepted,
                        rejected = summary.rejected,
                        batches_sold = summary.batches_sold,
                        "[scheduler] Round settled"
                    );
                    break;
                }
                Err(err @ (EngineError::LockTimeout { .. } | EngineError::Storage(_)))
                    if attempt + 1 < config.lock_retry_attempts =>
                {
                    let backoff =
                        Duration::from_millis(config.lock_retry_backoff_ms << attempt);
                    warn!(
                        token = %token_id,
                        round = round_number,
                        error = %err,
                        ?backoff,
                        "[scheduler] Round close failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(
                        token = %token_id,
                        round = round_number,
                        error = %err,
                        "[scheduler] Round close abandoned, requests stay pending"
                    );
                    break;
                }
            }
        }

        round_number += 1;
    }

    info!(token = %token_id, "[scheduler] Round scheduler loop exited");
}
