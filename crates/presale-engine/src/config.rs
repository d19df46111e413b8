//! Configuration for the presale engine.

use crate::domain::admission::OversizePolicy;
use serde::{Deserialize, Serialize};

/// Engine configuration.
///
/// One instance is shared by the schedulers, the sweeper, and the service.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Length of one presale round in seconds.
    pub round_duration_secs: u64,
    /// Payment window after admission before the sweep expires a request.
    pub payment_timeout_secs: u64,
    /// Interval between sweep passes.
    pub sweep_interval_secs: u64,
    /// Lifetime of an idempotency record.
    pub idempotency_ttl_secs: u64,
    /// Per-attempt advisory lock acquisition timeout in milliseconds.
    pub lock_acquire_timeout_ms: u64,
    /// Round-close attempts before leaving requests for the next round.
    pub lock_retry_attempts: u32,
    /// Base backoff between round-close attempts, doubled each retry.
    pub lock_retry_backoff_ms: u64,
    /// How an oversized request is admitted when it does not fully fit.
    pub oversize_policy: OversizePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            round_duration_secs: 60,
            payment_timeout_secs: 30,
            sweep_interval_secs: 5,
            idempotency_ttl_secs: 86_400,
            lock_acquire_timeout_ms: 5_000,
            lock_retry_attempts: 3,
            lock_retry_backoff_ms: 250,
            oversize_policy: OversizePolicy::RejectOutright,
        }
    }
}

impl EngineConfig {
    /// Payment window in milliseconds.
    #[must_use]
    pub fn payment_timeout_ms(&self) -> u64 {
        self.payment_timeout_secs * 1_000
    }

    /// Idempotency record lifetime in milliseconds.
    #[must_use]
    pub fn idempotency_ttl_ms(&self) -> u64 {
        self.idempotency_ttl_secs * 1_000
    }
}
