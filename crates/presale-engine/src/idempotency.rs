//! Idempotent operation wrapper.
//!
//! `run_once` is the single entry point every retried client operation
//! goes through: the first caller to claim a (key, route, scope) tuple
//! runs the wrapped operation; concurrent callers get a conflict signal;
//! later callers get the stored result replayed verbatim.

use crate::domain::errors::{EngineError, Result};
use crate::ports::outbound::{BeginOutcome, IdempotencyBackend, StoredResponse, TimeSource};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Deduplicates client-submitted operations keyed by (key, route, scope).
pub struct IdempotencyStore {
    backend: Arc<dyn IdempotencyBackend>,
    time: Arc<dyn TimeSource>,
    ttl_ms: u64,
}

impl IdempotencyStore {
    /// Creates a store over a backend with a record lifetime.
    #[must_use]
    pub fn new(backend: Arc<dyn IdempotencyBackend>, time: Arc<dyn TimeSource>, ttl_ms: u64) -> Self {
        Self {
            backend,
            time,
            ttl_ms,
        }
    }

    /// Runs `operation` at most once per (key, route, scope) tuple.
    ///
    /// - First sight: the operation runs and its result is cached.
    /// - Same tuple while in progress: `OperationInProgress`; the caller
    ///   retries after a short delay, the operation is not re-run.
    /// - After completion: the stored result is returned verbatim.
    ///
    /// A failed operation releases the tuple so a retry can run it again.
    pub async fn run_once<F, Fut>(
        &self,
        key: &str,
        route: &str,
        scope: &str,
        operation: F,
    ) -> Result<StoredResponse>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<StoredResponse>>,
    {
        let now = self.time.now();
        match self.backend.begin(key, route, scope, now, self.ttl_ms).await? {
            BeginOutcome::InProgress => Err(EngineError::OperationInProgress {
                key: key.to_string(),
            }),
            BeginOutcome::Completed(stored) => {
                debug!(key, route, scope, "Replaying stored idempotent response");
                Ok(stored)
            }
            BeginOutcome::Started => match operation().await {
                Ok(response) => {
                    self.backend.complete(key, route, scope, &response).await?;
                    Ok(response)
                }
                Err(err) => {
                    // Release the claim; the retry must be able to re-run.
                    self.backend.abandon(key, route, scope).await?;
                    Err(err)
                }
            },
        }
    }

    /// Reclaims expired records; returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        self.backend.purge_expired(self.time.now()).await
    }
}
