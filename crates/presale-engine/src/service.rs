//! The presale service.
//!
//! Wires the domain rules to the outbound ports and exposes the inbound
//! [`PresaleApi`]. Submission is validated synchronously and deduplicated
//! through the idempotency store; round close runs under the token's
//! advisory lock; payment reporting and verification drive the
//! compare-and-set transitions. The service also owns the per-token
//! scheduler handles.

use crate::config::EngineConfig;
use crate::domain::admission;
use crate::domain::errors::{EngineError, Result};
use crate::domain::lock::derive_lock_key;
use crate::idempotency::IdempotencyStore;
use crate::ports::inbound::{PresaleApi, PresaleStats, RequestSummary, SubmitPurchase, SubmitReceipt};
use crate::ports::outbound::{
    IdempotencyBackend, LockManager, PaymentVerifier, RequestStore, StoredResponse, TimeSource,
    TokenRegistry,
};
use crate::scheduler::{self, SchedulerHandle};
use crate::sweeper::PaymentSweeper;
use async_trait::async_trait;
use presale_bus::{
    AdmissionSummary, EventPublisher, InMemoryEventBus, PresaleEvent, Subscription, TopicFilter,
};
use presale_types::{
    PaymentStatus, PurchaseRequest, RequestId, RequestStatus, TokenId, TokenPresaleConfig,
    ValidationError, WalletAddress,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Orchestrates submission, round close, payment tracking, and events.
pub struct PresaleService {
    store: Arc<dyn RequestStore>,
    locks: Arc<dyn LockManager>,
    registry: Arc<dyn TokenRegistry>,
    verifier: Arc<dyn PaymentVerifier>,
    idempotency: Arc<IdempotencyStore>,
    time: Arc<dyn TimeSource>,
    bus: Arc<InMemoryEventBus>,
    config: EngineConfig,
    schedulers: Mutex<HashMap<TokenId, SchedulerHandle>>,
}

impl PresaleService {
    /// Wires a service from its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn RequestStore>,
        locks: Arc<dyn LockManager>,
        registry: Arc<dyn TokenRegistry>,
        verifier: Arc<dyn PaymentVerifier>,
        idempotency_backend: Arc<dyn IdempotencyBackend>,
        time: Arc<dyn TimeSource>,
        config: EngineConfig,
    ) -> Self {
        let idempotency = Arc::new(IdempotencyStore::new(
            idempotency_backend,
            Arc::clone(&time),
            config.idempotency_ttl_ms(),
        ));
        Self {
            store,
            locks,
            registry,
            verifier,
            idempotency,
            time,
            bus: Arc::new(InMemoryEventBus::new()),
            config,
            schedulers: Mutex::new(HashMap::new()),
        }
    }

    /// The lifecycle event bus.
    #[must_use]
    pub fn bus(&self) -> &InMemoryEventBus {
        &self.bus
    }

    /// Subscribes to lifecycle events matching a filter.
    #[must_use]
    pub fn subscribe(&self, filter: TopicFilter) -> Subscription {
        self.bus.subscribe(filter)
    }

    /// The engine configuration this service runs with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Builds the payment sweeper over this service's collaborators.
    #[must_use]
    pub fn payment_sweeper(&self) -> PaymentSweeper {
        PaymentSweeper::new(
            Arc::clone(&self.store),
            Arc::clone(&self.idempotency),
            Arc::clone(&self.time),
            self.config.clone(),
        )
    }

    /// Whether the token's presale is currently open.
    ///
    /// # Errors
    /// `TokenNotFound` for a token the registry does not know.
    pub async fn presale_open(&self, token_id: &TokenId) -> Result<bool> {
        let config = self.token_config(token_id).await?;
        Ok(config.is_presale)
    }

    /// Starts the round scheduler for a token. A second start while the
    /// scheduler is running is a no-op.
    pub async fn start_presale(self: &Arc<Self>, token_id: &TokenId) -> Result<()> {
        // Fail fast on unknown tokens instead of spawning an idle loop.
        self.token_config(token_id).await?;

        let mut schedulers = self.schedulers.lock().await;
        if let Some(handle) = schedulers.get(token_id) {
            if handle.is_running() {
                debug!(token = %token_id, "Scheduler already running");
                return Ok(());
            }
        }
        schedulers.insert(
            token_id.clone(),
            scheduler::spawn(Arc::clone(self), token_id.clone(), self.config.clone()),
        );
        Ok(())
    }

    /// Stops a token's round scheduler; returns whether one was running.
    pub async fn stop_presale(&self, token_id: &TokenId) -> bool {
        let handle = self.schedulers.lock().await.remove(token_id);
        match handle {
            Some(handle) => {
                handle.stop();
                true
            }
            None => false,
        }
    }

    /// Closes one round for a token: evaluates every pending request under
    /// the token's advisory lock, commits the decisions atomically, opens
    /// payment windows for the accepted, and publishes the outcome.
    ///
    /// Serialized per token across processes by the lock; concurrent
    /// closers for the same token line up behind it and find no pending
    /// requests left to decide.
    ///
    /// # Errors
    /// - `TokenNotFound` for an unregistered token
    /// - `LockTimeout` when the advisory lock stays contended
    /// - `Storage` when the commit fails (requests stay pending)
    pub async fn close_round(
        &self,
        token_id: &TokenId,
        round_number: u32,
    ) -> Result<AdmissionSummary> {
        let token_config = self.token_config(token_id).await?;

        let key = derive_lock_key(token_id);
        let _guard = self
            .locks
            .acquire(key, Duration::from_millis(self.config.lock_acquire_timeout_ms))
            .await?;

        let pending = self.store.pending_for_token(token_id).await?;
        let sold = self.store.accepted_batches_total(token_id).await?;
        let remaining_supply = token_config.presale_batch_amount.saturating_sub(sold);
        let accepted_per_wallet = self.store.accepted_batches_by_wallet(token_id).await?;

        let decisions = admission::evaluate(
            &pending,
            remaining_supply,
            &accepted_per_wallet,
            token_config.max_purchases_per_wallet,
            self.config.oversize_policy,
        );

        let now = self.time.now();
        self.store
            .commit_round(
                token_id,
                round_number,
                &decisions,
                token_config.price_in_sats,
                now,
            )
            .await?;

        // Open the payment window for every accepted request and announce
        // each rejection. The commit already happened; these are follow-on
        // effects outside the all-or-nothing scope.
        for decision in &decisions {
            match &decision.outcome {
                admission::DecisionOutcome::Accepted { .. } => {
                    self.store
                        .compare_and_set_payment(
                            decision.request_id,
                            PaymentStatus::Pending,
                            PaymentStatus::PaymentRequested,
                            None,
                            now,
                        )
                        .await?;
                }
                admission::DecisionOutcome::Rejected { reason } => {
                    self.bus
                        .publish(PresaleEvent::PurchaseRejected {
                            request_id: decision.request_id,
                            token_id: token_id.clone(),
                            wallet_address: decision.wallet_address.clone(),
                            reason: *reason,
                        })
                        .await;
                }
            }
        }

        let summary = admission::summarize(&decisions, remaining_supply);
        info!(
            token = %token_id,
            round = round_number,
            accepted = summary.accepted,
            rejected = summary.rejected,
            batches_sold = summary.batches_sold,
            remaining = summary.remaining_supply,
            "Round closed"
        );
        self.bus
            .publish(PresaleEvent::RoundCompleted {
                token_id: token_id.clone(),
                round_number,
                summary: summary.clone(),
            })
            .await;

        Ok(summary)
    }

    async fn token_config(&self, token_id: &TokenId) -> Result<TokenPresaleConfig> {
        self.registry
            .presale_config(token_id)
            .await?
            .ok_or_else(|| EngineError::TokenNotFound(token_id.clone()))
    }

    fn validate(submission: &SubmitPurchase) -> std::result::Result<(), ValidationError> {
        if !submission.token_id.is_well_formed() {
            return Err(ValidationError::MalformedTokenId(
                submission.token_id.as_hex().to_string(),
            ));
        }
        if submission.wallet_address.0.is_empty() {
            return Err(ValidationError::MissingWalletAddress);
        }
        if submission.batches_purchased == 0 {
            return Err(ValidationError::NonPositiveBatches(
                submission.batches_purchased,
            ));
        }
        if submission.idempotency_key.is_empty() {
            return Err(ValidationError::MissingIdempotencyKey);
        }
        Ok(())
    }
}

#[async_trait]
impl PresaleApi for PresaleService {
    async fn submit_purchase(&self, submission: SubmitPurchase) -> Result<SubmitReceipt> {
        Self::validate(&submission)?;

        let store = Arc::clone(&self.store);
        let registry = Arc::clone(&self.registry);
        let now = self.time.now();
        let token_id = submission.token_id.clone();
        let wallet_address = submission.wallet_address.clone();
        let batches = submission.batches_purchased;
        let scope = submission.wallet_address.0.clone();

        // The idempotency store decides first: a completed tuple replays
        // its stored receipt even if the presale has since closed or the
        // token was dropped from the registry. The registry checks run
        // inside the wrapped operation, and a refusal releases the tuple
        // for a later retry.
        let response = self
            .idempotency
            .run_once(&submission.idempotency_key, "submit_purchase", &scope, move || async move {
                let token_config = registry
                    .presale_config(&token_id)
                    .await?
                    .ok_or_else(|| EngineError::TokenNotFound(token_id.clone()))?;
                if !token_config.is_presale {
                    return Err(EngineError::PresaleClosed(token_id.clone()));
                }

                // Price at submission from the registry's current batch
                // price; u128 keeps the product exact for any plausible
                // sale.
                let total_paid =
                    (u128::from(token_config.price_in_sats) * u128::from(batches)).to_string();

                let request =
                    PurchaseRequest::new(token_id, wallet_address, batches, total_paid, now);
                let receipt = SubmitReceipt {
                    request_id: request.id,
                    status: request.status,
                };
                debug!(request_id = %request.id, "Purchase request queued");
                store.insert(request).await?;
                let body = serde_json::to_value(&receipt)
                    .map_err(|e| EngineError::Internal(format!("receipt serialization: {e}")))?;
                Ok(StoredResponse {
                    status_code: 201,
                    body,
                })
            })
            .await?;

        serde_json::from_value(response.body)
            .map_err(|e| EngineError::Internal(format!("stored receipt corrupt: {e}")))
    }

    async fn report_payment(
        &self,
        request_id: RequestId,
        settlement_txid: String,
    ) -> Result<RequestSummary> {
        let request = self
            .store
            .get(request_id)
            .await?
            .ok_or(EngineError::RequestNotFound(request_id))?;

        let now = self.time.now();
        let won = self
            .store
            .compare_and_set_payment(
                request_id,
                PaymentStatus::PaymentRequested,
                PaymentStatus::PaymentSent,
                Some(settlement_txid.clone()),
                now,
            )
            .await?;
        if !won {
            // Re-read for the state the caller actually raced against.
            let current = self
                .store
                .get(request_id)
                .await?
                .ok_or(EngineError::RequestNotFound(request_id))?;
            return Err(EngineError::InvalidTransition {
                from: current.payment_status,
                to: PaymentStatus::PaymentSent,
            });
        }

        match self
            .verifier
            .verify(&request.wallet_address, &request.token_id, &settlement_txid)
            .await?
        {
            Some(amount) if amount == request.total_paid => {
                let verified = self
                    .store
                    .compare_and_set_payment(
                        request_id,
                        PaymentStatus::PaymentSent,
                        PaymentStatus::Verified,
                        None,
                        self.time.now(),
                    )
                    .await?;
                if verified {
                    info!(
                        request_id = %request_id,
                        token = %request.token_id,
                        "Payment verified"
                    );
                    self.bus
                        .publish(PresaleEvent::PurchaseConfirmed {
                            request_id,
                            token_id: request.token_id.clone(),
                            wallet_address: request.wallet_address.clone(),
                            batches_purchased: request.batches_purchased,
                        })
                        .await;
                }
            }
            Some(amount) => {
                warn!(
                    request_id = %request_id,
                    expected = %request.total_paid,
                    paid = %amount,
                    "Settlement amount mismatch, staying payment-sent"
                );
            }
            None => {
                debug!(
                    request_id = %request_id,
                    txid = %settlement_txid,
                    "Settlement txid not found yet, staying payment-sent"
                );
            }
        }

        let fresh = self
            .store
            .get(request_id)
            .await?
            .ok_or(EngineError::RequestNotFound(request_id))?;
        Ok(RequestSummary::from(&fresh))
    }

    async fn query_status(
        &self,
        token_id: &TokenId,
        wallet_address: &WalletAddress,
    ) -> Result<Vec<RequestSummary>> {
        let requests = self.store.for_wallet(token_id, wallet_address).await?;
        Ok(requests.iter().map(RequestSummary::from).collect())
    }

    async fn query_stats(&self, token_id: &TokenId) -> Result<PresaleStats> {
        let requests = self.store.all_for_token(token_id).await?;
        let mut stats = PresaleStats::default();
        for request in &requests {
            match request.status {
                RequestStatus::Pending => stats.pending += 1,
                RequestStatus::Rejected => stats.rejected += 1,
                RequestStatus::Accepted => {
                    stats.accepted += 1;
                    stats.batches_accepted += request.batches_purchased;
                    match request.payment_status {
                        PaymentStatus::Pending => stats.payment_pending += 1,
                        PaymentStatus::PaymentRequested => stats.payment_requested += 1,
                        PaymentStatus::PaymentSent => stats.payment_sent += 1,
                        PaymentStatus::Verified => stats.verified += 1,
                        PaymentStatus::Expired => stats.expired += 1,
                    }
                }
            }
        }
        Ok(stats)
    }
}
