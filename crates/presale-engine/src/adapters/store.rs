//! In-memory purchase request store.
//!
//! Reference implementation of the `RequestStore` port. A single mutex
//! around the whole map makes `commit_round` trivially atomic and
//! `compare_and_set_payment` a true conditional update; a SQL deployment
//! gets the same guarantees from a transaction plus an
//! `UPDATE ... WHERE payment_status = expected` statement.

use crate::domain::admission::{AdmissionDecision, DecisionOutcome};
use crate::domain::errors::Result;
use crate::domain::payment;
use crate::ports::outbound::RequestStore;
use async_trait::async_trait;
use presale_types::{
    PaymentStatus, PurchaseRequest, RequestId, RequestStatus, Timestamp, TokenId, WalletAddress,
};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// In-memory implementation of the shared request store.
#[derive(Default)]
pub struct InMemoryRequestStore {
    requests: Mutex<HashMap<RequestId, PurchaseRequest>>,
}

impl InMemoryRequestStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of requests held.
    pub async fn len(&self) -> usize {
        self.requests.lock().await.len()
    }

    /// True when the store holds no requests.
    pub async fn is_empty(&self) -> bool {
        self.requests.lock().await.is_empty()
    }
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn insert(&self, request: PurchaseRequest) -> Result<()> {
        self.requests.lock().await.insert(request.id, request);
        Ok(())
    }

    async fn get(&self, id: RequestId) -> Result<Option<PurchaseRequest>> {
        Ok(self.requests.lock().await.get(&id).cloned())
    }

    async fn pending_for_token(&self, token_id: &TokenId) -> Result<Vec<PurchaseRequest>> {
        Ok(self
            .requests
            .lock()
            .await
            .values()
            .filter(|r| r.token_id == *token_id && r.status == RequestStatus::Pending)
            .cloned()
            .collect())
    }

    async fn accepted_batches_by_wallet(
        &self,
        token_id: &TokenId,
    ) -> Result<HashMap<WalletAddress, u64>> {
        let requests = self.requests.lock().await;
        let mut totals: HashMap<WalletAddress, u64> = HashMap::new();
        for request in requests.values() {
            if request.token_id == *token_id && request.status == RequestStatus::Accepted {
                *totals.entry(request.wallet_address.clone()).or_insert(0) +=
                    request.batches_purchased;
            }
        }
        Ok(totals)
    }

    async fn accepted_batches_total(&self, token_id: &TokenId) -> Result<u64> {
        Ok(self
            .requests
            .lock()
            .await
            .values()
            .filter(|r| r.token_id == *token_id && r.status == RequestStatus::Accepted)
            .map(|r| r.batches_purchased)
            .sum())
    }

    async fn for_wallet(
        &self,
        token_id: &TokenId,
        wallet_address: &WalletAddress,
    ) -> Result<Vec<PurchaseRequest>> {
        let mut matches: Vec<PurchaseRequest> = self
            .requests
            .lock()
            .await
            .values()
            .filter(|r| r.token_id == *token_id && r.wallet_address == *wallet_address)
            .cloned()
            .collect();
        matches.sort_by_key(|r| r.submitted_at);
        Ok(matches)
    }

    async fn all_for_token(&self, token_id: &TokenId) -> Result<Vec<PurchaseRequest>> {
        Ok(self
            .requests
            .lock()
            .await
            .values()
            .filter(|r| r.token_id == *token_id)
            .cloned()
            .collect())
    }

    async fn commit_round(
        &self,
        token_id: &TokenId,
        round_number: u32,
        decisions: &[AdmissionDecision],
        price_in_sats: u64,
        now: Timestamp,
    ) -> Result<()> {
        // One lock scope = one transaction: all decisions land together.
        let mut requests = self.requests.lock().await;
        for decision in decisions {
            let Some(request) = requests.get_mut(&decision.request_id) else {
                continue;
            };
            // Admission is decided exactly once; a request decided by a
            // concurrent committer is left untouched.
            if request.token_id != *token_id || request.status != RequestStatus::Pending {
                continue;
            }
            request.round_number = Some(round_number);
            request.processed_at = Some(now);
            match &decision.outcome {
                DecisionOutcome::Accepted { batches_granted } => {
                    request.status = RequestStatus::Accepted;
                    if *batches_granted != request.batches_purchased {
                        // Partial grant: reprice to what was actually sold.
                        request.batches_purchased = *batches_granted;
                        request.total_paid =
                            (u128::from(*batches_granted) * u128::from(price_in_sats)).to_string();
                    }
                }
                DecisionOutcome::Rejected { reason } => {
                    request.status = RequestStatus::Rejected;
                    request.rejection_reason = Some(*reason);
                }
            }
        }
        Ok(())
    }

    async fn compare_and_set_payment(
        &self,
        id: RequestId,
        expected: PaymentStatus,
        next: PaymentStatus,
        settlement_txid: Option<String>,
        now: Timestamp,
    ) -> Result<bool> {
        let mut requests = self.requests.lock().await;
        let Some(request) = requests.get_mut(&id) else {
            return Ok(false);
        };
        // Payment status only advances for accepted requests, and only
        // along edges of the state machine.
        if request.status != RequestStatus::Accepted
            || request.payment_status != expected
            || !payment::can_advance(expected, next)
        {
            return Ok(false);
        }
        request.payment_status = next;
        match next {
            PaymentStatus::PaymentRequested => request.payment_requested_at = Some(now),
            PaymentStatus::PaymentSent => request.settlement_txid = settlement_txid,
            _ => {}
        }
        Ok(true)
    }

    async fn payment_requested_before(&self, cutoff: Timestamp) -> Result<Vec<PurchaseRequest>> {
        Ok(self
            .requests
            .lock()
            .await
            .values()
            .filter(|r| {
                r.payment_status == PaymentStatus::PaymentRequested
                    && r.payment_requested_at.is_some_and(|at| at <= cutoff)
            })
            .cloned()
            .collect())
    }
}
