//! Inbound (Driving) port for the presale engine.
//!
//! The transport-agnostic request/response contract a host service (HTTP
//! handler, RPC endpoint, CLI) drives the engine through. Event
//! subscription lives on the bus and is reached via
//! `PresaleService::subscribe`.

use crate::domain::errors::Result;
use async_trait::async_trait;
use presale_types::{
    PaymentStatus, PurchaseRequest, RejectionReason, RequestId, RequestStatus, TokenId,
    WalletAddress,
};
use serde::{Deserialize, Serialize};

/// A purchase submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitPurchase {
    /// The token to buy into.
    pub token_id: TokenId,
    /// The buyer's wallet.
    pub wallet_address: WalletAddress,
    /// Sale batches requested; must be positive.
    pub batches_purchased: u64,
    /// Client-supplied key guaranteeing at-most-once submission under
    /// retries.
    pub idempotency_key: String,
}

/// Acknowledgement of an accepted-for-processing submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    /// The queued request.
    pub request_id: RequestId,
    /// Always `Pending` at submission; admission happens at round close.
    pub status: RequestStatus,
}

/// Point-in-time view of one purchase request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestSummary {
    /// The request.
    pub request_id: RequestId,
    /// Admission outcome so far.
    pub status: RequestStatus,
    /// Payment lifecycle state.
    pub payment_status: PaymentStatus,
    /// Round the request was decided in, if decided.
    pub round_number: Option<u32>,
    /// Why the request was rejected, if rejected.
    pub rejection_reason: Option<RejectionReason>,
    /// Batches the request holds (post-admission this reflects any
    /// partial fill).
    pub batches_purchased: u64,
    /// Total price as a decimal string.
    pub total_paid: String,
}

impl From<&PurchaseRequest> for RequestSummary {
    fn from(req: &PurchaseRequest) -> Self {
        Self {
            request_id: req.id,
            status: req.status,
            payment_status: req.payment_status,
            round_number: req.round_number,
            rejection_reason: req.rejection_reason,
            batches_purchased: req.batches_purchased,
            total_paid: req.total_paid.clone(),
        }
    }
}

/// Aggregate request counts for one token's presale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresaleStats {
    /// Requests awaiting admission.
    pub pending: u64,
    /// Requests accepted.
    pub accepted: u64,
    /// Requests rejected.
    pub rejected: u64,
    /// Accepted requests awaiting a payment request (transient).
    pub payment_pending: u64,
    /// Requests inside their payment window.
    pub payment_requested: u64,
    /// Requests with a reported settlement txid.
    pub payment_sent: u64,
    /// Requests with verified payment.
    pub verified: u64,
    /// Requests whose payment window elapsed.
    pub expired: u64,
    /// Total batches granted to accepted requests.
    pub batches_accepted: u64,
}

/// The operations a host drives the presale engine through.
#[async_trait]
pub trait PresaleApi: Send + Sync {
    /// Queues a purchase request for the token's current round.
    ///
    /// Idempotent on `idempotency_key`: a retry of a completed submission
    /// returns the original receipt verbatim; a retry while the first
    /// attempt is still running yields `OperationInProgress`.
    ///
    /// # Errors
    /// - `Validation` for malformed input (nothing is persisted)
    /// - `TokenNotFound` / `PresaleClosed` when the sale cannot accept
    /// - `OperationInProgress` for a duplicate in-flight key
    async fn submit_purchase(&self, submission: SubmitPurchase) -> Result<SubmitReceipt>;

    /// Records the buyer's settlement txid and attempts verification.
    ///
    /// Advances `payment-requested -> payment-sent`; when the payment
    /// verifier matches the txid and amount, continues to `verified`.
    ///
    /// # Errors
    /// - `RequestNotFound` for an unknown id
    /// - `InvalidTransition` when the request is not awaiting payment
    ///   (e.g. the sweep already expired it)
    async fn report_payment(
        &self,
        request_id: RequestId,
        settlement_txid: String,
    ) -> Result<RequestSummary>;

    /// Current summaries of a wallet's requests for one token.
    async fn query_status(
        &self,
        token_id: &TokenId,
        wallet_address: &WalletAddress,
    ) -> Result<Vec<RequestSummary>>;

    /// Aggregate counts for one token's presale.
    async fn query_stats(&self, token_id: &TokenId) -> Result<PresaleStats>;
}
