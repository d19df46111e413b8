//! Outbound (Driven) ports for the presale engine.
//!
//! These traits define the engine's dependencies on external systems: the
//! shared request store, the advisory lock primitive, the token registry,
//! the payment verifier, the idempotency backend, and a time source
//! abstracted for deterministic tests.

use crate::domain::admission::AdmissionDecision;
use crate::domain::errors::Result;
use crate::domain::lock::LockKey;
use async_trait::async_trait;
use presale_types::{
    PaymentStatus, PurchaseRequest, RequestId, Timestamp, TokenId, TokenPresaleConfig,
    WalletAddress,
};
use std::collections::HashMap;
use std::time::Duration;

/// Handle to a held advisory lock.
///
/// The lock is transaction-scoped: it is released when the guard drops,
/// whether the protected work committed or failed.
pub struct LockGuard {
    _inner: Box<dyn Send + Sync>,
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard").finish_non_exhaustive()
    }
}

impl LockGuard {
    /// Wraps whatever release-on-drop token the lock backend hands out.
    #[must_use]
    pub fn new(inner: impl Send + Sync + 'static) -> Self {
        Self {
            _inner: Box::new(inner),
        }
    }
}

/// Cross-process mutual exclusion keyed by a pair of signed 32-bit
/// integers.
///
/// Guarantee required of implementations: at most one holder per key pair
/// across all processes, released automatically when the guard drops. A
/// SQL-backed deployment maps this onto its transaction-scoped advisory
/// lock primitive.
#[async_trait]
pub trait LockManager: Send + Sync {
    /// Blocks until the exclusive lock for `key` is held, up to `timeout`.
    ///
    /// # Errors
    /// `LockTimeout` when the lock stays contended past the timeout; the
    /// scheduler retries with bounded backoff.
    async fn acquire(&self, key: LockKey, timeout: Duration) -> Result<LockGuard>;
}

/// The shared purchase request store.
///
/// Shared across all process instances; `commit_round` must apply its
/// decision set atomically (all or nothing), and `compare_and_set_payment`
/// must be atomic so the sweep and a client-driven transition cannot both
/// win.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Persists a freshly submitted request.
    async fn insert(&self, request: PurchaseRequest) -> Result<()>;

    /// Fetches one request by id.
    async fn get(&self, id: RequestId) -> Result<Option<PurchaseRequest>>;

    /// All requests still awaiting admission for a token.
    async fn pending_for_token(&self, token_id: &TokenId) -> Result<Vec<PurchaseRequest>>;

    /// Batches already accepted per wallet for a token (earlier rounds).
    async fn accepted_batches_by_wallet(
        &self,
        token_id: &TokenId,
    ) -> Result<HashMap<WalletAddress, u64>>;

    /// Total batches already accepted for a token.
    async fn accepted_batches_total(&self, token_id: &TokenId) -> Result<u64>;

    /// A wallet's requests for one token.
    async fn for_wallet(
        &self,
        token_id: &TokenId,
        wallet_address: &WalletAddress,
    ) -> Result<Vec<PurchaseRequest>>;

    /// Every request for one token.
    async fn all_for_token(&self, token_id: &TokenId) -> Result<Vec<PurchaseRequest>>;

    /// Atomically applies one round's admission decisions.
    ///
    /// Stamps status, round number, rejection reason, granted batch count,
    /// and `processed_at` on every decided request that is still pending;
    /// a request already decided elsewhere is skipped. A partial grant
    /// restamps `batches_purchased` and reprices `total_paid` from
    /// `price_in_sats`. All updates commit together or not at all.
    async fn commit_round(
        &self,
        token_id: &TokenId,
        round_number: u32,
        decisions: &[AdmissionDecision],
        price_in_sats: u64,
        now: Timestamp,
    ) -> Result<()>;

    /// Atomic conditional payment transition: updates only if the current
    /// payment status equals `expected`.
    ///
    /// Returns whether this caller won; a `false` result is the losing
    /// writer's no-op, not an error. Side effects by target state: moving
    /// to `PaymentRequested` stamps `payment_requested_at = now`; moving
    /// to `PaymentSent` records `settlement_txid`.
    async fn compare_and_set_payment(
        &self,
        id: RequestId,
        expected: PaymentStatus,
        next: PaymentStatus,
        settlement_txid: Option<String>,
        now: Timestamp,
    ) -> Result<bool>;

    /// Requests still in `PaymentRequested` whose window opened at or
    /// before `cutoff`.
    async fn payment_requested_before(&self, cutoff: Timestamp) -> Result<Vec<PurchaseRequest>>;
}

/// Read-only access to per-token sale parameters, owned by the token
/// registry collaborator.
#[async_trait]
pub trait TokenRegistry: Send + Sync {
    /// The token's presale configuration, or `None` for an unknown token.
    async fn presale_config(&self, token_id: &TokenId) -> Result<Option<TokenPresaleConfig>>;
}

/// External payment verification collaborator.
#[async_trait]
pub trait PaymentVerifier: Send + Sync {
    /// Looks up the settlement txid and returns the amount it paid to the
    /// sale (as a decimal string), or `None` when the txid is not found.
    async fn verify(
        &self,
        wallet_address: &WalletAddress,
        token_id: &TokenId,
        settlement_txid: &str,
    ) -> Result<Option<String>>;
}

/// A completed operation's cached result, replayed verbatim on retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredResponse {
    /// Status code of the original completion.
    pub status_code: u16,
    /// Serialized response body of the original completion.
    pub body: serde_json::Value,
}

/// Outcome of claiming an idempotency tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BeginOutcome {
    /// This caller owns the tuple; run the operation.
    Started,
    /// Another caller is mid-operation on the same tuple.
    InProgress,
    /// The operation already completed; replay the stored result.
    Completed(StoredResponse),
}

/// Backend for idempotency records, unique on (key, route, scope).
///
/// The uniqueness constraint is the sole mechanism preventing two
/// operations from running concurrently for the same tuple: an insert
/// that collides means another instance got there first, and `begin`
/// resolves it by reading the existing record rather than failing.
#[async_trait]
pub trait IdempotencyBackend: Send + Sync {
    /// Claims the tuple, creating an in-progress record on first sight.
    /// Records past their expiry are treated as absent.
    async fn begin(
        &self,
        key: &str,
        route: &str,
        scope: &str,
        now: Timestamp,
        ttl_ms: u64,
    ) -> Result<BeginOutcome>;

    /// Marks the tuple completed with its result.
    async fn complete(
        &self,
        key: &str,
        route: &str,
        scope: &str,
        response: &StoredResponse,
    ) -> Result<()>;

    /// Releases a claimed tuple after the operation failed, so a retry
    /// can run it again.
    async fn abandon(&self, key: &str, route: &str, scope: &str) -> Result<()>;

    /// Reclaims expired records; returns how many were removed.
    async fn purge_expired(&self, now: Timestamp) -> Result<u64>;
}

/// Time source for consistent timestamp handling.
///
/// Abstracted to allow testing with deterministic time.
pub trait TimeSource: Send + Sync {
    /// Returns the current timestamp in milliseconds.
    fn now(&self) -> Timestamp;
}

/// Default system time source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as Timestamp
    }
}
