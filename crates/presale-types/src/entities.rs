//! # Core Domain Entities
//!
//! Defines the entities that flow through the presale pipeline.
//!
//! ## Clusters
//!
//! - **Purchase**: `PurchaseRequest`, `RequestStatus`, `PaymentStatus`,
//!   `RejectionReason`
//! - **Configuration**: `TokenPresaleConfig`
//! - **Idempotency**: `IdempotencyRecord`, `IdempotencyState`

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unix timestamp in milliseconds.
pub type Timestamp = u64;

/// Unique identifier of a purchase request.
pub type RequestId = Uuid;

/// A token identifier in hexadecimal form.
///
/// The first 16 hex characters also seed the token's advisory lock key,
/// so two tokens sharing that prefix share a lock (a rare concurrency
/// reduction, never a correctness issue).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenId(pub String);

impl TokenId {
    /// Returns the hexadecimal form of the identifier.
    #[must_use]
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// Checks that the identifier is non-empty and purely hexadecimal.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        !self.0.is_empty() && self.0.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl std::fmt::Display for TokenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TokenId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A buyer wallet address (opaque to this core; format validation is the
/// address-encoding collaborator's concern).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WalletAddress(pub String);

impl std::fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for WalletAddress {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Admission outcome of a purchase request.
///
/// Transitions `Pending -> {Accepted, Rejected}` exactly once,
/// irreversibly; there is no edge back to `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Awaiting the round-close admission decision.
    Pending,
    /// Admitted within supply and wallet limits.
    Accepted,
    /// Refused; `rejection_reason` carries the cause.
    Rejected,
}

/// Why a request was rejected at admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Remaining batch supply could not cover the request.
    InsufficientSupply,
    /// The wallet's cumulative accepted batches would exceed the cap.
    WalletLimitExceeded,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InsufficientSupply => write!(f, "insufficient_supply"),
            Self::WalletLimitExceeded => write!(f, "wallet_limit_exceeded"),
        }
    }
}

/// Payment lifecycle state of an accepted purchase request.
///
/// Monotonic: `Pending -> PaymentRequested -> PaymentSent -> Verified`,
/// with the alternate terminal edge `PaymentRequested -> Expired` taken
/// by the timeout sweep. No backward edges exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentStatus {
    /// No payment requested yet (pre-admission).
    Pending,
    /// Admission succeeded; the buyer was asked to pay.
    PaymentRequested,
    /// The buyer reported a settlement txid.
    PaymentSent,
    /// The payment verifier confirmed txid and amount.
    Verified,
    /// The payment window elapsed without a reported payment.
    Expired,
}

impl PaymentStatus {
    /// Returns true for states with no outgoing edges.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Verified | Self::Expired)
    }
}

/// One purchase attempt against a token's presale.
///
/// Created at submission with `status=Pending`, `payment_status=Pending`;
/// never physically deleted by this core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRequest {
    /// Unique request identifier.
    pub id: RequestId,
    /// The token being purchased.
    pub token_id: TokenId,
    /// The buyer's wallet.
    pub wallet_address: WalletAddress,
    /// Number of sale batches requested (always positive).
    pub batches_purchased: u64,
    /// Total price as a decimal string (arbitrary precision, stored
    /// verbatim).
    pub total_paid: String,
    /// Settlement transaction id, set when the buyer reports payment.
    pub settlement_txid: Option<String>,
    /// Submission time; the admission sort key.
    pub submitted_at: Timestamp,
    /// Round the request was decided in; `None` until admission.
    pub round_number: Option<u32>,
    /// Admission outcome.
    pub status: RequestStatus,
    /// Cause of rejection, if rejected.
    pub rejection_reason: Option<RejectionReason>,
    /// Payment lifecycle state; only advances while `status=Accepted`.
    pub payment_status: PaymentStatus,
    /// When the payment window opened.
    pub payment_requested_at: Option<Timestamp>,
    /// When the admission decision was committed.
    pub processed_at: Option<Timestamp>,
}

impl PurchaseRequest {
    /// Creates a freshly submitted request awaiting admission.
    #[must_use]
    pub fn new(
        token_id: TokenId,
        wallet_address: WalletAddress,
        batches_purchased: u64,
        total_paid: String,
        submitted_at: Timestamp,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            token_id,
            wallet_address,
            batches_purchased,
            total_paid,
            settlement_txid: None,
            submitted_at,
            round_number: None,
            status: RequestStatus::Pending,
            rejection_reason: None,
            payment_status: PaymentStatus::Pending,
            payment_requested_at: None,
            processed_at: None,
        }
    }
}

/// Per-token sale parameters.
///
/// Owned and mutated only by the token registry collaborator; this core
/// reads it at submission and at round close.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPresaleConfig {
    /// Whether a presale is currently open for this token.
    pub is_presale: bool,
    /// Total sale batches available across all rounds.
    pub presale_batch_amount: u64,
    /// Price per batch in sats.
    pub price_in_sats: u64,
    /// Maximum cumulative accepted batches per wallet.
    pub max_purchases_per_wallet: u64,
    /// Issuer wallet for the sale.
    pub issuer: WalletAddress,
}

/// Lifecycle state of an idempotency record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyState {
    /// The wrapped operation is still running somewhere.
    InProgress,
    /// The operation finished; the stored response is replayed verbatim.
    Completed,
}

/// One cached operation outcome, unique on (key, route, scope).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    /// Client-supplied idempotency key.
    pub key: String,
    /// Logical route the key applies to.
    pub route: String,
    /// Scope discriminator (typically the wallet address).
    pub scope: String,
    /// Whether the wrapped operation has completed.
    pub state: IdempotencyState,
    /// Status code of the completed operation.
    pub status_code: Option<u16>,
    /// Serialized response of the completed operation.
    pub response: Option<String>,
    /// When the record was created.
    pub created_at: Timestamp,
    /// After this instant the record is reclaimed and never matched.
    pub expires_at: Timestamp,
}
