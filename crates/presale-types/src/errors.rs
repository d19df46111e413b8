//! Shared validation error type.
//!
//! Validation failures are rejected synchronously at submission and never
//! persist a record, so the type lives here where both the engine and any
//! host transport can name it.

use thiserror::Error;

/// A malformed submission, rejected before any record is created.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Token identifier is empty or not hexadecimal.
    #[error("Malformed token id: {0:?}")]
    MalformedTokenId(String),

    /// Wallet address is empty.
    #[error("Missing wallet address")]
    MissingWalletAddress,

    /// Requested batch count must be positive.
    #[error("Batch count must be positive, got {0}")]
    NonPositiveBatches(u64),

    /// Idempotency key is empty.
    #[error("Missing idempotency key")]
    MissingIdempotencyKey,
}
