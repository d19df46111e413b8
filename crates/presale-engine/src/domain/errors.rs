//! Error types for the presale engine.
//!
//! Supply and wallet-limit rejections are data (a `Rejected` status with a
//! reason), not errors; payment timeout is a state, not an error. What
//! remains here are the genuinely exceptional paths.

use presale_types::{PaymentStatus, RequestId, TokenId, ValidationError};
use thiserror::Error;

/// Convenience alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// All errors that can occur in the presale engine.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed submission, rejected before anything is persisted.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The token has no presale configuration.
    #[error("Token not found: {0}")]
    TokenNotFound(TokenId),

    /// The token exists but its presale is not open.
    #[error("Presale closed for token {0}")]
    PresaleClosed(TokenId),

    /// No purchase request with this id.
    #[error("Request not found: {0}")]
    RequestNotFound(RequestId),

    /// The same idempotency tuple is still running elsewhere; the caller
    /// should retry after a short delay.
    #[error("Operation in progress for idempotency key {key}")]
    OperationInProgress { key: String },

    /// Advisory lock could not be acquired within the timeout. Retried by
    /// the scheduler with bounded backoff; never fatal.
    #[error("Advisory lock ({key1}, {key2}) acquisition timed out")]
    LockTimeout { key1: i32, key2: i32 },

    /// The requested payment transition is not an edge of the state
    /// machine, or another writer already won the race.
    #[error("Invalid payment transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Storage transaction failure; the whole round-close attempt rolls
    /// back and its requests stay pending.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
