//! Port traits: the inbound API the engine exposes and the outbound
//! dependencies it consumes.

pub mod inbound;
pub mod outbound;

pub use inbound::{PresaleApi, PresaleStats, RequestSummary, SubmitPurchase, SubmitReceipt};
pub use outbound::{
    BeginOutcome, IdempotencyBackend, LockGuard, LockManager, PaymentVerifier, RequestStore,
    StoredResponse, SystemTimeSource, TimeSource, TokenRegistry,
};
