//! Inner domain layer: pure admission, lock derivation, and payment
//! transition logic with no I/O dependencies.

pub mod admission;
pub mod errors;
pub mod lock;
pub mod payment;

pub use admission::{evaluate, AdmissionDecision, DecisionOutcome, OversizePolicy};
pub use errors::{EngineError, Result};
pub use lock::{derive_lock_key, LockKey};
