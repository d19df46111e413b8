//! Outer-layer adapters: in-memory implementations of every outbound
//! port.
//!
//! Suitable for single-node operation and deterministic tests; a
//! distributed deployment implements the same ports over its
//! transactional store (advisory locks, conditional updates, unique
//! constraints).

pub mod idempotency;
pub mod locks;
pub mod registry;
pub mod store;
pub mod time;
pub mod verifier;

pub use idempotency::InMemoryIdempotencyBackend;
pub use locks::InMemoryLockManager;
pub use registry::StaticTokenRegistry;
pub use store::InMemoryRequestStore;
pub use time::ManualTimeSource;
pub use verifier::TablePaymentVerifier;
