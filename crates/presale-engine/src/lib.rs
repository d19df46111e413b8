//! # Presale Engine
//!
//! Round-based presale admission and settlement pipeline for token sale
//! batches.
//!
//! ## Purpose
//!
//! Accepts concurrent purchase requests against a fixed, scarce allocation
//! of sale batches, groups them into time-boxed rounds, decides admission
//! under a supply constraint and a per-wallet cap, and tracks each request
//! through a payment lifecycle with timeout-driven expiry. Decision-making
//! is serialized per token across processes via an advisory lock keyed by
//! token identity, and retried client requests are handled idempotently.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Accepted batches per token never exceed supply | `domain/admission.rs` - running supply counter |
//! | Accepted batches per (wallet, token) never exceed the cap | `domain/admission.rs` - per-wallet counters |
//! | Admission decided exactly once, irreversibly | `adapters/store.rs` - `commit_round` only touches Pending |
//! | Payment transitions are monotonic | `domain/payment.rs` - transition table + store CAS |
//! | Exactly one of sweep/payment-sent wins | `compare_and_set_payment` - losing writer is a no-op |
//!
//! ## Control Flow
//!
//! ```text
//! submit ──idempotency──→ [Pending pool]
//!                              │ round countdown reaches zero
//!                              ▼
//!                  acquire token lock ──→ evaluate ──→ commit
//!                              │
//!            ┌─────────────────┴─────────────────┐
//!            ▼                                   ▼
//!    accepted: payment-requested          rejected (reason)
//!            │
//!    ┌───────┴────────┐
//!    ▼                ▼
//! payment-sent     expired (sweep, 30s)
//!    ▼
//! verified
//! ```
//!
//! ## Module Structure (Hexagonal Architecture)
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      OUTER LAYER                                │
//! │  adapters/ - In-memory store, lock manager, registry backends   │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ implements ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      MIDDLE LAYER                               │
//! │  ports/inbound.rs  - PresaleApi trait                           │
//! │  ports/outbound.rs - RequestStore, LockManager, TokenRegistry,  │
//! │                      PaymentVerifier, IdempotencyBackend,       │
//! │                      TimeSource traits                          │
//! └─────────────────────────────────────────────────────────────────┘
//!                          ↑ uses ↑
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      INNER LAYER                                │
//! │  domain/lock.rs      - advisory lock key derivation             │
//! │  domain/admission.rs - round-close admission evaluation         │
//! │  domain/payment.rs   - payment lifecycle transition rules       │
//! │  domain/errors.rs    - EngineError enum                         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod idempotency;
pub mod ports;
pub mod scheduler;
pub mod service;
pub mod sweeper;

pub use config::EngineConfig;
pub use domain::admission::{AdmissionDecision, DecisionOutcome, OversizePolicy};
pub use domain::errors::{EngineError, Result};
pub use domain::lock::{derive_lock_key, LockKey};
pub use idempotency::IdempotencyStore;
pub use scheduler::SchedulerHandle;
pub use service::PresaleService;
pub use sweeper::{PaymentSweeper, SweeperHandle};
