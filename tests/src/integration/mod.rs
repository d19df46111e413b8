//! Cross-crate integration flows.
//!
//! Every test wires a full service from the in-memory adapters, the way a
//! single-node deployment would, and drives it through the inbound API.
//! Time is a `ManualTimeSource` everywhere except the scheduler
//! end-to-end flow, which runs real (shortened) rounds.

pub mod concurrency;
pub mod payment_flow;
pub mod round_lifecycle;
pub mod scheduler_e2e;
