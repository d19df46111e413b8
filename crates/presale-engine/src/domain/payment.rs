//! Payment lifecycle transition rules.
//!
//! The edges of the payment state machine, shared by the service (client
//! driven transitions) and the sweep (timeout expiry). The store's
//! compare-and-set enforces these atomically; the rules here decide which
//! edges exist at all.
//!
//! ```text
//! pending ──→ payment-requested ──→ payment-sent ──→ verified
//!                     │
//!                     └──────────── expired (sweep)
//! ```
//!
//! No backward edges. Rejected requests never advance past `pending`.

use presale_types::{PaymentStatus, PurchaseRequest, Timestamp};

/// Whether `from -> to` is an edge of the payment state machine.
#[must_use]
pub fn can_advance(from: PaymentStatus, to: PaymentStatus) -> bool {
    use PaymentStatus::{Expired, PaymentRequested, PaymentSent, Pending, Verified};
    matches!(
        (from, to),
        (Pending, PaymentRequested)
            | (PaymentRequested, PaymentSent)
            | (PaymentRequested, Expired)
            | (PaymentSent, Verified)
    )
}

/// Whether the sweep should expire this request at `now`.
///
/// True only while the request is still `PaymentRequested` and its window
/// has fully elapsed. The actual transition is a compare-and-set, so a
/// concurrent `PaymentSent` still wins cleanly.
#[must_use]
pub fn is_due_for_expiry(request: &PurchaseRequest, now: Timestamp, window_ms: u64) -> bool {
    if request.payment_status != PaymentStatus::PaymentRequested {
        return false;
    }
    match request.payment_requested_at {
        Some(requested_at) => now.saturating_sub(requested_at) > window_ms,
        None => false,
    }
}
