//! Round-close admission evaluation.
//!
//! Pure evaluation of one token's pending requests against remaining
//! supply and per-wallet caps. Executes inside the token's advisory lock;
//! the caller commits the decision set atomically with the lock-protected
//! transaction.
//!
//! ## Invariants Enforced
//!
//! - Sum of accepted batches never exceeds the remaining supply handed in.
//! - Per (wallet, token), accepted batches never exceed the wallet cap,
//!   counting batches accepted in earlier rounds.
//! - Candidates are walked in deterministic submitted_at order, ties
//!   broken by request id.

use presale_bus::AdmissionSummary;
use presale_types::{PurchaseRequest, RejectionReason, RequestId, WalletAddress};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How an oversized request is admitted when it does not fully fit the
/// remaining supply or the wallet's headroom.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// A request that does not fully fit is rejected outright.
    #[default]
    RejectOutright,
    /// Grant the largest amount that fits both constraints, when positive.
    PartialFill,
}

/// Outcome of one candidate's evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionOutcome {
    /// Admitted. Under `PartialFill`, `batches_granted` may be smaller
    /// than the batches requested.
    Accepted { batches_granted: u64 },
    /// Refused with a reason.
    Rejected { reason: RejectionReason },
}

/// One admission decision, keyed to the request it decides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionDecision {
    /// The decided request.
    pub request_id: RequestId,
    /// The requesting wallet (carried for event publication).
    pub wallet_address: WalletAddress,
    /// Accept or reject.
    pub outcome: DecisionOutcome,
}

impl AdmissionDecision {
    /// Batches granted by this decision (zero when rejected).
    #[must_use]
    pub fn batches_granted(&self) -> u64 {
        match self.outcome {
            DecisionOutcome::Accepted { batches_granted } => batches_granted,
            DecisionOutcome::Rejected { .. } => 0,
        }
    }
}

/// Evaluates one round's pending requests.
///
/// Candidates are sorted by `submitted_at` ascending (ties by id for
/// determinism) and walked with a running supply counter and running
/// per-wallet cumulative counters seeded from `accepted_per_wallet`
/// (batches already accepted in earlier rounds). A candidate that fits
/// both constraints is accepted and both counters advance; otherwise the
/// policy decides between rejection and a partial grant.
#[must_use]
pub fn evaluate(
    candidates: &[PurchaseRequest],
    remaining_supply: u64,
    accepted_per_wallet: &HashMap<WalletAddress, u64>,
    max_per_wallet: u64,
    policy: OversizePolicy,
) -> Vec<AdmissionDecision> {
    let mut ordered: Vec<&PurchaseRequest> = candidates.iter().collect();
    ordered.sort_by(|a, b| {
        a.submitted_at
            .cmp(&b.submitted_at)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut supply_left = remaining_supply;
    let mut wallet_totals: HashMap<WalletAddress, u64> = accepted_per_wallet.clone();

    let mut decisions = Vec::with_capacity(ordered.len());
    for request in ordered {
        let wallet_total = wallet_totals
            .get(&request.wallet_address)
            .copied()
            .unwrap_or(0);
        let headroom = max_per_wallet.saturating_sub(wallet_total);

        let outcome = decide(request.batches_purchased, supply_left, headroom, policy);

        if let DecisionOutcome::Accepted { batches_granted } = outcome {
            supply_left -= batches_granted;
            wallet_totals.insert(request.wallet_address.clone(), wallet_total + batches_granted);
        }

        decisions.push(AdmissionDecision {
            request_id: request.id,
            wallet_address: request.wallet_address.clone(),
            outcome,
        });
    }

    decisions
}

/// Decides a single candidate against the running counters.
fn decide(
    requested: u64,
    supply_left: u64,
    wallet_headroom: u64,
    policy: OversizePolicy,
) -> DecisionOutcome {
    if requested <= supply_left && requested <= wallet_headroom {
        return DecisionOutcome::Accepted {
            batches_granted: requested,
        };
    }

    match policy {
        OversizePolicy::RejectOutright => DecisionOutcome::Rejected {
            reason: binding_constraint(requested, supply_left, wallet_headroom),
        },
        OversizePolicy::PartialFill => {
            let grant = requested.min(supply_left).min(wallet_headroom);
            if grant > 0 {
                DecisionOutcome::Accepted {
                    batches_granted: grant,
                }
            } else {
                DecisionOutcome::Rejected {
                    reason: binding_constraint(requested, supply_left, wallet_headroom),
                }
            }
        }
    }
}

/// The constraint that refused the request. Supply is reported first when
/// both bind.
fn binding_constraint(requested: u64, supply_left: u64, wallet_headroom: u64) -> RejectionReason {
    if requested > supply_left {
        RejectionReason::InsufficientSupply
    } else {
        debug_assert!(requested > wallet_headroom);
        RejectionReason::WalletLimitExceeded
    }
}

/// Builds the round summary carried on the round-completed event.
#[must_use]
pub fn summarize(decisions: &[AdmissionDecision], remaining_supply: u64) -> AdmissionSummary {
    let mut summary = AdmissionSummary {
        remaining_supply,
        ..AdmissionSummary::default()
    };
    for decision in decisions {
        match decision.outcome {
            DecisionOutcome::Accepted { batches_granted } => {
                summary.accepted += 1;
                summary.batches_sold += batches_granted;
            }
            DecisionOutcome::Rejected { .. } => summary.rejected += 1,
        }
    }
    summary.remaining_supply = remaining_supply.saturating_sub(summary.batches_sold);
    summary
}
