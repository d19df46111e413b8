//! # Presale Events
//!
//! Defines all event types that flow through the presale bus, and the
//! topic filters subscribers use to select them.

use presale_types::{RejectionReason, RequestId, TokenId, WalletAddress};
use serde::{Deserialize, Serialize};

/// Aggregate result of one round's admission evaluation.
///
/// Carried on `RoundCompleted` so subscribers can display the round
/// outcome without polling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdmissionSummary {
    /// Requests accepted this round.
    pub accepted: u64,
    /// Requests rejected this round.
    pub rejected: u64,
    /// Batches sold this round.
    pub batches_sold: u64,
    /// Batches still available after this round.
    pub remaining_supply: u64,
}

/// All events that can be published to the presale bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PresaleEvent {
    /// One countdown tick, emitted once per second while a round is open.
    RoundCountdown {
        /// The token whose round is counting down.
        token_id: TokenId,
        /// The round currently accumulating requests.
        round_number: u32,
        /// Whole seconds until the round closes.
        seconds_remaining: u64,
    },

    /// A round closed and its admission decisions were committed.
    RoundCompleted {
        /// The token whose round completed.
        token_id: TokenId,
        /// The completed round.
        round_number: u32,
        /// Decision counts for the round.
        summary: AdmissionSummary,
    },

    /// A purchase was accepted and its payment verified.
    PurchaseConfirmed {
        /// The confirmed request.
        request_id: RequestId,
        /// The token purchased.
        token_id: TokenId,
        /// The buyer's wallet.
        wallet_address: WalletAddress,
        /// Batches granted.
        batches_purchased: u64,
    },

    /// A purchase was rejected at admission.
    PurchaseRejected {
        /// The rejected request.
        request_id: RequestId,
        /// The token the request targeted.
        token_id: TokenId,
        /// The buyer's wallet.
        wallet_address: WalletAddress,
        /// Why admission refused the request.
        reason: RejectionReason,
    },
}

impl PresaleEvent {
    /// The token topic this event belongs to.
    #[must_use]
    pub fn token_id(&self) -> &TokenId {
        match self {
            Self::RoundCountdown { token_id, .. }
            | Self::RoundCompleted { token_id, .. }
            | Self::PurchaseConfirmed { token_id, .. }
            | Self::PurchaseRejected { token_id, .. } => token_id,
        }
    }

    /// The wallet topic this event belongs to, if any.
    ///
    /// Round-level events carry no wallet and are only visible on token
    /// topics.
    #[must_use]
    pub fn wallet_address(&self) -> Option<&WalletAddress> {
        match self {
            Self::PurchaseConfirmed { wallet_address, .. }
            | Self::PurchaseRejected { wallet_address, .. } => Some(wallet_address),
            Self::RoundCountdown { .. } | Self::RoundCompleted { .. } => None,
        }
    }
}

/// A topic a subscriber can join.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// All events for one token's presale.
    Token(TokenId),
    /// All purchase events touching one wallet.
    Wallet(WalletAddress),
    /// Every event (no filtering).
    All,
}

/// Filter for subscribing to specific events.
#[derive(Debug, Clone, Default)]
pub struct TopicFilter {
    /// Topics to include. Empty means all topics.
    pub topics: Vec<EventTopic>,
}

impl TopicFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter for one token's events.
    #[must_use]
    pub fn token(token_id: TokenId) -> Self {
        Self {
            topics: vec![EventTopic::Token(token_id)],
        }
    }

    /// Create a filter for one wallet's purchase events.
    #[must_use]
    pub fn wallet(wallet: WalletAddress) -> Self {
        Self {
            topics: vec![EventTopic::Wallet(wallet)],
        }
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &PresaleEvent) -> bool {
        if self.topics.is_empty() || self.topics.contains(&EventTopic::All) {
            return true;
        }
        self.topics.iter().any(|topic| match topic {
            EventTopic::Token(token_id) => event.token_id() == token_id,
            EventTopic::Wallet(wallet) => event.wallet_address() == Some(wallet),
            EventTopic::All => true,
        })
    }
}
