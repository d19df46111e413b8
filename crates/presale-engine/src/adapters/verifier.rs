//! Table-driven payment verifier.
//!
//! Answers verification lookups from a seeded txid → amount table. Stands
//! in for the external payment-verification collaborator in single-node
//! and test setups.

use crate::domain::errors::{EngineError, Result};
use crate::ports::outbound::PaymentVerifier;
use async_trait::async_trait;
use presale_types::{TokenId, WalletAddress};
use std::collections::HashMap;
use std::sync::Mutex;

/// Payment verifier backed by a static txid table.
#[derive(Default)]
pub struct TablePaymentVerifier {
    payments: Mutex<HashMap<String, String>>,
}

impl TablePaymentVerifier {
    /// Creates an empty verifier; every lookup reports not-found.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a settlement txid with the amount it paid.
    pub fn record_payment(&self, settlement_txid: &str, amount: &str) -> Result<()> {
        self.payments
            .lock()
            .map_err(|_| EngineError::Internal("verifier table poisoned".into()))?
            .insert(settlement_txid.to_string(), amount.to_string());
        Ok(())
    }
}

#[async_trait]
impl PaymentVerifier for TablePaymentVerifier {
    async fn verify(
        &self,
        _wallet_address: &WalletAddress,
        _token_id: &TokenId,
        settlement_txid: &str,
    ) -> Result<Option<String>> {
        Ok(self
            .payments
            .lock()
            .map_err(|_| EngineError::Internal("verifier table poisoned".into()))?
            .get(settlement_txid)
            .cloned())
    }
}
