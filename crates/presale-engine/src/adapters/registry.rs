//! Static token registry.
//!
//! Serves presale configurations from an in-memory table. In production
//! the registry collaborator owns these parameters; this adapter stands
//! in for it in single-node and test setups, including toggling a
//! presale open or closed.

use crate::domain::errors::{EngineError, Result};
use crate::ports::outbound::TokenRegistry;
use async_trait::async_trait;
use presale_types::{TokenId, TokenPresaleConfig};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory implementation of the token registry port.
#[derive(Default)]
pub struct StaticTokenRegistry {
    configs: RwLock<HashMap<TokenId, TokenPresaleConfig>>,
}

impl StaticTokenRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces a token's presale configuration.
    pub fn insert(&self, token_id: TokenId, config: TokenPresaleConfig) -> Result<()> {
        self.configs
            .write()
            .map_err(|_| EngineError::Internal("registry poisoned".into()))?
            .insert(token_id, config);
        Ok(())
    }

    /// Opens or closes a token's presale.
    ///
    /// Closing stops new rounds; in-flight payment-requested requests
    /// still resolve via the timeout sweep.
    pub fn set_presale_open(&self, token_id: &TokenId, open: bool) -> Result<()> {
        let mut configs = self
            .configs
            .write()
            .map_err(|_| EngineError::Internal("registry poisoned".into()))?;
        match configs.get_mut(token_id) {
            Some(config) => {
                config.is_presale = open;
                Ok(())
            }
            None => Err(EngineError::TokenNotFound(token_id.clone())),
        }
    }
}

#[async_trait]
impl TokenRegistry for StaticTokenRegistry {
    async fn presale_config(&self, token_id: &TokenId) -> Result<Option<TokenPresaleConfig>> {
        Ok(self
            .configs
            .read()
            .map_err(|_| EngineError::Internal("registry poisoned".into()))?
            .get(token_id)
            .cloned())
    }
}
