//! In-memory advisory lock manager.
//!
//! One async mutex per key pair, handed out as an owned guard so release
//! happens on drop exactly like a transaction-scoped lock. Exclusivity
//! here spans tasks within one process; a multi-process deployment backs
//! the same port with its storage engine's advisory lock primitive.

use crate::domain::errors::{EngineError, Result};
use crate::domain::lock::LockKey;
use crate::ports::outbound::{LockGuard, LockManager};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::trace;

/// In-memory implementation of the advisory lock manager.
#[derive(Default)]
pub struct InMemoryLockManager {
    locks: StdMutex<HashMap<LockKey, Arc<AsyncMutex<()>>>>,
}

impl InMemoryLockManager {
    /// Creates a manager with no locks held.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: LockKey) -> Result<Arc<AsyncMutex<()>>> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| EngineError::Internal("lock table poisoned".into()))?;
        Ok(Arc::clone(
            locks.entry(key).or_insert_with(|| Arc::new(AsyncMutex::new(()))),
        ))
    }
}

#[async_trait]
impl LockManager for InMemoryLockManager {
    async fn acquire(&self, key: LockKey, timeout: Duration) -> Result<LockGuard> {
        let slot = self.slot(key)?;
        match tokio::time::timeout(timeout, slot.lock_owned()).await {
            Ok(guard) => {
                trace!(key1 = key.key1, key2 = key.key2, "Advisory lock acquired");
                Ok(LockGuard::new(guard))
            }
            Err(_) => Err(EngineError::LockTimeout {
                key1: key.key1,
                key2: key.key2,
            }),
        }
    }
}
