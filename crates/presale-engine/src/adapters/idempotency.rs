//! In-memory idempotency backend.
//!
//! One mutex around the record map makes `begin` an atomic
//! insert-or-read, which is the whole correctness story: the first caller
//! to claim a (key, route, scope) tuple owns it, and everyone else sees
//! either the in-progress claim or the completed result. A SQL deployment
//! gets the same from a unique constraint, treating a duplicate-key
//! insert as "another instance got there first" and re-reading.

use crate::domain::errors::{EngineError, Result};
use crate::ports::outbound::{BeginOutcome, IdempotencyBackend, StoredResponse};
use async_trait::async_trait;
use presale_types::{IdempotencyRecord, IdempotencyState, Timestamp};
use std::collections::HashMap;
use tokio::sync::Mutex;

type TupleKey = (String, String, String);

/// In-memory implementation of the idempotency backend.
#[derive(Default)]
pub struct InMemoryIdempotencyBackend {
    records: Mutex<HashMap<TupleKey, IdempotencyRecord>>,
}

impl InMemoryIdempotencyBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records (expired ones included until purged).
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

fn tuple(key: &str, route: &str, scope: &str) -> TupleKey {
    (key.to_string(), route.to_string(), scope.to_string())
}

#[async_trait]
impl IdempotencyBackend for InMemoryIdempotencyBackend {
    async fn begin(
        &self,
        key: &str,
        route: &str,
        scope: &str,
        now: Timestamp,
        ttl_ms: u64,
    ) -> Result<BeginOutcome> {
        let mut records = self.records.lock().await;
        if let Some(record) = records.get(&tuple(key, route, scope)) {
            // Expired records are never matched; fall through to reclaim.
            if record.expires_at > now {
                return match record.state {
                    IdempotencyState::InProgress => Ok(BeginOutcome::InProgress),
                    IdempotencyState::Completed => {
                        let body = record
                            .response
                            .as_deref()
                            .map(serde_json::from_str)
                            .transpose()
                            .map_err(|e| {
                                EngineError::Internal(format!("stored response corrupt: {e}"))
                            })?
                            .unwrap_or(serde_json::Value::Null);
                        Ok(BeginOutcome::Completed(StoredResponse {
                            status_code: record.status_code.unwrap_or(200),
                            body,
                        }))
                    }
                };
            }
        }

        records.insert(
            tuple(key, route, scope),
            IdempotencyRecord {
                key: key.to_string(),
                route: route.to_string(),
                scope: scope.to_string(),
                state: IdempotencyState::InProgress,
                status_code: None,
                response: None,
                created_at: now,
                expires_at: now + ttl_ms,
            },
        );
        Ok(BeginOutcome::Started)
    }

    async fn complete(
        &self,
        key: &str,
        route: &str,
        scope: &str,
        response: &StoredResponse,
    ) -> Result<()> {
        let mut records = self.records.lock().await;
        let Some(record) = records.get_mut(&tuple(key, route, scope)) else {
            return Err(EngineError::Internal(
                "completing an unclaimed idempotency tuple".into(),
            ));
        };
        record.state = IdempotencyState::Completed;
        record.status_code = Some(response.status_code);
        record.response = Some(response.body.to_string());
        Ok(())
    }

    async fn abandon(&self, key: &str, route: &str, scope: &str) -> Result<()> {
        self.records.lock().await.remove(&tuple(key, route, scope));
        Ok(())
    }

    async fn purge_expired(&self, now: Timestamp) -> Result<u64> {
        let mut records = self.records.lock().await;
        let before = records.len();
        records.retain(|_, record| record.expires_at > now);
        Ok((before - records.len()) as u64)
    }
}
