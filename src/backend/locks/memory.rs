//! In-memory lease store
//!
//! Expiry is measured on the tokio clock so tests can pause and advance time.

use super::LeaseStore;
use crate::backend::store::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct Held {
    owner_token: String,
    expires_at: Instant,
}

#[derive(Debug, Default)]
pub struct MemoryLeaseStore {
    leases: Mutex<HashMap<Uuid, Held>>,
}

impl MemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of leases currently stored, expired ones included
    pub async fn len(&self) -> usize {
        self.leases.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn try_acquire(
        &self,
        entity_id: Uuid,
        owner_token: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let now = Instant::now();
        let mut leases = self.leases.lock().await;
        if let Some(held) = leases.get(&entity_id) {
            if held.expires_at > now {
                return Ok(false);
            }
        }
        leases.insert(
            entity_id,
            Held {
                owner_token: owner_token.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release(&self, entity_id: Uuid, owner_token: &str) -> Result<bool, StoreError> {
        let mut leases = self.leases.lock().await;
        match leases.get(&entity_id) {
            Some(held) if held.owner_token == owner_token && held.expires_at > Instant::now() => {
                leases.remove(&entity_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let now = Instant::now();
        let mut leases = self.leases.lock().await;
        let before = leases.len();
        leases.retain(|_, held| held.expires_at > now);
        Ok((before - leases.len()) as u64)
    }
}
