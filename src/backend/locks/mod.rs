//! Entity Lock Manager
//!
//! Short-lived per-entity leases. A writer takes the lease for the entity it
//! mutates, does its work, and releases the lease whatever the outcome.
//! Acquisition never waits: a held lease is reported as [`LockError::Contended`]
//! straight away. A lease that is never released (process crash, panic inside
//! the work) simply expires after its TTL.
//!
//! # Stores
//!
//! - [`memory::MemoryLeaseStore`] - single process
//! - [`postgres::PgLeaseStore`] - `entity_locks` table, shared across processes

use crate::backend::store::StoreError;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// In-memory lease store
pub mod memory;

/// Postgres lease store
pub mod postgres;

pub use memory::MemoryLeaseStore;
pub use postgres::PgLeaseStore;

/// Lease duration used when none is configured
pub const DEFAULT_LEASE_TTL: Duration = Duration::from_millis(5000);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("entity {entity_id} is locked by another writer")]
    Contended { entity_id: Uuid },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Atomic lease storage
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Set the lease if absent or expired. Returns whether `owner_token` now holds it.
    async fn try_acquire(
        &self,
        entity_id: Uuid,
        owner_token: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    /// Delete the lease only if `owner_token` still holds it. Returns whether
    /// anything was deleted.
    async fn release(&self, entity_id: Uuid, owner_token: &str) -> Result<bool, StoreError>;

    /// Drop every expired lease, returning how many were removed
    async fn purge_expired(&self) -> Result<u64, StoreError>;
}

/// A held lease
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lease {
    pub entity_id: Uuid,
    pub owner_token: String,
}

/// Hands out and releases leases
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn LeaseStore>,
    ttl: Duration,
}

impl LockManager {
    pub fn new(store: Arc<dyn LeaseStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// A fresh owner token for `user_id`, unique per acquisition
    pub fn owner_token(user_id: Uuid) -> String {
        format!("{}:{}", user_id, Uuid::new_v4())
    }

    pub async fn acquire(&self, entity_id: Uuid, user_id: Uuid) -> Result<Lease, LockError> {
        let owner_token = Self::owner_token(user_id);
        if self
            .store
            .try_acquire(entity_id, &owner_token, self.ttl)
            .await?
        {
            tracing::debug!("[Lock] Acquired lease on {} for {}", entity_id, user_id);
            Ok(Lease {
                entity_id,
                owner_token,
            })
        } else {
            tracing::info!("[Lock] Lease on {} denied for {}", entity_id, user_id);
            Err(LockError::Contended { entity_id })
        }
    }

    /// Release a lease. Failures are logged; the TTL still bounds the lease.
    pub async fn release(&self, lease: Lease) {
        match self.store.release(lease.entity_id, &lease.owner_token).await {
            Ok(true) => tracing::debug!("[Lock] Released lease on {}", lease.entity_id),
            Ok(false) => tracing::warn!(
                "[Lock] Lease on {} had already expired or changed owner",
                lease.entity_id
            ),
            Err(e) => tracing::error!(
                "[Lock] Failed to release lease on {}: {:?}",
                lease.entity_id,
                e
            ),
        }
    }

    /// Run `work` while holding the lease on `entity_id`
    pub async fn with_lease<T, E, F, Fut>(
        &self,
        entity_id: Uuid,
        user_id: Uuid,
        work: F,
    ) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<LockError>,
    {
        let lease = self.acquire(entity_id, user_id).await?;
        let result = work().await;
        self.release(lease).await;
        result
    }

    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        self.store.purge_expired().await
    }
}
