//! Postgres lease store
//!
//! One row per entity in `entity_locks`. Acquisition is a single upsert that
//! only overwrites an expired row, so two racing callers cannot both win.

use super::LeaseStore;
use crate::backend::store::StoreError;
use async_trait::async_trait;
use sqlx::PgPool;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct PgLeaseStore {
    pool: PgPool,
}

impl PgLeaseStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeaseStore for PgLeaseStore {
    async fn try_acquire(
        &self,
        entity_id: Uuid,
        owner_token: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let ttl_ms = ttl.as_millis() as i64;
        let row = sqlx::query(
            r#"
            INSERT INTO entity_locks (entity_id, owner_token, expires_at)
            VALUES ($1, $2, NOW() + $3 * INTERVAL '1 millisecond')
            ON CONFLICT (entity_id) DO UPDATE
                SET owner_token = EXCLUDED.owner_token, expires_at = EXCLUDED.expires_at
                WHERE entity_locks.expires_at <= NOW()
            RETURNING entity_id
            "#,
        )
        .bind(entity_id)
        .bind(owner_token)
        .bind(ttl_ms)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn release(&self, entity_id: Uuid, owner_token: &str) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "DELETE FROM entity_locks WHERE entity_id = $1 AND owner_token = $2 AND expires_at > NOW()",
        )
        .bind(entity_id)
        .bind(owner_token)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM entity_locks WHERE expires_at <= NOW()")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
