//! Key table in a PostgreSQL database the service connects to directly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{KeyStore, StoreError};
use crate::{db::DbPool, models::key_record::KeyRecord};

/// Key table backed by the `udg_keys` table (see `migrations/`).
#[derive(Debug, Clone)]
pub struct PgKeyStore {
    pool: DbPool,
}

impl PgKeyStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KeyStore for PgKeyStore {
    async fn find_active(&self, key: &str) -> Result<Option<KeyRecord>, StoreError> {
        let record = sqlx::query_as::<_, KeyRecord>(
            r#"
            SELECT id, key, is_active, created_at, expires_at, usage_count,
                   max_usage, last_used_at, created_by, notes
            FROM udg_keys
            WHERE key = $1 AND is_active = true
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn record_usage(
        &self,
        id: Uuid,
        usage_count: i64,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE udg_keys SET usage_count = $1, last_used_at = $2 WHERE id = $3")
            .bind(usage_count)
            .bind(used_at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn try_consume(
        &self,
        seen: &KeyRecord,
        used_at: DateTime<Utc>,
    ) -> Result<Option<KeyRecord>, StoreError> {
        // The row lock taken by UPDATE makes the ceiling check and the
        // increment a single step. `usage_count IS NOT DISTINCT FROM $3`
        // rejects rows that changed since `seen` was read.
        let record = sqlx::query_as::<_, KeyRecord>(
            r#"
            UPDATE udg_keys
            SET usage_count = COALESCE(usage_count, 0) + 1,
                last_used_at = $2
            WHERE id = $1
              AND is_active = true
              AND usage_count IS NOT DISTINCT FROM $3
              AND (max_usage IS NULL OR max_usage = 0 OR COALESCE(usage_count, 0) < max_usage)
              AND (expires_at IS NULL OR expires_at >= $2)
            RETURNING id, key, is_active, created_at, expires_at, usage_count,
                      max_usage, last_used_at, created_by, notes
            "#,
        )
        .bind(seen.id)
        .bind(used_at)
        .bind(seen.usage_count)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
