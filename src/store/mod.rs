//! Key table access.
//!
//! The key table lives outside this service. Everything the validator needs from it goes through the [`KeyStore`] trait, so the backing technology can be swapped at startup:
//!
//! - [`rest::RestKeyStore`]: hosted PostgREST table (Supabase-style)
//! - [`postgres::PgKeyStore`]: direct PostgreSQL connection
//! - [`memory::MemoryKeyStore`]: in-process table for demos and tests

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::key_record::KeyRecord;

pub mod memory;
pub mod postgres;
pub mod rest;

/// Errors raised by a key table backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached (connection refused, timeout, dropped connection).
    #[error("key store unavailable: {0}")]
    Unavailable(String),

    /// No endpoint or credentials are configured for this backend.
    #[error("key store not configured")]
    NotConfigured,

    /// The store answered but refused the request.
    #[error("key store rejected request: {0}")]
    Rejected(String),

    /// The store answered with something that is not a key record.
    #[error("unexpected key store response: {0}")]
    Decode(String),
}

impl StoreError {
    /// Connectivity failures, as opposed to errors reported by the store itself.
    pub fn is_transport(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::NotConfigured)
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            StoreError::Decode(err.to_string())
        } else if err.is_status() {
            StoreError::Rejected(err.to_string())
        } else {
            StoreError::Unavailable(err.to_string())
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(err.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                StoreError::Decode(err.to_string())
            }
            other => StoreError::Rejected(other.to_string()),
        }
    }
}

/// Data-access layer for key records.
///
/// Implementations only fetch and persist. Eligibility rules (active, expiry, usage ceiling) are applied by [`KeyValidator`](crate::services::validator::KeyValidator).
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Fetch the active record whose key matches exactly.
    ///
    /// Returns `None` when no active record matches.
    async fn find_active(&self, key: &str) -> Result<Option<KeyRecord>, StoreError>;

    /// Unconditionally set the usage count and last-used time of a record.
    async fn record_usage(
        &self,
        id: Uuid,
        usage_count: i64,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Increment usage only if the row still grants access and has not changed since `seen` was read.
    ///
    /// Every backend applies the same condition, as of `used_at`:
    ///
    /// - the row is active
    /// - `usage_count` equals `seen.usage_count` (both missing counts as equal)
    /// - the row is below its ceiling, where a missing or zero `max_usage` is unlimited
    /// - `expires_at` is missing or not earlier than `used_at`
    ///
    /// Returns the updated record, or `None` when the condition did not hold (another validation got there first, or the key was revoked, capped or expired in between).
    async fn try_consume(
        &self,
        seen: &KeyRecord,
        used_at: DateTime<Utc>,
    ) -> Result<Option<KeyRecord>, StoreError>;

    /// Cheap connectivity check used by the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}
