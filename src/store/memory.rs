//! In-process key table.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{KeyStore, StoreError};
use crate::models::key_record::KeyRecord;

/// Key table held in memory, keyed by record id.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    records: RwLock<HashMap<Uuid, KeyRecord>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = KeyRecord>) -> Self {
        let records = records.into_iter().map(|r| (r.id, r)).collect();
        Self {
            records: RwLock::new(records),
        }
    }

    /// Load records from a JSON array in the same shape the hosted table returns.
    pub async fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let records: Vec<KeyRecord> = serde_json::from_str(&raw)?;
        tracing::info!(count = records.len(), "Loaded key records");
        Ok(Self::with_records(records))
    }

    pub async fn get(&self, id: Uuid) -> Option<KeyRecord> {
        self.records.read().await.get(&id).cloned()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn find_active(&self, key: &str) -> Result<Option<KeyRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .find(|r| r.key == key && r.is_active)
            .cloned())
    }

    async fn record_usage(
        &self,
        id: Uuid,
        usage_count: i64,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        // A missing id matches no rows, same as an UPDATE ... WHERE id = ?
        if let Some(record) = self.records.write().await.get_mut(&id) {
            record.usage_count = Some(usage_count);
            record.last_used_at = Some(used_at);
        }
        Ok(())
    }

    async fn try_consume(
        &self,
        seen: &KeyRecord,
        used_at: DateTime<Utc>,
    ) -> Result<Option<KeyRecord>, StoreError> {
        let mut records = self.records.write().await;
        let Some(record) = records.get_mut(&seen.id) else {
            return Ok(None);
        };

        if !record.is_active
            || record.usage_count != seen.usage_count
            || record.is_exhausted()
            || record.is_expired_at(used_at)
        {
            return Ok(None);
        }

        record.usage_count = Some(record.uses() + 1);
        record.last_used_at = Some(used_at);
        Ok(Some(record.clone()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn inactive_records_are_not_found() {
        let mut record = KeyRecord::new("UDG-OFF");
        record.is_active = false;
        let store = MemoryKeyStore::with_records([record]);

        assert!(store.find_active("UDG-OFF").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lookup_is_exact_match() {
        let store = MemoryKeyStore::with_records([KeyRecord::new("UDG-AAAA")]);

        assert!(store.find_active("UDG-AAAA").await.unwrap().is_some());
        assert!(store.find_active("udg-aaaa").await.unwrap().is_none());
        assert!(store.find_active("UDG-AAA").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn try_consume_fails_on_stale_read() {
        let record = KeyRecord::new("UDG-CAS");
        let store = MemoryKeyStore::with_records([record.clone()]);
        let now = Utc::now();

        let updated = store.try_consume(&record, now).await.unwrap().unwrap();
        assert_eq!(updated.usage_count, Some(1));
        assert_eq!(updated.last_used_at, Some(now));

        // `record` still says 0 uses; the row now says 1
        assert!(store.try_consume(&record, now).await.unwrap().is_none());
        assert_eq!(store.get(record.id).await.unwrap().usage_count, Some(1));
    }

    #[tokio::test]
    async fn loads_seed_file() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/demos/keys.json");
        let store = MemoryKeyStore::from_json_file(path).await.unwrap();

        let record = store.find_active("UDG-TEST-0001").await.unwrap().unwrap();
        assert_eq!(record.usage_count, Some(2));
        assert_eq!(record.max_usage, Some(3));
        assert!(store.find_active("UDG-DEMO-REVOKED").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn try_consume_respects_ceiling() {
        let mut record = KeyRecord::new("UDG-CAP");
        record.usage_count = Some(1);
        record.max_usage = Some(1);
        let store = MemoryKeyStore::with_records([record.clone()]);

        assert!(store.try_consume(&record, Utc::now()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn try_consume_treats_zero_limit_as_unlimited() {
        let mut record = KeyRecord::new("UDG-ZERO");
        record.usage_count = Some(9);
        record.max_usage = Some(0);
        let store = MemoryKeyStore::with_records([record.clone()]);

        let updated = store.try_consume(&record, Utc::now()).await.unwrap().unwrap();
        assert_eq!(updated.usage_count, Some(10));
    }

    #[tokio::test]
    async fn try_consume_rejects_key_expired_since_read() {
        let now = Utc::now();
        let mut record = KeyRecord::new("UDG-LAPSE");
        record.expires_at = Some(now + chrono::Duration::seconds(1));
        let store = MemoryKeyStore::with_records([record.clone()]);

        // Read while still valid, consumed after the expiry passed
        let later = now + chrono::Duration::seconds(2);
        assert!(store.try_consume(&record, later).await.unwrap().is_none());
        assert_eq!(store.get(record.id).await.unwrap(), record);

        // Exactly at the expiry instant the key is still usable
        let at_expiry = now + chrono::Duration::seconds(1);
        assert!(store.try_consume(&record, at_expiry).await.unwrap().is_some());
    }
}
