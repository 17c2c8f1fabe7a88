//! Key record model.
//!
//! A key record is one issued credential and its usage metadata. Records are owned by the external key table: this service never creates or deletes them, it only reads them and records usage.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Label shown for keys without a note.
const DEFAULT_LABEL: &str = "Premium Access";

/// Represents a key record from the key table.
///
/// # Database Table
///
/// Maps to the `udg_keys` table with columns:
/// - `id`: Unique identifier assigned by the store
/// - `key`: The credential value, compared for exact match
/// - `is_active`: Whether the key may be used at all
/// - `created_at`: When the key was issued
/// - `expires_at`: Optional expiry (absent = never expires)
/// - `usage_count`: Successful validations so far (absent = 0)
/// - `max_usage`: Optional usage ceiling (absent = unlimited)
/// - `last_used_at`: Time of the last successful validation
/// - `created_by`: Who issued the key
/// - `notes`: Free text shown to the user as the key's label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct KeyRecord {
    pub id: Uuid,

    pub key: String,

    /// Inactive keys are never returned by lookups. This provides a way to revoke a key without deleting the record.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub usage_count: Option<i64>,

    #[serde(default)]
    pub max_usage: Option<i64>,

    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub created_by: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,
}

impl KeyRecord {
    /// Create an active, unlimited, never-expiring record.
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            key: key.into(),
            is_active: true,
            created_at: Utc::now(),
            expires_at: None,
            usage_count: Some(0),
            max_usage: None,
            last_used_at: None,
            created_by: None,
            notes: None,
        }
    }

    /// Successful validations so far, with an absent count read as zero.
    pub fn uses(&self) -> i64 {
        self.usage_count.unwrap_or(0)
    }

    /// The enforced usage ceiling.
    ///
    /// A stored limit of zero is treated the same as no limit.
    pub fn usage_limit(&self) -> Option<i64> {
        self.max_usage.filter(|limit| *limit != 0)
    }

    /// Expired when the expiry is strictly earlier than `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    pub fn is_exhausted(&self) -> bool {
        self.usage_limit().is_some_and(|limit| self.uses() >= limit)
    }
}

/// What a successful validation shows about the key.
///
/// # JSON Example
///
/// ```json
/// {
///   "label": "Premium Access",
///   "usage": "2/3"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySummary {
    /// The key's note, or "Premium Access"
    pub label: String,

    /// `<used>/<limit>` with `∞` for unlimited keys
    pub usage: String,
}

impl From<&KeyRecord> for KeySummary {
    fn from(record: &KeyRecord) -> Self {
        let label = record
            .notes
            .as_deref()
            .filter(|notes| !notes.is_empty())
            .unwrap_or(DEFAULT_LABEL)
            .to_string();

        let usage = match record.usage_limit() {
            Some(limit) => format!("{}/{}", record.uses(), limit),
            None => format!("{}/∞", record.uses()),
        };

        Self { label, usage }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn zero_limit_means_unlimited() {
        let mut record = KeyRecord::new("UDG-ZERO");
        record.max_usage = Some(0);
        record.usage_count = Some(50);

        assert_eq!(record.usage_limit(), None);
        assert!(!record.is_exhausted());
    }

    #[test]
    fn missing_count_reads_as_zero() {
        let mut record = KeyRecord::new("UDG-NULL");
        record.usage_count = None;
        record.max_usage = Some(1);

        assert_eq!(record.uses(), 0);
        assert!(!record.is_exhausted());
    }

    #[test]
    fn expiry_is_strict() {
        let now = Utc::now();
        let mut record = KeyRecord::new("UDG-EXP");

        record.expires_at = Some(now);
        assert!(!record.is_expired_at(now));

        record.expires_at = Some(now - Duration::seconds(1));
        assert!(record.is_expired_at(now));
    }

    #[test]
    fn summary_uses_notes_and_limit() {
        let mut record = KeyRecord::new("UDG-SUM");
        record.usage_count = Some(2);
        record.max_usage = Some(3);
        record.notes = Some("Lifetime".to_string());

        let summary = KeySummary::from(&record);
        assert_eq!(summary.label, "Lifetime");
        assert_eq!(summary.usage, "2/3");

        record.notes = None;
        record.max_usage = None;
        let summary = KeySummary::from(&record);
        assert_eq!(summary.label, "Premium Access");
        assert_eq!(summary.usage, "2/∞");
    }
}
