//! Key validator - decides whether a submitted key currently grants access.
//!
//! # Checks
//!
//! Applied in this order, each failure short-circuits the rest:
//!
//! 1. An active record with exactly this key exists
//! 2. The key has not expired
//! 3. The key is below its usage ceiling
//!
//! On success the usage count is incremented and the last-used time set. On failure the store is never written.
//!
//! # Enforcement Modes
//!
//! With [`UsageEnforcement::ReadThenWrite`] the increment is a separate, unconditional write after the read, so two concurrent validations of a key at its ceiling can both succeed. [`UsageEnforcement::Atomic`] makes the increment conditional on the row being unchanged since the read and re-runs the checks when it is not.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::{
    config::UsageEnforcement,
    models::{
        key_record::KeyRecord,
        validation::{ValidationOutcome, Verdict},
    },
    store::{KeyStore, StoreError},
};

/// Conditional consume attempts before giving up under contention.
///
/// Running out of attempts is reported as the generic validation failure, since there is no dedicated message for contention.
const MAX_CONSUME_ATTEMPTS: usize = 3;

/// Short SHA-256 fingerprint so keys can be correlated in logs without being written there.
pub fn key_fingerprint(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..6])
}

/// Applies the eligibility checks against a [`KeyStore`].
#[derive(Clone)]
pub struct KeyValidator {
    store: Arc<dyn KeyStore>,
    enforcement: UsageEnforcement,
}

impl KeyValidator {
    pub fn new(store: Arc<dyn KeyStore>, enforcement: UsageEnforcement) -> Self {
        Self { store, enforcement }
    }

    pub fn store(&self) -> &Arc<dyn KeyStore> {
        &self.store
    }

    /// Validate a key at the current time.
    ///
    /// `key` must already be trimmed and non-empty; see [`Self::validate_submission`] for raw user input.
    pub async fn validate(&self, key: &str) -> ValidationOutcome {
        self.validate_at(key, Utc::now()).await
    }

    /// Trim raw input and validate it, rejecting blank input without touching the store.
    pub async fn validate_submission(&self, raw: &str) -> ValidationOutcome {
        let key = raw.trim();
        if key.is_empty() {
            return ValidationOutcome::rejected(Verdict::EmptyKey);
        }
        self.validate(key).await
    }

    /// Validate a key as of `now`.
    pub async fn validate_at(&self, key: &str, now: DateTime<Utc>) -> ValidationOutcome {
        let fingerprint = key_fingerprint(key);

        let outcome = match self.enforcement {
            UsageEnforcement::ReadThenWrite => self.read_then_write(key, now).await,
            UsageEnforcement::Atomic => self.atomic(key, now).await,
        };

        let outcome = outcome.unwrap_or_else(|err| {
            tracing::error!(key = %fingerprint, "Validation error: {}", err);
            ValidationOutcome::rejected(Verdict::ConnectionFailed)
        });

        tracing::info!(
            key = %fingerprint,
            verdict = ?outcome.verdict,
            "Key validation finished"
        );

        outcome
    }

    /// Steps 1-3. A failed lookup of any kind reads as an invalid key.
    async fn check(&self, key: &str, now: DateTime<Utc>) -> Result<KeyRecord, Verdict> {
        let record = match self.store.find_active(key).await {
            Ok(Some(record)) => record,
            Ok(None) => return Err(Verdict::InvalidOrInactive),
            Err(err) => {
                tracing::warn!("Key lookup failed: {}", err);
                return Err(Verdict::InvalidOrInactive);
            }
        };

        if record.is_expired_at(now) {
            return Err(Verdict::Expired);
        }

        if record.is_exhausted() {
            return Err(Verdict::UsageLimitReached);
        }

        Ok(record)
    }

    async fn read_then_write(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<ValidationOutcome, StoreError> {
        let record = match self.check(key, now).await {
            Ok(record) => record,
            Err(verdict) => return Ok(ValidationOutcome::rejected(verdict)),
        };

        // The write is not verified: a failed update still grants.
        if let Err(err) = self
            .store
            .record_usage(record.id, record.uses() + 1, now)
            .await
        {
            tracing::warn!("Usage update failed, access granted anyway: {}", err);
        }

        Ok(ValidationOutcome::granted(record))
    }

    async fn atomic(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<ValidationOutcome, StoreError> {
        for attempt in 1..=MAX_CONSUME_ATTEMPTS {
            let record = match self.check(key, now).await {
                Ok(record) => record,
                Err(verdict) => return Ok(ValidationOutcome::rejected(verdict)),
            };

            match self.store.try_consume(&record, now).await {
                Ok(Some(_)) => return Ok(ValidationOutcome::granted(record)),
                Ok(None) => {
                    tracing::debug!(attempt, "Key record changed before usage was recorded");
                }
                Err(err) if err.is_transport() => return Err(err),
                Err(err) => {
                    tracing::warn!("Usage update rejected by store: {}", err);
                    return Ok(ValidationOutcome::rejected(Verdict::ConnectionFailed));
                }
            }
        }

        tracing::warn!(
            attempts = MAX_CONSUME_ATTEMPTS,
            "Gave up recording usage under contention"
        );
        Ok(ValidationOutcome::rejected(Verdict::ConnectionFailed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryKeyStore;
    use async_trait::async_trait;
    use chrono::Duration;
    use tokio::sync::Barrier;
    use uuid::Uuid;

    const MODES: [UsageEnforcement; 2] =
        [UsageEnforcement::Atomic, UsageEnforcement::ReadThenWrite];

    fn setup(
        records: impl IntoIterator<Item = KeyRecord>,
        mode: UsageEnforcement,
    ) -> (Arc<MemoryKeyStore>, KeyValidator) {
        let store = Arc::new(MemoryKeyStore::with_records(records));
        let validator = KeyValidator::new(store.clone(), mode);
        (store, validator)
    }

    fn limited(key: &str, used: i64, max: i64) -> KeyRecord {
        let mut record = KeyRecord::new(key);
        record.usage_count = Some(used);
        record.max_usage = Some(max);
        record
    }

    /// Store that fails every call with the given error kind.
    struct FailingStore {
        transport: bool,
    }

    impl FailingStore {
        fn error(&self) -> StoreError {
            if self.transport {
                StoreError::Unavailable("connection refused".to_string())
            } else {
                StoreError::Rejected("406 Not Acceptable".to_string())
            }
        }
    }

    #[async_trait]
    impl KeyStore for FailingStore {
        async fn find_active(&self, _key: &str) -> Result<Option<KeyRecord>, StoreError> {
            Err(self.error())
        }

        async fn record_usage(
            &self,
            _id: Uuid,
            _usage_count: i64,
            _used_at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            Err(self.error())
        }

        async fn try_consume(
            &self,
            _seen: &KeyRecord,
            _used_at: DateTime<Utc>,
        ) -> Result<Option<KeyRecord>, StoreError> {
            Err(self.error())
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Err(self.error())
        }
    }

    /// Reads succeed from a real table, writes fail.
    struct ReadOnlyStore {
        inner: MemoryKeyStore,
        transport: bool,
    }

    impl ReadOnlyStore {
        fn error(&self) -> StoreError {
            if self.transport {
                StoreError::Unavailable("connection reset".to_string())
            } else {
                StoreError::Rejected("permission denied for table udg_keys".to_string())
            }
        }
    }

    #[async_trait]
    impl KeyStore for ReadOnlyStore {
        async fn find_active(&self, key: &str) -> Result<Option<KeyRecord>, StoreError> {
            self.inner.find_active(key).await
        }

        async fn record_usage(
            &self,
            _id: Uuid,
            _usage_count: i64,
            _used_at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            Err(self.error())
        }

        async fn try_consume(
            &self,
            _seen: &KeyRecord,
            _used_at: DateTime<Utc>,
        ) -> Result<Option<KeyRecord>, StoreError> {
            Err(self.error())
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    /// Holds every lookup until `parties` lookups are in flight.
    struct LockstepStore {
        inner: MemoryKeyStore,
        barrier: Barrier,
    }

    #[async_trait]
    impl KeyStore for LockstepStore {
        async fn find_active(&self, key: &str) -> Result<Option<KeyRecord>, StoreError> {
            let record = self.inner.find_active(key).await;
            self.barrier.wait().await;
            record
        }

        async fn record_usage(
            &self,
            id: Uuid,
            usage_count: i64,
            used_at: DateTime<Utc>,
        ) -> Result<(), StoreError> {
            self.inner.record_usage(id, usage_count, used_at).await
        }

        async fn try_consume(
            &self,
            seen: &KeyRecord,
            used_at: DateTime<Utc>,
        ) -> Result<Option<KeyRecord>, StoreError> {
            self.inner.try_consume(seen, used_at).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn unknown_key_is_invalid_and_store_unchanged() {
        for mode in MODES {
            let existing = KeyRecord::new("UDG-REAL-0001");
            let (store, validator) = setup([existing.clone()], mode);

            let outcome = validator.validate("UDG-NOPE-0000").await;

            assert!(!outcome.is_valid());
            assert_eq!(outcome.verdict, Verdict::InvalidOrInactive);
            assert_eq!(
                outcome.message(),
                "Invalid or inactive key. Please check your key and try again."
            );
            assert!(outcome.record.is_none());
            assert_eq!(store.get(existing.id).await.unwrap(), existing);
        }
    }

    #[tokio::test]
    async fn inactive_key_is_invalid() {
        for mode in MODES {
            let mut record = KeyRecord::new("UDG-OFF-0001");
            record.is_active = false;
            let (store, validator) = setup([record.clone()], mode);

            let outcome = validator.validate("UDG-OFF-0001").await;

            assert_eq!(outcome.verdict, Verdict::InvalidOrInactive);
            assert_eq!(store.get(record.id).await.unwrap(), record);
        }
    }

    #[tokio::test]
    async fn expired_key_is_rejected_without_increment() {
        for mode in MODES {
            let now = Utc::now();
            let mut record = limited("UDG-OLD-0001", 0, 10);
            record.expires_at = Some(now - Duration::days(1));
            let (store, validator) = setup([record.clone()], mode);

            let outcome = validator.validate_at("UDG-OLD-0001", now).await;

            assert!(!outcome.is_valid());
            assert_eq!(outcome.verdict, Verdict::Expired);
            assert_eq!(
                outcome.message(),
                "This key has expired. Please contact support for a new key."
            );
            assert_eq!(store.get(record.id).await.unwrap(), record);
        }
    }

    #[tokio::test]
    async fn expiry_is_checked_before_usage_limit() {
        let now = Utc::now();
        let mut record = limited("UDG-BOTH-0001", 5, 5);
        record.expires_at = Some(now - Duration::hours(1));
        let (_, validator) = setup([record], UsageEnforcement::Atomic);

        let outcome = validator.validate_at("UDG-BOTH-0001", now).await;
        assert_eq!(outcome.verdict, Verdict::Expired);
    }

    #[tokio::test]
    async fn exhausted_key_is_rejected_even_if_not_expired() {
        for mode in MODES {
            let now = Utc::now();
            let mut record = limited("UDG-FULL-0001", 3, 3);
            record.expires_at = Some(now + Duration::days(30));
            let (store, validator) = setup([record.clone()], mode);

            let outcome = validator.validate_at("UDG-FULL-0001", now).await;

            assert_eq!(outcome.verdict, Verdict::UsageLimitReached);
            assert_eq!(
                outcome.message(),
                "This key has reached its usage limit. Please contact support."
            );
            assert_eq!(store.get(record.id).await.unwrap(), record);
        }
    }

    #[tokio::test]
    async fn eligible_key_is_granted_and_usage_recorded() {
        for mode in MODES {
            let now = Utc::now();
            let mut record = limited("UDG-GOOD-0001", 4, 10);
            record.expires_at = Some(now + Duration::days(1));
            record.notes = Some("Lifetime".to_string());
            let (store, validator) = setup([record.clone()], mode);

            let outcome = validator.validate_at("UDG-GOOD-0001", now).await;

            assert!(outcome.is_valid());
            assert_eq!(outcome.message(), "Key validated successfully! Access granted.");
            // The returned record is the one read before the increment
            assert_eq!(outcome.record.as_ref(), Some(&record));

            let stored = store.get(record.id).await.unwrap();
            assert_eq!(stored.usage_count, Some(5));
            assert_eq!(stored.last_used_at, Some(now));
        }
    }

    #[tokio::test]
    async fn missing_usage_count_starts_from_zero() {
        for mode in MODES {
            let mut record = KeyRecord::new("UDG-NULL-0001");
            record.usage_count = None;
            let (store, validator) = setup([record.clone()], mode);

            assert!(validator.validate("UDG-NULL-0001").await.is_valid());
            assert_eq!(store.get(record.id).await.unwrap().usage_count, Some(1));
        }
    }

    #[tokio::test]
    async fn zero_limit_is_unlimited() {
        let record = limited("UDG-ZERO-0001", 7, 0);
        let (store, validator) = setup([record.clone()], UsageEnforcement::Atomic);

        assert!(validator.validate("UDG-ZERO-0001").await.is_valid());
        assert_eq!(store.get(record.id).await.unwrap().usage_count, Some(8));
    }

    #[tokio::test]
    async fn scenario_last_use_then_limit() {
        for mode in MODES {
            let mut record = KeyRecord::new("UDG-TEST-0001");
            record.usage_count = Some(2);
            record.max_usage = Some(3);
            let (store, validator) = setup([record.clone()], mode);

            let first = validator.validate("UDG-TEST-0001").await;
            assert!(first.is_valid());
            assert_eq!(store.get(record.id).await.unwrap().usage_count, Some(3));

            let second = validator.validate("UDG-TEST-0001").await;
            assert!(!second.is_valid());
            assert_eq!(second.verdict, Verdict::UsageLimitReached);
            assert_eq!(store.get(record.id).await.unwrap().usage_count, Some(3));
        }
    }

    #[tokio::test]
    async fn submission_is_trimmed_and_blank_rejected() {
        let record = KeyRecord::new("UDG-TRIM-0001");
        let (store, validator) = setup([record.clone()], UsageEnforcement::Atomic);

        let blank = validator.validate_submission("   \t").await;
        assert_eq!(blank.verdict, Verdict::EmptyKey);
        assert_eq!(blank.message(), "Please enter a valid UDG key.");

        let padded = validator.validate_submission("  UDG-TRIM-0001\n").await;
        assert!(padded.is_valid());
        assert_eq!(store.get(record.id).await.unwrap().usage_count, Some(1));
    }

    #[tokio::test]
    async fn lookup_failure_of_any_kind_reads_as_invalid() {
        for mode in MODES {
            for transport in [true, false] {
                let validator = KeyValidator::new(Arc::new(FailingStore { transport }), mode);

                let outcome = validator.validate("UDG-TEST-0001").await;
                assert_eq!(outcome.verdict, Verdict::InvalidOrInactive);
                assert_eq!(
                    outcome.message(),
                    "Invalid or inactive key. Please check your key and try again."
                );
                assert!(outcome.record.is_none());
            }
        }
    }

    #[tokio::test]
    async fn unverified_write_still_grants_in_read_then_write() {
        for transport in [true, false] {
            let store = ReadOnlyStore {
                inner: MemoryKeyStore::with_records([KeyRecord::new("UDG-RO-0001")]),
                transport,
            };
            let validator = KeyValidator::new(Arc::new(store), UsageEnforcement::ReadThenWrite);

            let outcome = validator.validate("UDG-RO-0001").await;
            assert!(outcome.is_valid());
            assert_eq!(outcome.verdict, Verdict::Granted);
        }
    }

    #[tokio::test]
    async fn failed_write_fails_validation_in_atomic_mode() {
        for transport in [true, false] {
            let store = ReadOnlyStore {
                inner: MemoryKeyStore::with_records([KeyRecord::new("UDG-RO-0002")]),
                transport,
            };
            let validator = KeyValidator::new(Arc::new(store), UsageEnforcement::Atomic);

            let outcome = validator.validate("UDG-RO-0002").await;
            assert_eq!(outcome.verdict, Verdict::ConnectionFailed);
            assert_eq!(
                outcome.message(),
                "Validation failed. Please check your connection and try again."
            );
        }
    }

    #[tokio::test]
    async fn concurrent_validations_race_in_read_then_write() {
        let record = limited("UDG-RACE-0001", 2, 3);
        let store = Arc::new(LockstepStore {
            inner: MemoryKeyStore::with_records([record.clone()]),
            barrier: Barrier::new(2),
        });
        let validator = KeyValidator::new(store.clone(), UsageEnforcement::ReadThenWrite);

        let (a, b) = tokio::join!(
            validator.validate("UDG-RACE-0001"),
            validator.validate("UDG-RACE-0001")
        );

        // Both read usage_count = 2 before either wrote
        assert!(a.is_valid());
        assert!(b.is_valid());
    }

    #[tokio::test]
    async fn concurrent_validations_respect_ceiling_in_atomic_mode() {
        let record = limited("UDG-RACE-0002", 2, 3);
        let store = Arc::new(LockstepStore {
            inner: MemoryKeyStore::with_records([record.clone()]),
            barrier: Barrier::new(2),
        });
        let validator = KeyValidator::new(store.clone(), UsageEnforcement::Atomic);

        // The loser re-reads alone, so release it with a third lookup
        let (a, b, _) = tokio::join!(
            validator.validate("UDG-RACE-0002"),
            validator.validate("UDG-RACE-0002"),
            async {
                tokio::task::yield_now().await;
                store.find_active("UDG-RACE-0002").await
            }
        );

        let granted = [&a, &b].iter().filter(|o| o.is_valid()).count();
        assert_eq!(granted, 1);

        let loser = if a.is_valid() { &b } else { &a };
        assert_eq!(loser.verdict, Verdict::UsageLimitReached);
        assert_eq!(
            store.inner.get(record.id).await.unwrap().usage_count,
            Some(3)
        );
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        assert_eq!(key_fingerprint("UDG-TEST-0001"), key_fingerprint("UDG-TEST-0001"));
        assert_ne!(key_fingerprint("UDG-TEST-0001"), key_fingerprint("UDG-TEST-0002"));
        assert_eq!(key_fingerprint("UDG-TEST-0001").len(), 12);
    }
}
