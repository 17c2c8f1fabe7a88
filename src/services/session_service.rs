//! Submission sessions - the gate's per-user state machine.
//!
//! # Transitions
//!
//! - `begin_validation`: any state except `validating` -> `validating`, clearing the previous result
//! - `complete_validation`: `validating` -> `valid` | `invalid`
//! - `begin_download` / `finish_download`: toggle the download sub-state, only while `valid`
//!
//! Only one validation or download runs per session at a time; a second attempt is refused with [`AppError::SessionBusy`]. Different sessions never block each other.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    error::AppError,
    models::{
        session::{Session, SubmissionState},
        validation::ValidationOutcome,
    },
};

/// Shared registry of live sessions.
#[derive(Debug, Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<Uuid, Session>>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            ttl,
        }
    }

    /// Create a new `idle` session, pruning sessions idle longer than the TTL.
    pub async fn create(&self) -> Session {
        let session = Session::new();
        let mut sessions = self.sessions.lock().await;

        let before = sessions.len();
        let ttl =
            chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::days(365));
        let cutoff = Utc::now() - ttl;
        // Busy sessions are kept so the running task can still complete them
        sessions.retain(|_, s| {
            s.last_seen_at >= cutoff || s.state == SubmissionState::Validating || s.downloading
        });
        let pruned = before - sessions.len();
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned idle sessions");
        }

        sessions.insert(session.id, session.clone());
        session
    }

    pub async fn get(&self, id: Uuid) -> Result<Session, AppError> {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(&id).ok_or(AppError::SessionNotFound)?;
        session.last_seen_at = Utc::now();
        Ok(session.clone())
    }

    /// Record an immediate result without running a validation (blank input).
    pub async fn reject_submission(
        &self,
        id: Uuid,
        outcome: ValidationOutcome,
    ) -> Result<Session, AppError> {
        self.update(id, |session| {
            if session.state == SubmissionState::Validating || session.downloading {
                return Err(AppError::SessionBusy);
            }
            session.state = SubmissionState::Invalid;
            session.result = Some(outcome);
            Ok(())
        })
        .await
    }

    pub async fn begin_validation(&self, id: Uuid) -> Result<Session, AppError> {
        self.update(id, |session| {
            if session.state == SubmissionState::Validating || session.downloading {
                return Err(AppError::SessionBusy);
            }
            session.state = SubmissionState::Validating;
            session.result = None;
            Ok(())
        })
        .await
    }

    pub async fn complete_validation(
        &self,
        id: Uuid,
        outcome: ValidationOutcome,
    ) -> Result<Session, AppError> {
        self.update(id, |session| {
            if session.state != SubmissionState::Validating {
                return Err(AppError::InvalidRequest(
                    "No validation in progress".to_string(),
                ));
            }
            session.state = if outcome.is_valid() {
                SubmissionState::Valid
            } else {
                SubmissionState::Invalid
            };
            session.result = Some(outcome);
            Ok(())
        })
        .await
    }

    pub async fn begin_download(&self, id: Uuid) -> Result<Session, AppError> {
        self.update(id, |session| {
            if session.state != SubmissionState::Valid {
                return Err(AppError::DownloadNotAllowed);
            }
            if session.downloading {
                return Err(AppError::SessionBusy);
            }
            session.downloading = true;
            Ok(())
        })
        .await
    }

    pub async fn finish_download(&self, id: Uuid) -> Result<Session, AppError> {
        self.update(id, |session| {
            session.downloading = false;
            Ok(())
        })
        .await
    }

    async fn update<F>(&self, id: Uuid, apply: F) -> Result<Session, AppError>
    where
        F: FnOnce(&mut Session) -> Result<(), AppError>,
    {
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_mut(&id).ok_or(AppError::SessionNotFound)?;
        apply(session)?;
        session.last_seen_at = Utc::now();
        Ok(session.clone())
    }
}
