//! Submission session models.
//!
//! A session holds one user's pass through the gate:
//!
//! ```text
//! idle -> validating -> valid | invalid
//!                         |
//!                         +-> downloading -> valid
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::validation::{ValidationOutcome, ValidationResponse};

/// Where a session is in the submission flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    Validating,
    Valid,
    Invalid,
}

/// In-memory session record.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub state: SubmissionState,
    /// Last completed validation; cleared when a new one starts
    pub result: Option<ValidationOutcome>,
    /// Set while the download trigger is running (only while `Valid`)
    pub downloading: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
}

impl Session {
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            state: SubmissionState::Idle,
            result: None,
            downloading: false,
            created_at: now,
            last_seen_at: now,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// Response body for session endpoints.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": "550e8400-e29b-41d4-a716-446655440000",
///   "state": "valid",
///   "downloading": false,
///   "result": {
///     "valid": true,
///     "verdict": "granted",
///     "message": "Key validated successfully! Access granted.",
///     "key": { "label": "Premium Access", "usage": "0/∞" }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: Uuid,
    pub state: SubmissionState,
    pub downloading: bool,
    pub result: Option<ValidationResponse>,
    pub created_at: DateTime<Utc>,
}

impl From<&Session> for SessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            state: session.state,
            downloading: session.downloading,
            result: session.result.as_ref().map(ValidationResponse::from),
            created_at: session.created_at,
        }
    }
}

/// Placeholder acknowledgement returned by the download trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadResponse {
    pub message: String,
}
