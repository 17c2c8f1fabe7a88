//! Validation verdicts and the request/response types that carry them.

use serde::{Deserialize, Serialize};

use crate::models::key_record::{KeyRecord, KeySummary};

/// Why a submitted key was accepted or rejected.
///
/// The categories are deliberately coarse: a missing key, an inactive key and a store-side lookup error all read as [`Verdict::InvalidOrInactive`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Granted,
    EmptyKey,
    InvalidOrInactive,
    Expired,
    UsageLimitReached,
    /// The store could not be reached during lookup or usage recording.
    ConnectionFailed,
}

impl Verdict {
    pub fn is_valid(self) -> bool {
        matches!(self, Verdict::Granted)
    }

    /// User-facing message for this verdict.
    pub fn message(self) -> &'static str {
        match self {
            Verdict::Granted => "Key validated successfully! Access granted.",
            Verdict::EmptyKey => "Please enter a valid UDG key.",
            Verdict::InvalidOrInactive => {
                "Invalid or inactive key. Please check your key and try again."
            }
            Verdict::Expired => "This key has expired. Please contact support for a new key.",
            Verdict::UsageLimitReached => {
                "This key has reached its usage limit. Please contact support."
            }
            Verdict::ConnectionFailed => {
                "Validation failed. Please check your connection and try again."
            }
        }
    }
}

/// Result of one validation.
///
/// `record` is only present for [`Verdict::Granted`] and holds the record as it was read, before usage was recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub verdict: Verdict,
    pub record: Option<KeyRecord>,
}

impl ValidationOutcome {
    pub fn granted(record: KeyRecord) -> Self {
        Self {
            verdict: Verdict::Granted,
            record: Some(record),
        }
    }

    pub fn rejected(verdict: Verdict) -> Self {
        Self {
            verdict,
            record: None,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.verdict.is_valid()
    }

    pub fn message(&self) -> &'static str {
        self.verdict.message()
    }
}

/// Request body for key validation.
///
/// # JSON Example
///
/// ```json
/// {
///   "key": "UDG-XXXX-XXXX-XXXX"
/// }
/// ```
#[derive(Debug, Deserialize)]
pub struct ValidateKeyRequest {
    pub key: String,
}

/// Response body for a validation.
///
/// # JSON Example
///
/// ```json
/// {
///   "valid": true,
///   "verdict": "granted",
///   "message": "Key validated successfully! Access granted.",
///   "key": { "label": "Premium Access", "usage": "2/3" }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub valid: bool,

    pub verdict: Verdict,

    pub message: String,

    /// Only present when the key was accepted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<KeySummary>,
}

impl From<&ValidationOutcome> for ValidationResponse {
    fn from(outcome: &ValidationOutcome) -> Self {
        Self {
            valid: outcome.is_valid(),
            verdict: outcome.verdict,
            message: outcome.message().to_string(),
            key: outcome.record.as_ref().map(KeySummary::from),
        }
    }
}
