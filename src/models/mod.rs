//! Data models representing key table rows and API payloads.

/// Key table row and its display summary
pub mod key_record;
/// Submission session state
pub mod session;
/// Validation verdicts and payloads
pub mod validation;
