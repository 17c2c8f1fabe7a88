//! HTTP request handlers (route handlers).
//!
//! Each handler is an async function that:
//! 1. Receives HTTP request data (JSON body, session context)
//! 2. Calls the validator or session registry
//! 3. Returns HTTP response (JSON, status code)

/// Service health endpoint
pub mod health;
/// Stateless key validation
pub mod keys;
/// Submission session endpoints
pub mod sessions;
