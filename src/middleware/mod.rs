//! HTTP middleware components.

/// Session resolution for session-scoped routes
pub mod session;
