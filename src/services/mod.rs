//! Business logic services.
//!
//! Services contain the gate's logic separated from HTTP handlers.

pub mod session_service;
pub mod validator;
