//! UDG Key Gate - license key validation service.
//!
//! Gates a downloadable resource bundle behind a license-style key checked against a hosted key table.
//!
//! # Architecture
//!
//! - **Web Framework**: Axum (async HTTP server)
//! - **Key Table**: PostgREST over HTTP, PostgreSQL via sqlx, or in memory
//! - **Sessions**: in-memory submission state machine per user
//! - **Format**: JSON requests/responses

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod store;
