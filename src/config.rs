//! Application configuration management.
//!
//! This module handles loading configuration from environment variables.
//! It uses the `envy` crate to automatically deserialize environment variables into a type-safe struct.

use serde::Deserialize;
use std::time::Duration;

/// Which key table backend serves lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Hosted PostgREST table (Supabase-style)
    Rest,
    /// Direct PostgreSQL connection
    Postgres,
    /// In-process table, optionally seeded from `KEYS_FILE`
    Memory,
}

/// How the usage ceiling is enforced when a key is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageEnforcement {
    /// Conditional update that only succeeds if the row is unchanged since the read.
    Atomic,
    /// Unconditional update issued after the eligibility read. Concurrent
    /// validations of the same key can both pass the ceiling check.
    ReadThenWrite,
}

/// Application configuration loaded from environment variables.
///
/// # Environment Variables
///
/// - `SUPABASE_URL` / `SUPABASE_ANON_KEY` (optional): hosted key table endpoint and anonymous token
/// - `STORE_BACKEND` (optional): `rest`, `postgres` or `memory`, defaults to `rest`
/// - `DATABASE_URL` (required for `postgres`): PostgreSQL connection string
/// - `KEYS_FILE` (optional): JSON seed file for the `memory` backend
/// - `KEY_TABLE` (optional): table name, defaults to `udg_keys`
/// - `USAGE_ENFORCEMENT` (optional): `atomic` or `read_then_write`, defaults to `atomic`
/// - `SERVER_PORT` (optional): HTTP server port, defaults to 3000
/// - `VALIDATION_DELAY_MS` / `DOWNLOAD_DELAY_MS` (optional): cosmetic delays
/// - `SESSION_TTL_SECS` (optional): idle session lifetime, defaults to 1800
/// - `STORE_TIMEOUT_SECS` (optional): per-request timeout for the hosted table, defaults to 10
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub supabase_url: Option<String>,

    pub supabase_anon_key: Option<String>,

    #[serde(default = "default_backend")]
    pub store_backend: StoreBackend,

    pub database_url: Option<String>,

    pub keys_file: Option<String>,

    #[serde(default = "default_key_table")]
    pub key_table: String,

    #[serde(default = "default_enforcement")]
    pub usage_enforcement: UsageEnforcement,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_validation_delay")]
    pub validation_delay_ms: u64,

    #[serde(default = "default_download_delay")]
    pub download_delay_ms: u64,

    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,

    #[serde(default = "default_store_timeout")]
    pub store_timeout_secs: u64,
}

fn default_backend() -> StoreBackend {
    StoreBackend::Rest
}

fn default_key_table() -> String {
    "udg_keys".to_string()
}

fn default_enforcement() -> UsageEnforcement {
    UsageEnforcement::Atomic
}

/// Default port if SERVER_PORT environment variable is not set.
fn default_port() -> u16 {
    3000
}

fn default_validation_delay() -> u64 {
    1500
}

fn default_download_delay() -> u64 {
    3000
}

fn default_session_ttl() -> u64 {
    30 * 60
}

fn default_store_timeout() -> u64 {
    10
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This method first attempts to load a `.env` file (which is optional),
    /// then reads environment variables and deserializes them into a Config struct.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variable values cannot be parsed into expected types.
    pub fn from_env() -> Result<Self, envy::Error> {
        // Try to load .env file if it exists (does nothing if not found)
        dotenvy::dotenv().ok();

        // Field names are automatically converted: key_table -> KEY_TABLE
        envy::from_env::<Config>()
    }

    /// Build configuration from explicit `(NAME, value)` pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, envy::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        envy::from_iter(vars)
    }

    /// Both hosted table credentials are present and non-empty.
    pub fn has_rest_credentials(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        present(&self.supabase_url) && present(&self.supabase_anon_key)
    }

    pub fn validation_delay(&self) -> Duration {
        Duration::from_millis(self.validation_delay_ms)
    }

    pub fn download_delay(&self) -> Duration {
        Duration::from_millis(self.download_delay_ms)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }
}
