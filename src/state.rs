//! Shared application state handed to every handler.

use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::Config,
    services::{session_service::SessionRegistry, validator::KeyValidator},
    store::KeyStore,
};

/// Fixed pauses that make the gate feel deliberate. They carry no correctness role and may be zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct Delays {
    /// Minimum time a session spends in `validating`
    pub validation: Duration,
    /// Time a session spends in `downloading`
    pub download: Duration,
}

#[derive(Clone)]
pub struct AppState {
    pub validator: KeyValidator,
    pub sessions: SessionRegistry,
    pub delays: Delays,
}

impl AppState {
    pub fn new(store: Arc<dyn KeyStore>, config: &Config) -> Self {
        Self {
            validator: KeyValidator::new(store, config.usage_enforcement),
            sessions: SessionRegistry::new(config.session_ttl()),
            delays: Delays {
                validation: config.validation_delay(),
                download: config.download_delay(),
            },
        }
    }
}
