//! Router construction and key store selection.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    config::{Config, StoreBackend},
    db, handlers, middleware,
    state::AppState,
    store::{KeyStore, memory::MemoryKeyStore, postgres::PgKeyStore, rest::RestKeyStore},
};

/// Build the key store selected by `STORE_BACKEND`.
///
/// Missing hosted-table credentials are logged but do not stop startup; lookups fail until they are provided.
pub async fn build_store(config: &Config) -> anyhow::Result<Arc<dyn KeyStore>> {
    let store: Arc<dyn KeyStore> = match config.store_backend {
        StoreBackend::Rest => {
            if !config.has_rest_credentials() {
                tracing::warn!(
                    "Key store credentials not found. Please set SUPABASE_URL and SUPABASE_ANON_KEY."
                );
            }
            Arc::new(RestKeyStore::new(
                config.supabase_url.as_deref(),
                config.supabase_anon_key.as_deref(),
                &config.key_table,
                config.store_timeout(),
            )?)
        }
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres key store")?;

            let pool = db::create_pool(database_url).await?;
            tracing::info!("Database pool created");

            db::run_migrations(&pool).await?;
            tracing::info!("Database migrations complete");

            Arc::new(PgKeyStore::new(pool))
        }
        StoreBackend::Memory => match config.keys_file.as_deref() {
            Some(path) => Arc::new(
                MemoryKeyStore::from_json_file(path)
                    .await
                    .with_context(|| format!("failed to load key records from {}", path))?,
            ),
            None => {
                tracing::warn!("Memory key store started empty; set KEYS_FILE to seed it");
                Arc::new(MemoryKeyStore::new())
            }
        },
    };

    tracing::info!(
        backend = ?config.store_backend,
        enforcement = ?config.usage_enforcement,
        "Key store ready"
    );

    Ok(store)
}

/// Build the HTTP router.
pub fn router(state: AppState) -> Router {
    // Session-scoped routes
    let session_routes = Router::new()
        .route("/api/v1/session", get(handlers::sessions::get_session))
        .route(
            "/api/v1/session/validate",
            post(handlers::sessions::submit_key),
        )
        .route(
            "/api/v1/session/download",
            post(handlers::sessions::trigger_download),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::session::session_middleware,
        ));

    Router::new()
        // Public routes
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/v1/keys/validate",
            post(handlers::keys::validate_key),
        )
        .route(
            "/api/v1/sessions",
            post(handlers::sessions::create_session),
        )
        .merge(session_routes)
        // The gate UI is served from a different origin
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
