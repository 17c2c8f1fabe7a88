//! Hosted key table accessed over PostgREST (the Supabase REST interface).
//!
//! # Requests
//!
//! - Lookup: `GET /rest/v1/<table>?select=*&key=eq.<key>&is_active=eq.true`
//! - Record usage: `PATCH /rest/v1/<table>?id=eq.<id>`
//! - Consume: `PATCH /rest/v1/<table>?id=eq.<id>&is_active=eq.true&usage_count=eq.<seen>&and=(<expiry>,<ceiling>)`
//!   with `Prefer: return=representation`, so an empty result means the row changed
//!
//! Every request carries the anonymous token in both the `apikey` and `Authorization: Bearer` headers.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use url::Url;
use uuid::Uuid;

use super::{KeyStore, StoreError};
use crate::models::key_record::KeyRecord;

/// Partial update body for usage recording.
#[derive(Debug, Serialize)]
struct UsageUpdate {
    usage_count: i64,
    last_used_at: DateTime<Utc>,
}

/// Key table reached through a PostgREST endpoint.
#[derive(Debug, Clone)]
pub struct RestKeyStore {
    client: Client,
    /// `None` when no endpoint is configured; every call then fails with [`StoreError::NotConfigured`].
    table_url: Option<Url>,
    anon_key: String,
}

impl RestKeyStore {
    /// Create a store for `<base_url>/rest/v1/<table>`.
    ///
    /// A missing or unparsable base URL does not fail construction: the service still starts and lookups fail until the endpoint is fixed.
    pub fn new(
        base_url: Option<&str>,
        anon_key: Option<&str>,
        table: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("HTTP client error: {}", e)))?;

        let table_url = base_url
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .and_then(|url| match build_table_url(url, table) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::warn!("Ignoring invalid key store URL {}: {}", url, e);
                    None
                }
            });

        Ok(Self {
            client,
            table_url,
            anon_key: anon_key.unwrap_or_default().to_string(),
        })
    }

    fn endpoint(&self) -> Result<&Url, StoreError> {
        self.table_url.as_ref().ok_or(StoreError::NotConfigured)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }

    async fn patch_usage(
        &self,
        filters: &[(&str, String)],
        update: &UsageUpdate,
        prefer: &str,
    ) -> Result<Response, StoreError> {
        let url = self.endpoint()?;
        let response = self
            .authorize(self.client.patch(url.clone()))
            .query(filters)
            .header("Prefer", prefer)
            .json(update)
            .send()
            .await?;

        ensure_success(response).await
    }
}

/// Join `<base>/rest/v1/<table>`, tolerating a trailing slash on the base.
fn build_table_url(base: &str, table: &str) -> Result<Url, url::ParseError> {
    let base = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{}/", base)
    };
    Url::parse(&base)?.join(&format!("rest/v1/{}", table))
}

/// Logic-tree filter for the parts of the consume condition that are not plain equality:
/// unexpired at `used_at` and below the ceiling (missing or zero `max_usage` is unlimited).
fn consume_guard(seen: &KeyRecord, used_at: DateTime<Utc>) -> String {
    let used_at = used_at.to_rfc3339_opts(SecondsFormat::Micros, true);
    format!(
        "(or(expires_at.is.null,expires_at.gte.\"{}\"),or(max_usage.is.null,max_usage.eq.0,max_usage.gt.{}))",
        used_at,
        seen.uses()
    )
}

/// Map non-2xx responses to [`StoreError::Rejected`], keeping the store's error body.
async fn ensure_success(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Rejected(format!("{}: {}", status, body)))
}

#[async_trait]
impl KeyStore for RestKeyStore {
    async fn find_active(&self, key: &str) -> Result<Option<KeyRecord>, StoreError> {
        let url = self.endpoint()?;
        let response = self
            .authorize(self.client.get(url.clone()))
            .query(&[
                ("select", "*".to_string()),
                ("key", format!("eq.{}", key)),
                ("is_active", "eq.true".to_string()),
                // Two rows is enough to tell "unique" from "ambiguous"
                ("limit", "2".to_string()),
            ])
            .send()
            .await?;

        let mut rows: Vec<KeyRecord> = ensure_success(response).await?.json().await?;

        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            n => Err(StoreError::Rejected(format!(
                "expected a single key record, found {}",
                n
            ))),
        }
    }

    async fn record_usage(
        &self,
        id: Uuid,
        usage_count: i64,
        used_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let update = UsageUpdate {
            usage_count,
            last_used_at: used_at,
        };

        self.patch_usage(&[("id", format!("eq.{}", id))], &update, "return=minimal")
            .await?;

        Ok(())
    }

    async fn try_consume(
        &self,
        seen: &KeyRecord,
        used_at: DateTime<Utc>,
    ) -> Result<Option<KeyRecord>, StoreError> {
        let seen_count = match seen.usage_count {
            Some(count) => format!("eq.{}", count),
            None => "is.null".to_string(),
        };
        let update = UsageUpdate {
            usage_count: seen.uses() + 1,
            last_used_at: used_at,
        };

        let response = self
            .patch_usage(
                &[
                    ("id", format!("eq.{}", seen.id)),
                    ("is_active", "eq.true".to_string()),
                    ("usage_count", seen_count),
                    ("and", consume_guard(seen, used_at)),
                ],
                &update,
                "return=representation",
            )
            .await?;

        let mut rows: Vec<KeyRecord> = response.json().await?;
        Ok(rows.pop())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let url = self.endpoint()?;
        let response = self
            .authorize(self.client.get(url.clone()))
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }
}
