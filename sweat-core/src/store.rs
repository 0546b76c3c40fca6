//! Result store: append-only persistence of analysis records
//!
//! Two backends implement `ResultStore`:
//! - **rest**: PostgREST insert, the protocol behind Supabase table clients
//! - **postgres**: direct `INSERT` through an sqlx pool

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use sqlx::PgPool;
use thiserror::Error;

use crate::config::{StoreBackend, SweatConfig};
use crate::models::ResultRecord;

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Insert one record. No update or delete path exists.
    async fn persist(&self, record: &ResultRecord) -> Result<(), StoreError>;

    /// Backend version for health reporting, when the backend can be probed.
    async fn health(&self) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    /// Backend name for logging.
    fn name(&self) -> &str;
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("No user profile available to attribute the result")]
    MissingUser,

    #[error("Store misconfigured: {0}")]
    Config(String),
}

// ============================================================================
// RestResultStore
// ============================================================================

#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RestResultStore {
    client: Client,
    base_url: String,
    api_key: String,
    bearer: String,
    table: String,
}

impl RestResultStore {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        access_token: Option<String>,
        table: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let base_url = base_url.into();
        let api_key = api_key.into();
        if base_url.is_empty() {
            return Err(StoreError::Config("store.url is not set".to_string()));
        }
        if api_key.is_empty() {
            return Err(StoreError::Config("store.api_key is not set".to_string()));
        }

        let bearer = access_token.unwrap_or_else(|| api_key.clone());
        Ok(Self {
            client: Client::builder().build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            bearer,
            table: table.into(),
        })
    }
}

#[async_trait]
impl ResultStore for RestResultStore {
    async fn persist(&self, record: &ResultRecord) -> Result<(), StoreError> {
        let url = format!("{}/rest/v1/{}", self.base_url, self.table);

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.bearer)
            .header("Prefer", "return=minimal")
            .json(&[record])
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<PostgrestError>(&body).ok();
        let code = detail.as_ref().and_then(|d| d.code.clone());
        let message = detail
            .and_then(|d| d.message)
            .unwrap_or_else(|| if body.is_empty() { status.to_string() } else { body });

        tracing::error!(status = status.as_u16(), code = ?code, message = %message, "Result insert rejected");

        Err(StoreError::Api {
            status: status.as_u16(),
            code,
            message,
        })
    }

    fn name(&self) -> &str {
        "rest"
    }
}

// ============================================================================
// PgResultStore
// ============================================================================

#[derive(Debug, Clone)]
pub struct PgResultStore {
    pool: PgPool,
    insert_sql: String,
}

impl PgResultStore {
    pub fn new(pool: PgPool, table: &str) -> Result<Self, StoreError> {
        if table.is_empty() || !table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.') {
            return Err(StoreError::Config(format!("invalid table name: {:?}", table)));
        }
        let insert_sql = format!(
            "INSERT INTO {} (user_id, glucose, ph, cortisol, salt, ai_insight, pcos_score) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            table
        );
        Ok(Self { pool, insert_sql })
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn persist(&self, record: &ResultRecord) -> Result<(), StoreError> {
        sqlx::query(&self.insert_sql)
            .bind(record.user_id)
            .bind(&record.glucose)
            .bind(&record.ph)
            .bind(&record.cortisol)
            .bind(&record.salt)
            .bind(&record.ai_insight)
            .bind(record.pcos_score as i32)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn health(&self) -> Result<Option<String>, StoreError> {
        Ok(Some(crate::db::health_check(&self.pool).await?))
    }

    fn name(&self) -> &str {
        "postgres"
    }
}

/// Create the configured result store.
pub async fn create_store(config: &SweatConfig) -> Result<Box<dyn ResultStore>, StoreError> {
    tracing::info!(
        backend = config.store.backend.as_str(),
        table = %config.store.table,
        "Creating result store"
    );
    match config.store.backend {
        StoreBackend::Rest => Ok(Box::new(RestResultStore::new(
            config.store.url.clone(),
            config.store.api_key.clone(),
            config.store.access_token.clone(),
            config.store.table.clone(),
        )?)),
        StoreBackend::Postgres => {
            let db = config.database.as_ref().ok_or_else(|| {
                StoreError::Config("postgres backend requires [database]".to_string())
            })?;
            let pool = crate::db::create_pool(db).await?;
            Ok(Box::new(PgResultStore::new(pool, &config.store.table)?))
        }
    }
}
