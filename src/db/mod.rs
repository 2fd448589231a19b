//! Storage access for the procedure layer.
//!
//! Procedures only see [`VideoStore`]; the concrete backend is picked once
//! at startup by [`init_db`] and shared through the router state.

#[cfg(test)]
pub mod memory;
pub mod postgres;
pub mod schema;
pub mod supabase;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::StorageConfig;
pub use schema::{NewVideo, Order, VideoPatch, VideoRow};

pub type DynVideoStore = Arc<dyn VideoStore>;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("no row matched {0}")]
    NotFound(String),

    #[error("expected a single row, found {0}")]
    Ambiguous(String),

    #[error("constraint violation: {0}")]
    Conflict(String),

    #[error("storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("storage returned {status}: {message}")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("invalid storage url: {0}")]
    Url(#[from] url::ParseError),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound("query".to_string()),
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                StorageError::Conflict(db.message().to_string())
            }
            _ => StorageError::Database(err),
        }
    }
}

/// Row-level operations on the `videos` table.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Every row, in the requested order.
    async fn select(&self, order: Order) -> Result<Vec<VideoRow>, StorageError>;

    /// Exactly one row by id; zero or several matches are errors.
    async fn select_one(&self, id: &str) -> Result<VideoRow, StorageError>;

    async fn insert(&self, video: NewVideo) -> Result<VideoRow, StorageError>;

    /// Applies `patch` to the row with `id` and returns the row as stored afterwards.
    async fn update(&self, id: &str, patch: VideoPatch) -> Result<VideoRow, StorageError>;
}

/// Builds the store described by `config`.
#[tracing::instrument(name = "init_db", skip(config))]
pub async fn init_db(config: StorageConfig) -> anyhow::Result<DynVideoStore> {
    match config {
        StorageConfig::Postgres { database_url } => {
            tracing::info!("Using direct Postgres storage");
            let store = postgres::PgVideoStore::connect(&database_url).await?;
            store.migrate().await?;
            Ok(Arc::new(store))
        }
        StorageConfig::Supabase { url, service_key } => {
            tracing::info!(url = %url, "Using Supabase storage");
            let client = supabase::SupabaseClient::new(url, service_key);
            Ok(Arc::new(client))
        }
    }
}
