use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool};
use uuid::Uuid;

use super::{NewVideo, Order, StorageError, VideoPatch, VideoRow, VideoStore};

const CREATE_VIDEOS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS videos (
    id           TEXT PRIMARY KEY,
    youtube_id   TEXT NOT NULL,
    title        TEXT NOT NULL,
    published_at TIMESTAMPTZ NOT NULL,
    transcript   TEXT,
    summary      TEXT,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at   TIMESTAMPTZ NOT NULL DEFAULT now()
)"#;

const VIDEO_COLUMNS: &str =
    "id, youtube_id, title, published_at, transcript, summary, created_at, updated_at";

/// Talks to Postgres directly instead of going through the REST gateway.
#[derive(Clone, Debug)]
pub struct PgVideoStore {
    db: PgPool,
}

impl PgVideoStore {
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let db = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self { db })
    }

    pub async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(CREATE_VIDEOS_TABLE).execute(&self.db).await?;
        Ok(())
    }
}

/// Zero rows and several rows are both errors, matching the REST backend.
fn exactly_one(mut rows: Vec<VideoRow>, id: &str) -> Result<VideoRow, StorageError> {
    match rows.len() {
        0 => Err(StorageError::NotFound(format!("id = {id}"))),
        1 => Ok(rows.remove(0)),
        n => Err(StorageError::Ambiguous(format!("{n} rows for id = {id}"))),
    }
}

#[async_trait]
impl VideoStore for PgVideoStore {
    #[tracing::instrument(name = "pg_select_videos", skip(self))]
    async fn select(&self, order: Order) -> Result<Vec<VideoRow>, StorageError> {
        let direction = if order.ascending { "ASC" } else { "DESC" };
        let sql = format!(
            "SELECT {VIDEO_COLUMNS} FROM videos ORDER BY {} {direction}",
            order.column
        );
        let rows = sqlx::query_as::<_, VideoRow>(&sql)
            .fetch_all(&self.db)
            .await?;
        Ok(rows)
    }

    #[tracing::instrument(name = "pg_select_video", skip(self))]
    async fn select_one(&self, id: &str) -> Result<VideoRow, StorageError> {
        let rows = sqlx::query_as::<_, VideoRow>(&format!(
            "SELECT {VIDEO_COLUMNS} FROM videos WHERE id = $1"
        ))
        .bind(id)
        .fetch_all(&self.db)
        .await?;
        exactly_one(rows, id)
    }

    #[tracing::instrument(name = "pg_insert_video", skip(self))]
    async fn insert(&self, video: NewVideo) -> Result<VideoRow, StorageError> {
        let row = sqlx::query_as::<_, VideoRow>(&format!(
            "INSERT INTO videos (id, youtube_id, title, published_at) \
             VALUES ($1, $2, $3, $4) RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(Uuid::new_v4().to_string())
        .bind(&video.youtube_id)
        .bind(&video.title)
        .bind(video.published_at)
        .fetch_one(&self.db)
        .await?;
        Ok(row)
    }

    #[tracing::instrument(name = "pg_update_video", skip(self))]
    async fn update(&self, id: &str, patch: VideoPatch) -> Result<VideoRow, StorageError> {
        if patch.is_empty() {
            return self.select_one(id).await;
        }

        let rows = sqlx::query_as::<_, VideoRow>(&format!(
            "UPDATE videos SET \
                 transcript = COALESCE($2, transcript), \
                 summary = COALESCE($3, summary), \
                 updated_at = now() \
             WHERE id = $1 RETURNING {VIDEO_COLUMNS}"
        ))
        .bind(id)
        .bind(patch.transcript)
        .bind(patch.summary)
        .fetch_all(&self.db)
        .await?;
        exactly_one(rows, id)
    }
}
