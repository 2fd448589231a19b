//! Row shapes of the `videos` table.
//!
//! The store speaks snake_case column names; the API layer converts
//! rows into [`crate::api::videos::Video`] before they leave the process.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub const VIDEOS_TABLE: &str = "videos";

/// A full row as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct VideoRow {
    pub id: String,
    pub youtube_id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub transcript: Option<String>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert shape. `id` and the bookkeeping timestamps are left to the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewVideo {
    pub youtube_id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
}

/// Update shape. Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VideoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
}

impl VideoPatch {
    pub fn is_empty(&self) -> bool {
        self.transcript.is_none() && self.summary.is_none()
    }
}

/// Sort key for list queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub column: &'static str,
    pub ascending: bool,
}

impl Order {
    pub const NEWEST_FIRST: Order = Order {
        column: "created_at",
        ascending: false,
    };
}
