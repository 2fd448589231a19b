use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{NewVideo, Order, StorageError, VideoPatch, VideoRow, VideoStore};

/// Process-local store for tests, rows kept in insertion order.
#[derive(Debug, Default)]
pub struct MemoryVideoStore {
    rows: RwLock<Vec<VideoRow>>,
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.len()
    }

    /// Inserts a fully formed row, duplicates included. Lets tests set up
    /// states the public operations cannot produce.
    pub async fn insert_raw(&self, row: VideoRow) {
        self.rows.write().await.push(row);
    }
}

fn single<T>(mut matches: impl Iterator<Item = T>, id: &str) -> Result<T, StorageError> {
    let first = matches
        .next()
        .ok_or_else(|| StorageError::NotFound(format!("id = {id}")))?;
    let extra = matches.count();
    if extra > 0 {
        return Err(StorageError::Ambiguous(format!("{} rows for id = {id}", extra + 1)));
    }
    Ok(first)
}

fn apply(patch: VideoPatch, row: &mut VideoRow) {
    if let Some(transcript) = patch.transcript {
        row.transcript = Some(transcript);
    }
    if let Some(summary) = patch.summary {
        row.summary = Some(summary);
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    /// Sorts on `created_at` whatever the requested column.
    async fn select(&self, order: Order) -> Result<Vec<VideoRow>, StorageError> {
        let rows = self.rows.read().await;
        let mut out: Vec<VideoRow> = rows.iter().cloned().collect();
        // Stable sort: ties keep insertion order, reversed for descending.
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        if !order.ascending {
            out.reverse();
        }
        Ok(out)
    }

    async fn select_one(&self, id: &str) -> Result<VideoRow, StorageError> {
        let rows = self.rows.read().await;
        let row = single(rows.iter().filter(|r| r.id == id), id)?;
        Ok(row.clone())
    }

    async fn insert(&self, video: NewVideo) -> Result<VideoRow, StorageError> {
        let now = Utc::now();
        let row = VideoRow {
            id: Uuid::new_v4().to_string(),
            youtube_id: video.youtube_id,
            title: video.title,
            published_at: video.published_at,
            transcript: None,
            summary: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.write().await.push(row.clone());
        Ok(row)
    }

    async fn update(&self, id: &str, patch: VideoPatch) -> Result<VideoRow, StorageError> {
        let mut rows = self.rows.write().await;
        let row = single(rows.iter_mut().filter(|r| r.id == id), id)?;
        if !patch.is_empty() {
            apply(patch, row);
            row.updated_at = Utc::now();
        }
        Ok(row.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_video(youtube_id: &str) -> NewVideo {
        NewVideo {
            youtube_id: youtube_id.to_string(),
            title: format!("title {youtube_id}"),
            published_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn select_returns_newest_first() {
        let store = MemoryVideoStore::new();
        let first = store.insert(new_video("a")).await.unwrap();
        let second = store.insert(new_video("b")).await.unwrap();

        let rows = store.select(Order::NEWEST_FIRST).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, second.id);
        assert_eq!(rows[1].id, first.id);

        let oldest_first = Order {
            ascending: true,
            ..Order::NEWEST_FIRST
        };
        let rows = store.select(oldest_first).await.unwrap();
        assert_eq!(rows[0].id, first.id);
    }

    #[tokio::test]
    async fn select_one_missing_is_not_found() {
        let store = MemoryVideoStore::new();
        let err = store.select_one("nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn select_one_rejects_duplicates() {
        let store = MemoryVideoStore::new();
        let row = store.insert(new_video("a")).await.unwrap();
        store.insert_raw(row.clone()).await;

        let err = store.select_one(&row.id).await.unwrap_err();
        assert!(matches!(err, StorageError::Ambiguous(_)));
    }

    #[tokio::test]
    async fn update_patches_and_keeps_id() {
        let store = MemoryVideoStore::new();
        let row = store.insert(new_video("a")).await.unwrap();

        let updated = store
            .update(
                &row.id,
                VideoPatch {
                    transcript: None,
                    summary: Some("S".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.id, row.id);
        assert_eq!(updated.summary.as_deref(), Some("S"));
        assert_eq!(updated.transcript, None);

        let updated = store
            .update(
                &row.id,
                VideoPatch {
                    transcript: Some("T".to_string()),
                    summary: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.transcript.as_deref(), Some("T"));
        assert_eq!(updated.summary.as_deref(), Some("S"));
        assert!(updated.updated_at >= row.updated_at);
    }

    #[tokio::test]
    async fn update_missing_is_not_found() {
        let store = MemoryVideoStore::new();
        let err = store
            .update("missing", VideoPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
