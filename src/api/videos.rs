use axum::extract::State;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::procedures::{VIDEOS_CREATE, VIDEOS_GET, VIDEOS_LIST, VIDEOS_UPDATE};
use crate::api::rpc::{respond, Input, RpcResult};
use crate::db::{NewVideo, Order, StorageError, VideoPatch, VideoRow, VideoStore};
use crate::errors::AppError;
use crate::InnerState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub youtube_id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    pub transcript: Option<String>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<VideoRow> for Video {
    fn from(row: VideoRow) -> Self {
        Self {
            id: row.id,
            youtube_id: row.youtube_id,
            title: row.title,
            published_at: row.published_at,
            transcript: row.transcript,
            summary: row.summary,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GetVideoInput {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVideoInput {
    pub youtube_id: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateVideoInput {
    pub id: String,
    pub transcript: Option<String>,
    pub summary: Option<String>,
}

impl UpdateVideoInput {
    /// Empty strings count as absent, so a field can be filled but never cleared.
    fn into_patch(self) -> (String, VideoPatch) {
        let present = |value: Option<String>| value.filter(|v| !v.is_empty());
        let patch = VideoPatch {
            transcript: present(self.transcript),
            summary: present(self.summary),
        };
        (self.id, patch)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideoList {
    pub videos: Vec<Video>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideoDetail {
    pub video: Video,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VideoMutation {
    pub success: bool,
    pub video: Video,
}

fn not_found(id: &str) -> impl FnOnce(StorageError) -> AppError + '_ {
    move |err| match err {
        StorageError::NotFound(_) => AppError::NotFound(format!("Video '{id}' not found")),
        other => AppError::from(other),
    }
}

pub async fn list_videos(store: &dyn VideoStore) -> Result<VideoList, AppError> {
    let rows = store.select(Order::NEWEST_FIRST).await?;
    tracing::debug!(count = rows.len(), "Fetched videos");
    Ok(VideoList {
        videos: rows.into_iter().map(Video::from).collect(),
    })
}

pub async fn get_video(store: &dyn VideoStore, input: GetVideoInput) -> Result<VideoDetail, AppError> {
    let row = store.select_one(&input.id).await.map_err(not_found(&input.id))?;
    Ok(VideoDetail { video: row.into() })
}

pub async fn create_video(
    store: &dyn VideoStore,
    input: CreateVideoInput,
) -> Result<VideoMutation, AppError> {
    let row = store
        .insert(NewVideo {
            youtube_id: input.youtube_id,
            title: input.title,
            published_at: input.published_at,
        })
        .await?;
    tracing::info!(id = %row.id, youtube_id = %row.youtube_id, "Created video");
    Ok(VideoMutation {
        success: true,
        video: row.into(),
    })
}

pub async fn update_video(
    store: &dyn VideoStore,
    input: UpdateVideoInput,
) -> Result<VideoMutation, AppError> {
    let (id, patch) = input.into_patch();
    if patch.is_empty() {
        tracing::debug!(id = %id, "Update carries no fields, returning current row");
    }
    let row = store.update(&id, patch).await.map_err(not_found(&id))?;
    tracing::info!(id = %row.id, "Updated video");
    Ok(VideoMutation {
        success: true,
        video: row.into(),
    })
}

#[tracing::instrument(name = "videos.list", skip(inner))]
pub async fn list(State(inner): State<InnerState>) -> RpcResult<VideoList> {
    respond(VIDEOS_LIST, list_videos(inner.store.as_ref()).await)
}

#[tracing::instrument(name = "videos.get", skip(inner))]
pub async fn get(
    State(inner): State<InnerState>,
    Input(input): Input<GetVideoInput>,
) -> RpcResult<VideoDetail> {
    respond(VIDEOS_GET, get_video(inner.store.as_ref(), input).await)
}

#[tracing::instrument(name = "videos.create", skip(inner))]
pub async fn create(
    State(inner): State<InnerState>,
    Input(input): Input<CreateVideoInput>,
) -> RpcResult<VideoMutation> {
    respond(VIDEOS_CREATE, create_video(inner.store.as_ref(), input).await)
}

#[tracing::instrument(name = "videos.update", skip(inner, input), fields(id = %input.id))]
pub async fn update(
    State(inner): State<InnerState>,
    Input(input): Input<UpdateVideoInput>,
) -> RpcResult<VideoMutation> {
    respond(VIDEOS_UPDATE, update_video(inner.store.as_ref(), input).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryVideoStore;

    fn create_input(youtube_id: &str, title: &str) -> CreateVideoInput {
        CreateVideoInput {
            youtube_id: youtube_id.to_string(),
            title: title.to_string(),
            published_at: "2024-03-01T12:00:00Z".parse().unwrap(),
        }
    }

    #[tokio::test]
    async fn created_video_can_be_fetched() {
        let store = MemoryVideoStore::new();
        let created = create_video(&store, create_input("abc123", "First"))
            .await
            .unwrap();
        assert!(created.success);

        let fetched = get_video(
            &store,
            GetVideoInput {
                id: created.video.id.clone(),
            },
        )
        .await
        .unwrap()
        .video;

        assert_eq!(fetched, created.video);
        assert_eq!(fetched.youtube_id, "abc123");
        assert_eq!(fetched.title, "First");
        assert_eq!(fetched.published_at.to_rfc3339(), "2024-03-01T12:00:00+00:00");
        assert_eq!(fetched.transcript, None);
        assert_eq!(fetched.summary, None);
    }

    #[tokio::test]
    async fn update_sets_transcript_and_leaves_summary() {
        let store = MemoryVideoStore::new();
        let id = create_video(&store, create_input("abc", "t"))
            .await
            .unwrap()
            .video
            .id;
        update_video(
            &store,
            UpdateVideoInput {
                id: id.clone(),
                transcript: None,
                summary: Some("S".to_string()),
            },
        )
        .await
        .unwrap();

        let updated = update_video(
            &store,
            UpdateVideoInput {
                id: id.clone(),
                transcript: Some("T".to_string()),
                summary: None,
            },
        )
        .await
        .unwrap();
        assert!(updated.success);

        let video = get_video(&store, GetVideoInput { id }).await.unwrap().video;
        assert_eq!(video.transcript.as_deref(), Some("T"));
        assert_eq!(video.summary.as_deref(), Some("S"));
    }

    #[tokio::test]
    async fn empty_strings_do_not_clear_fields() {
        let store = MemoryVideoStore::new();
        let id = create_video(&store, create_input("abc", "t"))
            .await
            .unwrap()
            .video
            .id;
        update_video(
            &store,
            UpdateVideoInput {
                id: id.clone(),
                transcript: Some("T".to_string()),
                summary: None,
            },
        )
        .await
        .unwrap();

        let video = update_video(
            &store,
            UpdateVideoInput {
                id,
                transcript: Some(String::new()),
                summary: Some(String::new()),
            },
        )
        .await
        .unwrap()
        .video;
        assert_eq!(video.transcript.as_deref(), Some("T"));
        assert_eq!(video.summary, None);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = MemoryVideoStore::new();
        assert!(list_videos(&store).await.unwrap().videos.is_empty());

        let first = create_video(&store, create_input("one", "1")).await.unwrap();
        let second = create_video(&store, create_input("two", "2")).await.unwrap();

        let videos = list_videos(&store).await.unwrap().videos;
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].id, second.video.id);
        assert_eq!(videos[1].id, first.video.id);
    }

    #[tokio::test]
    async fn missing_video_fails() {
        let store = MemoryVideoStore::new();

        let err = get_video(&store, GetVideoInput { id: "nope".to_string() })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref msg) if msg.contains("nope")));

        let err = update_video(
            &store,
            UpdateVideoInput {
                id: "nope".to_string(),
                transcript: Some("T".to_string()),
                summary: None,
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn video_serializes_camel_case() {
        let now = Utc::now();
        let video = Video {
            id: "id".to_string(),
            youtube_id: "yt".to_string(),
            title: "t".to_string(),
            published_at: now,
            transcript: None,
            summary: None,
            created_at: now,
            updated_at: now,
        };
        let value = serde_json::to_value(&video).unwrap();
        assert_eq!(value["youtubeId"], "yt");
        assert!(value["transcript"].is_null());
        assert!(value.get("publishedAt").is_some());
        assert!(value.get("youtube_id").is_none());
    }
}
