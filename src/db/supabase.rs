//! Row access through the Supabase REST gateway (PostgREST).
//!
//! Every request authenticates with the service-role key, which bypasses
//! row level security. The key never leaves this module unwrapped.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, Secret};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use url::Url;

use super::schema::VIDEOS_TABLE;
use super::{NewVideo, Order, StorageError, VideoPatch, VideoRow, VideoStore};

/// Asks PostgREST for a bare object instead of an array; it answers 406 with
/// `PGRST116` unless exactly one row matched.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const NO_SINGLE_ROW: &str = "PGRST116";
const UNIQUE_VIOLATION: &str = "23505";

/// Equality predicate on one column.
#[derive(Debug, Clone)]
pub struct Filter {
    pub column: &'static str,
    pub value: String,
}

impl Filter {
    pub fn eq(column: &'static str, value: impl Into<String>) -> Self {
        Self {
            column,
            value: value.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

pub struct SupabaseClient {
    http_client: Client,
    base_url: Url,
    service_key: Secret<String>,
}

impl SupabaseClient {
    pub fn new(base_url: Url, service_key: Secret<String>) -> Self {
        Self {
            http_client: Client::new(),
            base_url,
            service_key,
        }
    }

    fn table_url(&self, table: &str, filters: &[Filter], order: Option<Order>) -> Result<Url, StorageError> {
        let mut url = self.base_url.join(&format!("rest/v1/{table}"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", "*");
            for filter in filters {
                query.append_pair(filter.column, &format!("eq.{}", filter.value));
            }
            if let Some(order) = order {
                let direction = if order.ascending { "asc" } else { "desc" };
                query.append_pair("order", &format!("{}.{direction}", order.column));
            }
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let key = self.service_key.expose_secret();
        self.http_client
            .request(method, url)
            .header("apikey", key.as_str())
            .header(AUTHORIZATION, format!("Bearer {key}"))
    }

    #[tracing::instrument(name = "supabase_select", skip(self))]
    pub async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[Filter],
        order: Option<Order>,
    ) -> Result<Vec<T>, StorageError> {
        let url = self.table_url(table, filters, order)?;
        let response = self.request(Method::GET, url).send().await?;
        Ok(check(response).await?.json().await?)
    }

    #[tracing::instrument(name = "supabase_select_one", skip(self))]
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[Filter],
    ) -> Result<T, StorageError> {
        let url = self.table_url(table, filters, None)?;
        let response = self
            .request(Method::GET, url)
            .header(ACCEPT, SINGLE_OBJECT)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    #[tracing::instrument(name = "supabase_insert", skip(self, row))]
    pub async fn insert<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        table: &str,
        row: &B,
    ) -> Result<T, StorageError> {
        let url = self.table_url(table, &[], None)?;
        let response = self
            .request(Method::POST, url)
            .header(ACCEPT, SINGLE_OBJECT)
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    #[tracing::instrument(name = "supabase_update", skip(self, patch))]
    pub async fn update<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[Filter],
        patch: &B,
    ) -> Result<T, StorageError> {
        let url = self.table_url(table, filters, None)?;
        let response = self
            .request(Method::PATCH, url)
            .header(ACCEPT, SINGLE_OBJECT)
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }
}

/// Turns a non-2xx PostgREST answer into a [`StorageError`].
async fn check(response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let body: Option<PostgrestError> = serde_json::from_str(&text).ok();
    let (code, message, details) = match body {
        Some(err) => (err.code, err.message.unwrap_or_else(|| text.clone()), err.details),
        None => (None, text, None),
    };

    tracing::warn!(
        status = status.as_u16(),
        code = ?code,
        message = %message,
        "Supabase request rejected"
    );

    match code.as_deref() {
        Some(NO_SINGLE_ROW) => {
            let details = details.unwrap_or(message);
            if details.contains(" 0 rows") {
                Err(StorageError::NotFound(details))
            } else {
                Err(StorageError::Ambiguous(details))
            }
        }
        Some(UNIQUE_VIOLATION) => Err(StorageError::Conflict(message)),
        _ => Err(StorageError::Api {
            status: status.as_u16(),
            code,
            message,
        }),
    }
}

#[derive(Serialize)]
struct TimestampedPatch<'a> {
    #[serde(flatten)]
    patch: &'a VideoPatch,
    updated_at: chrono::DateTime<chrono::Utc>,
}

#[async_trait]
impl VideoStore for SupabaseClient {
    async fn select(&self, order: Order) -> Result<Vec<VideoRow>, StorageError> {
        SupabaseClient::select(self, VIDEOS_TABLE, &[], Some(order)).await
    }

    async fn select_one(&self, id: &str) -> Result<VideoRow, StorageError> {
        SupabaseClient::select_one(self, VIDEOS_TABLE, &[Filter::eq("id", id)]).await
    }

    async fn insert(&self, video: NewVideo) -> Result<VideoRow, StorageError> {
        SupabaseClient::insert(self, VIDEOS_TABLE, &video).await
    }

    async fn update(&self, id: &str, patch: VideoPatch) -> Result<VideoRow, StorageError> {
        let filters = [Filter::eq("id", id)];
        if patch.is_empty() {
            return SupabaseClient::select_one(self, VIDEOS_TABLE, &filters).await;
        }
        let body = TimestampedPatch {
            patch: &patch,
            updated_at: chrono::Utc::now(),
        };
        SupabaseClient::update(self, VIDEOS_TABLE, &filters, &body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const KEY: &str = "service-role-key";

    fn client(server: &MockServer) -> SupabaseClient {
        let url = Url::parse(&format!("{}/", server.uri())).unwrap();
        SupabaseClient::new(url, Secret::new(KEY.to_string()))
    }

    fn row_json(id: &str) -> serde_json::Value {
        json!({
            "id": id,
            "youtube_id": "dQw4w9WgXcQ",
            "title": "Never Gonna Give You Up",
            "published_at": "2009-10-25T06:57:33Z",
            "transcript": null,
            "summary": null,
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn select_sends_credentials_and_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/videos"))
            .and(query_param("select", "*"))
            .and(query_param("order", "created_at.desc"))
            .and(header("apikey", KEY))
            .and(header("authorization", format!("Bearer {KEY}").as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([row_json("a"), row_json("b")])))
            .expect(1)
            .mount(&server)
            .await;

        let rows = VideoStore::select(&client(&server), Order::NEWEST_FIRST)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "a");
    }

    #[tokio::test]
    async fn select_one_filters_by_id_and_requests_object() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/videos"))
            .and(query_param("id", "eq.abc"))
            .and(header("accept", SINGLE_OBJECT))
            .respond_with(ResponseTemplate::new(200).set_body_json(row_json("abc")))
            .mount(&server)
            .await;

        let row = VideoStore::select_one(&client(&server), "abc").await.unwrap();
        assert_eq!(row.youtube_id, "dQw4w9WgXcQ");
        assert_eq!(row.transcript, None);
    }

    #[tokio::test]
    async fn zero_rows_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(406).set_body_json(json!({
                "code": "PGRST116",
                "message": "JSON object requested, multiple (or no) rows returned",
                "details": "The result contains 0 rows",
                "hint": null
            })))
            .mount(&server)
            .await;

        let err = VideoStore::select_one(&client(&server), "missing")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn several_rows_is_ambiguous() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(406).set_body_json(json!({
                "code": "PGRST116",
                "message": "JSON object requested, multiple (or no) rows returned",
                "details": "Results contain 2 rows, application/vnd.pgrst.object+json requires 1 row",
                "hint": null
            })))
            .mount(&server)
            .await;

        let err = VideoStore::select_one(&client(&server), "dup")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Ambiguous(_)));
    }

    #[tokio::test]
    async fn insert_posts_row_and_returns_representation() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/videos"))
            .and(header("prefer", "return=representation"))
            .and(body_json(json!({
                "youtube_id": "dQw4w9WgXcQ",
                "title": "Never Gonna Give You Up",
                "published_at": "2009-10-25T06:57:33Z"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(row_json("new-id")))
            .expect(1)
            .mount(&server)
            .await;

        let video = NewVideo {
            youtube_id: "dQw4w9WgXcQ".to_string(),
            title: "Never Gonna Give You Up".to_string(),
            published_at: "2009-10-25T06:57:33Z".parse().unwrap(),
        };
        let row = VideoStore::insert(&client(&server), video).await.unwrap();
        assert_eq!(row.id, "new-id");
    }

    #[tokio::test]
    async fn unique_violation_is_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "code": "23505",
                "message": "duplicate key value violates unique constraint \"videos_pkey\"",
                "details": null,
                "hint": null
            })))
            .mount(&server)
            .await;

        let video = NewVideo {
            youtube_id: "x".to_string(),
            title: "x".to_string(),
            published_at: Utc::now(),
        };
        let err = VideoStore::insert(&client(&server), video).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));
    }

    #[tokio::test]
    async fn update_sends_only_present_fields() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/rest/v1/videos"))
            .and(query_param("id", "eq.abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(row_json("abc")))
            .expect(1)
            .mount(&server)
            .await;

        let patch = VideoPatch {
            transcript: Some("T".to_string()),
            summary: None,
        };
        VideoStore::update(&client(&server), "abc", patch).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["transcript"], "T");
        assert!(body.get("summary").is_none());
        assert!(body.get("updated_at").is_some());
    }

    #[tokio::test]
    async fn server_errors_keep_their_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let err = VideoStore::select(&client(&server), Order::NEWEST_FIRST)
            .await
            .unwrap_err();
        match err {
            StorageError::Api { status, message, .. } => {
                assert_eq!(status, 500);
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
