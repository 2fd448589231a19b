//! Batched procedure calls.
//!
//! `GET /trpc/videos.list,videos.get?batch=1&input={"1":{"id":"..."}}` runs
//! every comma-separated procedure in order, feeding each the input stored
//! under its index, and answers with an array of envelopes. Mutations batch
//! the same way over `POST` with the indexed object as body.
//!
//! The response status is shared by all calls when they agree, otherwise
//! `207 Multi-Status`.

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{header, Method, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::{Map, Value};
use tower::ServiceExt;

use crate::api::rpc::{procedure_path, query_input, RpcError};
use crate::errors::AppError;

const MAX_BATCH_BODY: usize = 2 * 1024 * 1024;

fn is_batch(uri: &Uri) -> bool {
    uri.query().is_some_and(|query| {
        url::form_urlencoded::parse(query.as_bytes())
            .any(|(key, value)| key == "batch" && (value == "1" || value == "true"))
    })
}

/// Splits the indexed batch input. Missing input means no call gets any.
fn indexed_inputs(raw: Option<&str>) -> Result<Map<String, Value>, AppError> {
    let Some(text) = raw.filter(|t| !t.trim().is_empty()) else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(inputs)) => Ok(inputs),
        Ok(_) => Err(AppError::Validation(
            "Batch input must be an object keyed by call index".to_string(),
        )),
        Err(e) => Err(AppError::Parse(format!("Input is not valid JSON: {e}"))),
    }
}

fn call_request(method: &Method, path: &str, input: Option<&Value>) -> Result<Request, AppError> {
    let request = if *method == Method::GET {
        let uri = match input {
            Some(input) => {
                let encoded: String =
                    url::form_urlencoded::byte_serialize(input.to_string().as_bytes()).collect();
                format!("/{path}?input={encoded}")
            }
            None => format!("/{path}"),
        };
        axum::http::Request::builder().method(Method::GET).uri(uri).body(Body::empty())
    } else {
        let body = input.map_or_else(Body::empty, |input| Body::from(input.to_string()));
        axum::http::Request::builder()
            .method(method.clone())
            .uri(format!("/{path}"))
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
    };

    request
        .map_err(|e| AppError::Unexpected(anyhow::Error::new(e).context("Could not build batched call")))
}

fn failed(error: RpcError) -> (StatusCode, Value) {
    error.record();
    (error.status(), error.body())
}

async fn run_call(
    procedures: &Router,
    method: &Method,
    path: &str,
    input: Option<&Value>,
) -> (StatusCode, Value) {
    let request = match call_request(method, path, input) {
        Ok(request) => request,
        Err(e) => return failed(RpcError::new(path, e)),
    };

    let response = match procedures.clone().oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    };
    let status = response.status();

    match to_bytes(response.into_body(), usize::MAX).await {
        Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
            Ok(envelope) => (status, envelope),
            Err(e) => failed(RpcError::new(
                path,
                AppError::Unexpected(anyhow::Error::new(e).context("Procedure answered with non-JSON")),
            )),
        },
        Err(e) => failed(RpcError::new(
            path,
            AppError::Unexpected(anyhow::Error::new(e).context("Could not read procedure response")),
        )),
    }
}

fn batch_status(statuses: &[StatusCode]) -> StatusCode {
    match statuses.split_first() {
        Some((first, rest)) if rest.iter().all(|s| s == first) => *first,
        _ => StatusCode::MULTI_STATUS,
    }
}

/// Expands batched calls against `procedures`; plain calls pass through.
pub async fn batch_middleware(
    State(procedures): State<Router>,
    request: Request,
    next: Next,
) -> Response {
    if !is_batch(request.uri()) {
        return next.run(request).await;
    }

    let joined = procedure_path(request.uri());
    let method = request.method().clone();

    let raw = if method == Method::GET {
        query_input(request.uri())
    } else {
        match to_bytes(request.into_body(), MAX_BATCH_BODY).await {
            Ok(bytes) if bytes.is_empty() => None,
            Ok(bytes) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => Some(text),
                Err(_) => {
                    let error = AppError::Parse("Body is not valid UTF-8".to_string());
                    return RpcError::new(joined, error).into_response();
                }
            },
            Err(e) => {
                let error = AppError::Parse(format!("Could not read request body: {e}"));
                return RpcError::new(joined, error).into_response();
            }
        }
    };

    let inputs = match indexed_inputs(raw.as_deref()) {
        Ok(inputs) => inputs,
        Err(e) => return RpcError::new(joined, e).into_response(),
    };

    let calls: Vec<&str> = joined.split(',').collect();
    tracing::debug!(calls = calls.len(), method = %method, "Running batched procedures");

    let mut statuses = Vec::with_capacity(calls.len());
    let mut envelopes = Vec::with_capacity(calls.len());
    for (index, path) in calls.into_iter().enumerate() {
        let input = inputs.get(&index.to_string());
        let (status, envelope) = run_call(&procedures, &method, path, input).await;
        statuses.push(status);
        envelopes.push(envelope);
    }

    (batch_status(&statuses), Json(Value::Array(envelopes))).into_response()
}
