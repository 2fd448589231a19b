//! Request/response logging hooks for `tower_http::trace::TraceLayer`.

use axum::http::{HeaderMap, HeaderName, Request, Response};
use std::collections::BTreeMap;
use std::time::Duration;
use tower_http::classify::ServerErrorsFailureClass;
use tracing::{info_span, Span};

const SENSITIVE_HEADERS: [&str; 4] = ["authorization", "cookie", "token", "apikey"];

fn is_sensitive(name: &HeaderName) -> bool {
    SENSITIVE_HEADERS.iter().any(|s| name.as_str().contains(s))
}

/// Request headers as logged: credentials masked, opaque values marked.
fn redacted_headers(headers: &HeaderMap) -> BTreeMap<&str, &str> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if is_sensitive(name) {
                "[REDACTED]"
            } else {
                value.to_str().unwrap_or("[binary]")
            };
            (name.as_str(), shown)
        })
        .collect()
}

/// Span wrapping one HTTP exchange.
pub fn make_span<B>(request: &Request<B>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let procedure = request
        .uri()
        .path()
        .strip_prefix("/trpc/")
        .unwrap_or_default();

    info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri().path(),
        query = ?request.uri().query(),
        procedure = procedure,
        request_id = request_id,
        user_agent = ?request.headers().get("user-agent"),
    )
}

pub fn on_request<B>(request: &Request<B>, _span: &Span) {
    tracing::info!(
        method = %request.method(),
        uri = %request.uri(),
        headers = ?redacted_headers(request.headers()),
        "Incoming HTTP request"
    );
}

pub fn on_response<B>(response: &Response<B>, latency: Duration, _span: &Span) {
    let status = response.status();
    let latency_ms = latency.as_millis();
    let quota_remaining = response
        .headers()
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok());

    if status.is_server_error() {
        tracing::error!(status = %status, latency_ms, "Request failed on the server");
    } else if status.is_client_error() {
        tracing::warn!(
            status = %status,
            latency_ms,
            quota_remaining = ?quota_remaining,
            "Request rejected"
        );
    } else {
        tracing::info!(
            status = %status,
            latency_ms,
            quota_remaining = ?quota_remaining,
            "Request served"
        );
    }
}

pub fn on_failure(failure: ServerErrorsFailureClass, latency: Duration, _span: &Span) {
    let latency_ms = latency.as_millis();
    match failure {
        ServerErrorsFailureClass::StatusCode(code) => {
            tracing::error!(status = code.as_u16(), latency_ms, "Request ended with a server error")
        }
        ServerErrorsFailureClass::Error(error) => {
            tracing::error!(error = %error, latency_ms, "Request failed without a response")
        }
    }
}
