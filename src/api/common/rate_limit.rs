//! Fixed-window request quota per client address.
//!
//! Each client gets `max_requests` per window. The window starts with the
//! client's first request and is replaced once it has fully elapsed.
//!
//! ## Response headers
//!
//! - `x-ratelimit-limit`: configured quota
//! - `x-ratelimit-remaining`: requests left in the current window
//! - `x-ratelimit-reset`: seconds until the window ends
//! - `retry-after`: on `429 Too Many Requests` only

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tokio::sync::Mutex;

/// Expired windows are swept once this many clients are tracked.
const PRUNE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 5,
            window: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32, reset: Duration },
    Limited { retry_after: Duration },
}

#[derive(Debug, Default)]
struct Windows {
    clients: HashMap<IpAddr, Window>,
    last_pruned: Option<Instant>,
}

impl Windows {
    /// Sweeps expired windows, at most once per window length.
    fn prune(&mut self, now: Instant, window_len: Duration) {
        if self.clients.len() < PRUNE_THRESHOLD {
            return;
        }
        if self
            .last_pruned
            .is_some_and(|at| now.saturating_duration_since(at) < window_len)
        {
            return;
        }
        self.clients
            .retain(|_, w| now.saturating_duration_since(w.started) < window_len);
        self.last_pruned = Some(now);
    }
}

#[derive(Clone, Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Arc<Mutex<Windows>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Arc::new(Mutex::new(Windows::default())),
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.windows.lock().await.clients.len()
    }

    pub async fn check(&self, client: IpAddr) -> Decision {
        self.check_at(client, Instant::now()).await
    }

    /// Counts one request from `client` at `now`.
    pub async fn check_at(&self, client: IpAddr, now: Instant) -> Decision {
        let window_len = self.config.window;
        let mut windows = self.windows.lock().await;

        if !windows.clients.contains_key(&client) {
            windows.prune(now, window_len);
        }

        let window = windows.clients.entry(client).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.saturating_duration_since(window.started) >= window_len {
            *window = Window {
                started: now,
                count: 0,
            };
        }

        let reset = window_len.saturating_sub(now.saturating_duration_since(window.started));
        if window.count >= self.config.max_requests {
            return Decision::Limited { retry_after: reset };
        }

        window.count += 1;
        Decision::Allowed {
            remaining: self.config.max_requests - window.count,
            reset,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TooManyRequests {
    code: u16,
    error: &'static str,
    message: String,
    /// Milliseconds since the Unix epoch.
    date: i64,
    /// Seconds until the client may retry.
    expires_in: u64,
}

fn ceil_secs(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs + 1
    } else {
        secs
    }
}

fn describe_window(window: Duration) -> String {
    match window.as_secs() {
        60 => "minute".to_string(),
        1 => "second".to_string(),
        secs => format!("{secs} seconds"),
    }
}

fn set_header(headers: &mut HeaderMap, name: &'static str, value: u64) {
    headers.insert(name, HeaderValue::from(value));
}

fn too_many_requests(config: &RateLimitConfig, retry_after: Duration) -> Response {
    let expires_in = ceil_secs(retry_after);
    let body = TooManyRequests {
        code: StatusCode::TOO_MANY_REQUESTS.as_u16(),
        error: "Too Many Requests",
        message: format!(
            "Rate limit exceeded, retry in {} seconds. Max {} requests per {}.",
            expires_in,
            config.max_requests,
            describe_window(config.window)
        ),
        date: chrono::Utc::now().timestamp_millis(),
        expires_in,
    };

    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    let headers = response.headers_mut();
    set_header(headers, "x-ratelimit-limit", config.max_requests.into());
    set_header(headers, "x-ratelimit-remaining", 0);
    set_header(headers, "x-ratelimit-reset", expires_in);
    headers.insert(header::RETRY_AFTER, HeaderValue::from(expires_in));
    response
}

/// Address the quota is charged to. Requests without connection info
/// (in-process calls) share one bucket.
fn client_addr(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_addr(&request);

    match limiter.check(client).await {
        Decision::Allowed { remaining, reset } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            set_header(headers, "x-ratelimit-limit", limiter.config().max_requests.into());
            set_header(headers, "x-ratelimit-remaining", remaining.into());
            set_header(headers, "x-ratelimit-reset", ceil_secs(reset));
            response
        }
        Decision::Limited { retry_after } => {
            tracing::warn!(
                client = %client,
                retry_after_secs = retry_after.as_secs(),
                "Rate limit exceeded"
            );
            metrics::counter!("api_ingest_rate_limited_total").increment(1);
            too_many_requests(limiter.config(), retry_after)
        }
    }
}
