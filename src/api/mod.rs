//! HTTP surface of the service.
//!
//! Procedures live under `/trpc`, singly or batched, `/health` sits beside them. One add-on
//! is layered on top depending on configuration: the per-client rate guard
//! or the development panel at `/panel`.

pub mod batch;
pub mod channels;
pub mod common;
pub mod procedures;
pub mod routes;
pub mod rpc;
pub mod videos;

use axum::body::Body;
use axum::routing::get;
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::common::panel;
use crate::api::common::rate_limit::{rate_limit_middleware, RateLimitConfig, RateLimiter};
use crate::api::common::tracing as trace_hooks;
use crate::config::AddOn;
use crate::system;
use crate::InnerState;

/// Creates the application router with the configured add-on.
#[tracing::instrument(name = "create_api_router", skip(state))]
pub fn create_api_router(state: InnerState, add_on: AddOn, rate_limit: RateLimitConfig) -> Router {
    tracing::info!("Creating API router");

    // Batched calls are replayed one by one against a plain copy of the
    // procedure router.
    let procedures = routes::create_trpc_router().with_state(state.clone());
    let trpc = routes::create_trpc_router().layer(middleware::from_fn_with_state(
        procedures,
        batch::batch_middleware,
    ));

    let mut router = Router::new()
        .nest("/trpc", trpc)
        .merge(system::create_system_router());

    match add_on {
        AddOn::Panel => {
            tracing::info!("Mounting procedure panel at /panel");
            router = router.route("/panel", get(panel::panel));
        }
        AddOn::RateLimit => {
            tracing::info!(
                max_requests = rate_limit.max_requests,
                window_secs = rate_limit.window.as_secs(),
                "Enabling rate limit"
            );
            router = router.layer(middleware::from_fn_with_state(
                RateLimiter::new(rate_limit),
                rate_limit_middleware,
            ));
        }
        AddOn::None => {}
    }

    router
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace_hooks::make_span::<Body>)
                .on_request(trace_hooks::on_request::<Body>)
                .on_response(trace_hooks::on_response::<Body>)
                .on_failure(trace_hooks::on_failure),
        )
        .with_state(state)
}
