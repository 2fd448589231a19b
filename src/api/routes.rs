use axum::Router;

use crate::api::procedures::{
    CHANNELS_ADD, CHANNELS_LIST, HEALTH, VIDEOS_CREATE, VIDEOS_GET, VIDEOS_LIST, VIDEOS_UPDATE,
};
use crate::api::rpc::{mutation, query, unknown_procedure};
use crate::api::{channels, videos};
use crate::system::health_check;
use crate::InnerState;

fn at(path: &str) -> String {
    format!("/{path}")
}

/// Procedure router, mounted under `/trpc`.
#[tracing::instrument(name = "create_trpc_router")]
pub fn create_trpc_router() -> Router<InnerState> {
    tracing::info!("Creating procedure router");

    Router::new()
        .route(&at(HEALTH), query(health_check::health_procedure))

        .route(&at(VIDEOS_LIST), query(videos::list))
        .route(&at(VIDEOS_GET), query(videos::get))
        .route(&at(VIDEOS_CREATE), mutation(videos::create))
        .route(&at(VIDEOS_UPDATE), mutation(videos::update))

        .route(&at(CHANNELS_LIST), query(channels::list))
        .route(&at(CHANNELS_ADD), mutation(channels::add))

        .fallback(unknown_procedure)
}
