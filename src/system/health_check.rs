use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::api::procedures::HEALTH;
use crate::api::rpc::{respond, RpcResult};

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub timestamp: String,
}

impl HealthStatus {
    pub fn now() -> Self {
        Self {
            status: "ok",
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Liveness probe, served outside the procedure mount.
pub async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus::now())
}

/// The same probe exposed as the `health` procedure.
pub async fn health_procedure() -> RpcResult<HealthStatus> {
    respond(HEALTH, Ok(HealthStatus::now()))
}
