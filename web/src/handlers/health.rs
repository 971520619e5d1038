//! Health check endpoints.
//!
//! These endpoints are used by load balancers and orchestrators to decide
//! whether the service should receive traffic.

use axum::{Json, extract::State, http::StatusCode};
use boxoffice_core::store::TicketStore;
use serde::Serialize;
use std::sync::Arc;

/// Health check body.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// `ok`, `ready` or `unavailable`
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
}

impl HealthResponse {
    const fn new(status: &'static str) -> Self {
        Self {
            status,
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Liveness: the process is up. Does NOT check the database.
///
/// ```text
/// GET /health
/// {"status":"ok","version":"0.1.0"}
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (StatusCode::OK, Json(HealthResponse::new("ok")))
}

/// Readiness: the store answers a ping.
///
/// # Status Codes
///
/// - 200 OK: the store is reachable
/// - 503 Service Unavailable: the ping failed
pub async fn readiness_check(
    State(store): State<Arc<dyn TicketStore>>,
) -> (StatusCode, Json<HealthResponse>) {
    match store.ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthResponse::new("ready"))),
        Err(error) => {
            tracing::warn!(error = %error, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse::new("unavailable")),
            )
        }
    }
}
