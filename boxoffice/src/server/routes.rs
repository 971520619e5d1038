//! Router configuration for the box office.

use super::state::AppState;
use crate::api;
use axum::{
    Router,
    routing::{get, post},
};
use boxoffice_web::correlation_id_layer;
use boxoffice_web::handlers::{health_check, readiness_check};
use tower_http::trace::TraceLayer;

/// Build the complete Axum router.
///
/// - `/health`, `/ready`: probes
/// - `/api/...`: purchase engine operations
///
/// Every response carries `X-Correlation-ID`.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/shows/:show_id/seats", get(api::get_availability))
        .route("/shows/:show_id/reservations", post(api::create_reservation))
        .route("/shows/:show_id/sales", post(api::create_sale))
        .route("/shows/:show_id/box-office/sales", post(api::confirm_sale))
        .route(
            "/shows/:show_id/holds/release-expired",
            post(api::release_expired_holds),
        )
        .route("/purchases/:purchase_id", get(api::get_purchase));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(correlation_id_layer())
        .with_state(state)
}
