//! Expired-hold cleanup: `POST /api/shows/:show_id/holds/release-expired`.

use crate::server::AppState;
use axum::{Json, extract::State};
use boxoffice_core::types::ShowId;
use boxoffice_web::{AppError, PathParam};
use serde::Serialize;

/// Seats returned to inventory.
#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    /// Show swept
    pub show_id: i64,
    /// Expired holds released
    pub released_count: usize,
}

/// Release every expired hold of a show. Safe to repeat.
///
/// # Errors
///
/// 404 for an unknown show, 500 when the store fails.
pub async fn release_expired_holds(
    State(state): State<AppState>,
    PathParam(show_id): PathParam<i64>,
) -> Result<Json<ReleaseResponse>, AppError> {
    let released_count = state
        .engine
        .release_expired_holds(ShowId::new(show_id))
        .await?;
    Ok(Json(ReleaseResponse {
        show_id,
        released_count,
    }))
}
