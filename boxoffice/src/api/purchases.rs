//! Purchase lookup: `GET /api/purchases/:purchase_id`.

use super::PurchaseResponse;
use crate::server::AppState;
use axum::{Json, extract::State};
use boxoffice_core::types::PurchaseId;
use boxoffice_web::{AppError, PathParam};
use uuid::Uuid;

/// A purchase with its tickets.
///
/// # Errors
///
/// 404 for an unknown purchase.
pub async fn get_purchase(
    State(state): State<AppState>,
    PathParam(purchase_id): PathParam<Uuid>,
) -> Result<Json<PurchaseResponse>, AppError> {
    let purchase = state
        .engine
        .purchase(PurchaseId::from_uuid(purchase_id))
        .await?;
    Ok(Json(PurchaseResponse::new(purchase, false)))
}
