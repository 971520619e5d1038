//! Box-office confirmation: `POST /api/shows/:show_id/box-office/sales`.
//!
//! Seats under an active hold are sold to the holder; the rest are sold to
//! the buyer in the body, or to a walk-in.

use super::sales::CustomerBody;
use super::{parse_payment_method, seat_ids};
use crate::engine::{ConfirmSaleRequest, ConfirmationOutcome};
use crate::server::AppState;
use axum::{Json, extract::State};
use boxoffice_core::types::ShowId;
use boxoffice_web::{AppError, CorrelationId, JsonBody, PathParam};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to confirm held seats and sell the others.
#[derive(Debug, Deserialize)]
pub struct ConfirmSaleBody {
    /// Seats to confirm or sell
    #[serde(default)]
    pub seat_ids: Vec<i64>,
    /// Payment method for every settled purchase
    pub payment_method: Option<String>,
    /// Buyer of the seats that were not held
    #[serde(default)]
    pub customer: Option<CustomerBody>,
}

/// Result of a confirmation.
#[derive(Debug, Serialize)]
pub struct ConfirmSaleResponse {
    /// Seats converted from a hold
    pub confirmed_from_hold: usize,
    /// Seats sold without a hold
    pub newly_sold: usize,
    /// Purchase created for the newly sold seats
    pub new_purchase_id: Option<Uuid>,
    /// Reservations that became PAID
    pub settled_purchase_ids: Vec<Uuid>,
}

impl From<ConfirmationOutcome> for ConfirmSaleResponse {
    fn from(outcome: ConfirmationOutcome) -> Self {
        Self {
            confirmed_from_hold: outcome.confirmed_from_hold,
            newly_sold: outcome.newly_sold,
            new_purchase_id: outcome.new_purchase_id.map(|id| *id.as_uuid()),
            settled_purchase_ids: outcome
                .settled_purchase_ids
                .iter()
                .map(|id| *id.as_uuid())
                .collect(),
        }
    }
}

/// Confirm a box-office sale.
///
/// # Errors
///
/// 400 on bad input, 404 for an unknown show, 409 when any seat can be
/// neither confirmed nor sold. Nothing is applied on error.
pub async fn confirm_sale(
    State(state): State<AppState>,
    PathParam(show_id): PathParam<i64>,
    correlation_id: CorrelationId,
    JsonBody(body): JsonBody<ConfirmSaleBody>,
) -> Result<Json<ConfirmSaleResponse>, AppError> {
    let method = body
        .payment_method
        .as_deref()
        .ok_or_else(|| AppError::validation("payment_method is required"))
        .and_then(parse_payment_method)?;
    tracing::debug!(
        correlation_id = %correlation_id.0,
        show_id,
        seats = body.seat_ids.len(),
        "Box-office confirmation requested"
    );

    let default_provider = &state.engine.config().default_customer_provider;
    let outcome = state
        .engine
        .confirm_sale(ConfirmSaleRequest {
            show_id: ShowId::new(show_id),
            seat_ids: seat_ids(&body.seat_ids),
            payment_method: method,
            customer: body
                .customer
                .map(|customer| customer.into_identity(default_provider)),
        })
        .await?;

    Ok(Json(outcome.into()))
}
