//! Reservation endpoint.
//!
//! `POST /api/shows/:show_id/reservations` holds seats for the customer named
//! by the identity headers until one hour before the show. The purchase is
//! `PENDING` until the box office confirms it.

use super::{PurchaseResponse, purchase_reply, seat_ids};
use crate::engine::ReserveRequest;
use crate::server::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use boxoffice_core::types::ShowId;
use boxoffice_web::{
    AppError, CorrelationId, CustomerHeaders, IdempotencyKey, JsonBody, PathParam,
};
use serde::Deserialize;

/// Request to reserve seats.
#[derive(Debug, Deserialize)]
pub struct ReservationBody {
    /// Seats to hold
    #[serde(default)]
    pub seat_ids: Vec<i64>,
    /// Retry token; the `Idempotency-Key` header takes precedence
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Reserve seats for an authenticated customer.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/shows/1/reservations \
///   -H "X-Customer-Subject: 1029384756" \
///   -H "X-Customer-Provider: google" \
///   -H "Idempotency-Key: 7f7c1c8e" \
///   -H "Content-Type: application/json" \
///   -d '{"seat_ids": [1, 2]}'
/// ```
///
/// Returns 201 with the pending purchase, or 200 with `"replayed": true`
/// when the key was seen before.
///
/// # Errors
///
/// 400 on bad input or a show too close to start, 401 without identity
/// headers, 404 for an unknown show, 409 when a seat is taken.
pub async fn create_reservation(
    State(state): State<AppState>,
    PathParam(show_id): PathParam<i64>,
    correlation_id: CorrelationId,
    idempotency_key: IdempotencyKey,
    customer: CustomerHeaders,
    JsonBody(body): JsonBody<ReservationBody>,
) -> Result<(StatusCode, Json<PurchaseResponse>), AppError> {
    tracing::debug!(
        correlation_id = %correlation_id.0,
        show_id,
        seats = body.seat_ids.len(),
        subject = %customer.subject,
        "Reservation requested"
    );

    let default_provider = &state.engine.config().default_customer_provider;
    let outcome = state
        .engine
        .reserve(ReserveRequest {
            show_id: ShowId::new(show_id),
            seat_ids: seat_ids(&body.seat_ids),
            customer: customer.into_registered(default_provider),
            idempotency_key: idempotency_key.or(body.idempotency_key),
        })
        .await?;

    let (status, response) = purchase_reply(outcome);
    Ok((status, Json(response)))
}
