//! Direct sale endpoint: `POST /api/shows/:show_id/sales`.

use super::{PurchaseResponse, parse_payment_method, purchase_reply, seat_ids};
use crate::engine::SellRequest;
use crate::server::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
};
use boxoffice_core::types::{CustomerIdentity, RegisteredCustomer, ShowId};
use boxoffice_web::{AppError, CorrelationId, IdempotencyKey, JsonBody, PathParam};
use serde::Deserialize;

/// Buyer named in a sale body.
///
/// With a `subject` this is a registered customer; without one, a walk-in.
#[derive(Debug, Default, Deserialize)]
pub struct CustomerBody {
    /// Identity provider; defaults to the configured provider
    pub provider: Option<String>,
    /// Subject within the provider
    pub subject: Option<String>,
    /// Contact email
    pub email: Option<String>,
    /// Display name
    pub name: Option<String>,
}

impl CustomerBody {
    /// Resolve into an engine identity.
    #[must_use]
    pub fn into_identity(self, default_provider: &str) -> CustomerIdentity {
        match self.subject.filter(|s| !s.trim().is_empty()) {
            Some(subject) => CustomerIdentity::Registered(RegisteredCustomer {
                provider: self
                    .provider
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or_else(|| default_provider.to_string()),
                subject,
                email: self.email,
                name: self.name,
            }),
            None => CustomerIdentity::WalkIn {
                email: self.email,
                name: self.name,
            },
        }
    }
}

/// Request to sell seats.
#[derive(Debug, Deserialize)]
pub struct SaleBody {
    /// Seats to sell
    #[serde(default)]
    pub seat_ids: Vec<i64>,
    /// `CASH`, `CARD` or `PAYPAL`
    pub payment_method: Option<String>,
    /// Buyer; omitted for anonymous walk-ins
    #[serde(default)]
    pub customer: Option<CustomerBody>,
    /// Retry token; the `Idempotency-Key` header takes precedence
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

/// Sell seats outright.
///
/// Returns 201 with the paid purchase and issued ticket codes, or 200 with
/// `"replayed": true` for a repeated idempotency key.
///
/// # Errors
///
/// 400 on bad input, 404 for an unknown show, 409 when a seat is taken.
pub async fn create_sale(
    State(state): State<AppState>,
    PathParam(show_id): PathParam<i64>,
    correlation_id: CorrelationId,
    idempotency_key: IdempotencyKey,
    JsonBody(body): JsonBody<SaleBody>,
) -> Result<(StatusCode, Json<PurchaseResponse>), AppError> {
    let method = body
        .payment_method
        .as_deref()
        .ok_or_else(|| AppError::validation("payment_method is required"))
        .and_then(parse_payment_method)?;
    tracing::debug!(
        correlation_id = %correlation_id.0,
        show_id,
        seats = body.seat_ids.len(),
        payment_method = %method,
        "Sale requested"
    );

    let default_provider = &state.engine.config().default_customer_provider;
    let outcome = state
        .engine
        .sell(SellRequest {
            show_id: ShowId::new(show_id),
            seat_ids: seat_ids(&body.seat_ids),
            payment_method: method,
            customer: body
                .customer
                .map(|customer| customer.into_identity(default_provider)),
            idempotency_key: idempotency_key.or(body.idempotency_key),
        })
        .await?;

    let (status, response) = purchase_reply(outcome);
    Ok((status, Json(response)))
}
