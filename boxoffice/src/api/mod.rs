//! HTTP API handlers.
//!
//! Organised by operation:
//! - Reservations: `POST /api/shows/:show_id/reservations`
//! - Sales: `POST /api/shows/:show_id/sales`
//! - Box office: `POST /api/shows/:show_id/box-office/sales`
//! - Holds: `POST /api/shows/:show_id/holds/release-expired`
//! - Availability: `GET /api/shows/:show_id/seats`
//! - Purchases: `GET /api/purchases/:purchase_id`

pub mod availability;
pub mod box_office;
pub mod holds;
pub mod purchases;
pub mod reservations;
pub mod sales;

pub use availability::get_availability;
pub use box_office::confirm_sale;
pub use holds::release_expired_holds;
pub use purchases::get_purchase;
pub use reservations::create_reservation;
pub use sales::create_sale;

use crate::engine::PurchaseOutcome;
use axum::http::StatusCode;
use boxoffice_core::types::{Purchase, PaymentMethod, SeatId, Ticket};
use boxoffice_web::AppError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// Shared response types
// ============================================================================

/// A purchase as returned by the API.
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseResponse {
    /// Purchase ID
    pub id: Uuid,
    /// Show the seats belong to
    pub show_id: i64,
    /// Buyer
    pub customer_id: Uuid,
    /// `PENDING`, `PAID` or `CANCELLED`
    pub state: &'static str,
    /// `CASH`, `CARD` or `PAYPAL`
    pub payment_method: &'static str,
    /// Total as a decimal string, e.g. `"27.00"`
    pub total: String,
    /// Total in cents
    pub total_cents: u64,
    /// Retry token the purchase was recorded under
    pub idempotency_key: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// `true` when an earlier request with the same key produced this purchase
    pub replayed: bool,
    /// Ticket lines, ordered by seat
    pub tickets: Vec<TicketResponse>,
}

/// One ticket line.
#[derive(Debug, Clone, Serialize)]
pub struct TicketResponse {
    /// Ticket ID
    pub id: Uuid,
    /// Seat
    pub seat_id: i64,
    /// `HELD`, `ISSUED` or `VOID`
    pub state: &'static str,
    /// Price charged, decimal string
    pub unit_price: String,
    /// Redemption code, once issued
    pub code: Option<String>,
}

impl PurchaseResponse {
    /// Render a purchase; `replayed` marks an idempotent repeat.
    #[must_use]
    pub fn new(purchase: Purchase, replayed: bool) -> Self {
        Self {
            id: *purchase.id.as_uuid(),
            show_id: purchase.show_id.get(),
            customer_id: *purchase.customer_id.as_uuid(),
            state: purchase.state.as_str(),
            payment_method: purchase.payment_method.as_str(),
            total: purchase.total.to_string(),
            total_cents: purchase.total.cents(),
            idempotency_key: purchase.idempotency_key,
            created_at: purchase.created_at,
            replayed,
            tickets: purchase.tickets.into_iter().map(TicketResponse::from).collect(),
        }
    }
}

impl From<Ticket> for TicketResponse {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: *ticket.id.as_uuid(),
            seat_id: ticket.seat_id.get(),
            state: ticket.state.as_str(),
            unit_price: ticket.unit_price.to_string(),
            code: ticket.code,
        }
    }
}

/// Status and body for a Reserve or Sell outcome: 201 when created, 200 on replay.
pub(crate) fn purchase_reply(outcome: PurchaseOutcome) -> (StatusCode, PurchaseResponse) {
    let status = if outcome.replayed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    (status, PurchaseResponse::new(outcome.purchase, outcome.replayed))
}

/// Parse a payment method name, case-insensitively.
pub(crate) fn parse_payment_method(value: &str) -> Result<PaymentMethod, AppError> {
    PaymentMethod::parse(value.trim()).map_err(|err| AppError::validation(err.to_string()))
}

pub(crate) fn seat_ids(ids: &[i64]) -> Vec<SeatId> {
    ids.iter().copied().map(SeatId::new).collect()
}
