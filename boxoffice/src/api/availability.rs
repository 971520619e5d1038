//! Seat map endpoint: `GET /api/shows/:show_id/seats`.

use crate::engine::{Availability, SeatAvailability, SeatCounts};
use crate::server::AppState;
use axum::{Json, extract::State};
use boxoffice_core::types::ShowId;
use boxoffice_web::{AppError, PathParam};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Seat map of a show.
#[derive(Debug, Serialize)]
pub struct AvailabilityResponse {
    /// Show ID
    pub show_id: i64,
    /// Seats in row and column order
    pub seats: Vec<SeatResponse>,
    /// Totals per state
    pub counts: SeatCounts,
}

/// One seat.
#[derive(Debug, Serialize)]
pub struct SeatResponse {
    /// Seat ID
    pub seat_id: i64,
    /// Row label
    pub row: String,
    /// Column number
    pub column: i32,
    /// Seat category
    pub seat_type: String,
    /// `AVAILABLE`, `HELD` or `SOLD`
    pub state: &'static str,
    /// End of an active hold
    pub hold_expiry: Option<DateTime<Utc>>,
}

impl From<SeatAvailability> for SeatResponse {
    fn from(seat: SeatAvailability) -> Self {
        Self {
            seat_id: seat.seat_id.get(),
            row: seat.row,
            column: seat.column,
            seat_type: seat.seat_type,
            state: seat.state.as_str(),
            hold_expiry: seat.hold_expiry,
        }
    }
}

impl From<Availability> for AvailabilityResponse {
    fn from(availability: Availability) -> Self {
        Self {
            show_id: availability.show_id.get(),
            seats: availability.seats.into_iter().map(Into::into).collect(),
            counts: availability.counts,
        }
    }
}

/// Current seat map. Expired holds are shown as available.
///
/// # Errors
///
/// 404 for an unknown show.
pub async fn get_availability(
    State(state): State<AppState>,
    PathParam(show_id): PathParam<i64>,
) -> Result<Json<AvailabilityResponse>, AppError> {
    let availability = state.engine.availability(ShowId::new(show_id)).await?;
    Ok(Json(availability.into()))
}
