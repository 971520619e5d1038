//! Read side: seat availability and purchase lookup.

use super::{PurchaseEngine, pricing, rollback_quietly};
use boxoffice_core::error::EngineError;
use boxoffice_core::types::{Purchase, PurchaseId, SeatId, SeatState, ShowId};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One seat of a show as a buyer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeatAvailability {
    /// Seat identifier
    pub seat_id: SeatId,
    /// Row label
    pub row: String,
    /// Column number
    pub column: i32,
    /// Seat category
    pub seat_type: String,
    /// Effective state: a lapsed hold reads as available
    pub state: SeatState,
    /// Present only for holds that are still active
    pub hold_expiry: Option<DateTime<Utc>>,
}

/// Seat totals per effective state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeatCounts {
    /// Seats in the show's room
    pub total: usize,
    /// Free or with a lapsed hold
    pub available: usize,
    /// Under an active hold
    pub held: usize,
    /// Sold
    pub sold: usize,
}

/// Seat map of one show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Availability {
    /// The show
    pub show_id: ShowId,
    /// Seats ordered by row and column
    pub seats: Vec<SeatAvailability>,
    /// Totals per effective state
    pub counts: SeatCounts,
}

impl PurchaseEngine {
    /// `GetAvailability`: every seat of a show with its effective state.
    ///
    /// Nothing is written; expired holds are reported as available without
    /// being released.
    ///
    /// # Errors
    ///
    /// - `NotFound`: unknown show
    /// - `Store`: the read failed
    pub async fn availability(&self, show_id: ShowId) -> Result<Availability, EngineError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let read = async {
            pricing::load_show(tx.as_mut(), show_id).await?;
            Ok::<_, EngineError>(tx.seat_map(show_id).await?)
        }
        .await;
        rollback_quietly(tx).await;

        let mut counts = SeatCounts::default();
        let seats = read?
            .into_iter()
            .map(|seat| {
                let state = seat.effective_state(now);
                counts.total += 1;
                match state {
                    SeatState::Available => counts.available += 1,
                    SeatState::Held => counts.held += 1,
                    SeatState::Sold => counts.sold += 1,
                }
                SeatAvailability {
                    seat_id: seat.seat_id,
                    row: seat.row,
                    column: seat.column,
                    seat_type: seat.seat_type,
                    state,
                    hold_expiry: seat.hold_expiry.filter(|_| state == SeatState::Held),
                }
            })
            .collect();

        Ok(Availability {
            show_id,
            seats,
            counts,
        })
    }

    /// `GetPurchase`: a purchase with its tickets.
    ///
    /// # Errors
    ///
    /// - `NotFound`: unknown purchase
    /// - `Store`: the read failed
    pub async fn purchase(&self, purchase_id: PurchaseId) -> Result<Purchase, EngineError> {
        let mut tx = self.store.begin().await?;
        let found = tx.purchase(purchase_id).await;
        rollback_quietly(tx).await;
        found?.ok_or_else(|| EngineError::not_found("Purchase", purchase_id))
    }
}
