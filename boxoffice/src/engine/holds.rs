//! Hold manager: hold expiry policy and the expired-hold sweep.
//!
//! Holds expire lazily. A claim treats a HELD seat whose expiry has passed as
//! available, so no timer is needed for correctness; the sweep only tidies
//! inventory and cancels reservations nobody came back for.

use super::{Operation, PurchaseEngine, finish_operation, rollback_quietly};
use crate::metrics;
use boxoffice_core::error::EngineError;
use boxoffice_core::store::StoreTransaction;
use boxoffice_core::types::{SeatId, Show, ShowId};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

/// Holds end this many minutes before the show starts.
pub const HOLD_LEAD_TIME_MINUTES: i64 = 60;

/// Expiry of a hold taken on `show`: one hour before it starts.
///
/// Computed once when the hold is taken and never recomputed.
#[must_use]
pub fn hold_expiry_for(show: &Show) -> DateTime<Utc> {
    show.starts_at - Duration::minutes(HOLD_LEAD_TIME_MINUTES)
}

/// Void the stale HELD tickets of reclaimed seats and cancel the pending
/// purchases left without a live ticket.
///
/// Must run before new tickets are written for those seats.
pub(crate) async fn retire_stale_holds(
    tx: &mut dyn StoreTransaction,
    show_id: ShowId,
    seat_ids: &[SeatId],
) -> Result<(), EngineError> {
    let touched = tx.void_held_tickets(show_id, seat_ids).await?;
    if touched.is_empty() {
        return Ok(());
    }
    let cancelled = tx.cancel_abandoned_purchases(&touched).await?;
    tracing::debug!(
        show_id = %show_id,
        voided_purchases = touched.len(),
        cancelled,
        "Retired stale holds"
    );
    Ok(())
}

impl PurchaseEngine {
    /// `ReleaseExpiredHolds`: return every expired hold of a show to inventory.
    ///
    /// Voids the stale tickets of the released seats and cancels pending
    /// purchases left empty, all in one transaction. Idempotent.
    ///
    /// # Errors
    ///
    /// - `NotFound`: unknown show
    /// - `Store`: the transaction failed; nothing was released
    #[tracing::instrument(skip(self), fields(show_id = %show_id))]
    pub async fn release_expired_holds(&self, show_id: ShowId) -> Result<usize, EngineError> {
        let started = Instant::now();
        let result = self.release_in_transaction(show_id).await;
        finish_operation(Operation::ReleaseExpiredHolds, show_id, started, &result, false);
        result
    }

    async fn release_in_transaction(&self, show_id: ShowId) -> Result<usize, EngineError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let result = async {
            super::pricing::load_show(tx.as_mut(), show_id).await?;
            let released = tx.release_expired_holds(show_id, now).await?;
            if !released.is_empty() {
                retire_stale_holds(tx.as_mut(), show_id, &released).await?;
            }
            Ok::<_, EngineError>(released.len())
        }
        .await;

        match result {
            Ok(count) => {
                tx.commit().await?;
                metrics::record_holds_released(count);
                Ok(count)
            }
            Err(error) => {
                rollback_quietly(tx).await;
                Err(error)
            }
        }
    }

    /// Release expired holds on every active show. Returns the seats released.
    ///
    /// A failing show is logged and skipped.
    ///
    /// # Errors
    ///
    /// - `Store`: the active shows could not be listed
    pub async fn release_all_expired_holds(&self) -> Result<usize, EngineError> {
        let now = self.clock.now();
        let mut tx = self.store.begin().await?;
        let shows = tx.active_shows(now).await;
        rollback_quietly(tx).await;

        let mut total = 0;
        for show_id in shows? {
            match self.release_expired_holds(show_id).await {
                Ok(count) => total += count,
                Err(error) => {
                    tracing::warn!(show_id = %show_id, error = %error, "Hold sweep skipped show");
                }
            }
        }
        Ok(total)
    }
}

/// Run [`PurchaseEngine::release_all_expired_holds`] every `period`.
///
/// The first sweep runs one period after startup.
pub fn spawn_expiry_sweep(engine: Arc<PurchaseEngine>, period: std::time::Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match engine.release_all_expired_holds().await {
                Ok(released) => tracing::debug!(released, "Hold sweep finished"),
                Err(error) => tracing::error!(error = %error, "Hold sweep failed"),
            }
        }
    })
}
