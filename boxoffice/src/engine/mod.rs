//! The seat inventory and purchase transaction engine.
//!
//! [`PurchaseEngine`] runs every operation inside one store transaction:
//!
//! ```text
//! validate ─► begin ─► idempotency lookup ─► show + price ─► customer
//!                               │ hit                             │
//!                               ▼                                 ▼
//!                        replay (no writes)        conditional claim ─► purchase + tickets ─► commit
//!                                                        │ shortfall
//!                                                        ▼
//!                                                 rollback ─► Conflict
//! ```
//!
//! Validation happens before the store is touched. Only the engine decides
//! between commit and rollback, and a transaction dropped on an early return
//! rolls back on its own.

mod availability;
mod customers;
mod holds;
mod idempotency;
mod orchestrator;
mod pricing;

pub use availability::{Availability, SeatAvailability, SeatCounts};
pub use customers::{WALK_IN_NAME, WALK_IN_PROVIDER};
pub use holds::{HOLD_LEAD_TIME_MINUTES, hold_expiry_for, spawn_expiry_sweep};
pub use idempotency::MAX_IDEMPOTENCY_KEY_LEN;

use crate::config::EngineConfig;
use crate::metrics::{self, Outcome};
use boxoffice_core::environment::Clock;
use boxoffice_core::error::{EngineError, StoreError};
use boxoffice_core::store::TicketStore;
use boxoffice_core::types::{
    CustomerIdentity, PaymentMethod, Purchase, PurchaseId, RegisteredCustomer, SeatId, ShowId,
};
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

/// Engine operations, used as log and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Hold seats under a pending purchase.
    Reserve,
    /// Sell seats outright.
    Sell,
    /// Box-office confirmation of held and fresh seats.
    ConfirmSale,
    /// Return expired holds to inventory.
    ReleaseExpiredHolds,
}

impl Operation {
    /// Label value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Reserve => "reserve",
            Self::Sell => "sell",
            Self::ConfirmSale => "confirm_sale",
            Self::ReleaseExpiredHolds => "release_expired_holds",
        }
    }
}

/// Hold seats for a registered customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReserveRequest {
    /// Show to reserve for
    pub show_id: ShowId,
    /// Seats to hold, distinct
    pub seat_ids: Vec<SeatId>,
    /// The authenticated buyer
    pub customer: RegisteredCustomer,
    /// Client retry token
    pub idempotency_key: Option<String>,
}

/// Sell seats outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SellRequest {
    /// Show to sell for
    pub show_id: ShowId,
    /// Seats to sell, distinct
    pub seat_ids: Vec<SeatId>,
    /// Declared payment method
    pub payment_method: PaymentMethod,
    /// Buyer; an anonymous walk-in when absent
    pub customer: Option<CustomerIdentity>,
    /// Client retry token
    pub idempotency_key: Option<String>,
}

/// Box-office confirmation: convert live holds and sell the remaining seats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmSaleRequest {
    /// Show to confirm for
    pub show_id: ShowId,
    /// Seats to confirm or sell, distinct
    pub seat_ids: Vec<SeatId>,
    /// Payment method applied to every settled purchase
    pub payment_method: PaymentMethod,
    /// Buyer of the freshly sold seats; an anonymous walk-in when absent
    pub customer: Option<CustomerIdentity>,
}

/// Result of Reserve or Sell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseOutcome {
    /// The purchase with its tickets
    pub purchase: Purchase,
    /// `true` when the purchase was recorded by an earlier request with the same key
    pub replayed: bool,
}

/// Result of `ConfirmSale`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfirmationOutcome {
    /// Seats converted from an active hold
    pub confirmed_from_hold: usize,
    /// Seats sold without a prior hold
    pub newly_sold: usize,
    /// Purchase created for the newly sold seats
    pub new_purchase_id: Option<PurchaseId>,
    /// Pending purchases that became PAID
    pub settled_purchase_ids: Vec<PurchaseId>,
}

/// The purchase transaction engine.
///
/// Cheap to share behind an `Arc`; holds no per-request state.
pub struct PurchaseEngine {
    store: Arc<dyn TicketStore>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
}

impl PurchaseEngine {
    /// Create an engine over a store and a clock.
    #[must_use]
    pub fn new(store: Arc<dyn TicketStore>, clock: Arc<dyn Clock>, config: EngineConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn TicketStore> {
        &self.store
    }

    /// Engine policy.
    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Reject empty, oversized or repeating seat lists. Returns the seats sorted.
    fn validate_seats(&self, seat_ids: &[SeatId]) -> Result<Vec<SeatId>, EngineError> {
        if seat_ids.is_empty() {
            return Err(EngineError::validation("seat_ids must not be empty"));
        }
        let max = self.config.max_seats_per_request;
        if seat_ids.len() > max {
            return Err(EngineError::validation(format!(
                "at most {max} seats may be requested at once, got {}",
                seat_ids.len()
            )));
        }
        let distinct: BTreeSet<SeatId> = seat_ids.iter().copied().collect();
        if distinct.len() != seat_ids.len() {
            return Err(EngineError::validation("seat_ids must not repeat"));
        }
        Ok(distinct.into_iter().collect())
    }
}

/// Map an engine result onto its metric outcome.
fn outcome_of<T>(result: &Result<T, EngineError>, replayed: bool) -> Outcome {
    match result {
        Ok(_) if replayed => Outcome::Replayed,
        Ok(_) => Outcome::Created,
        Err(EngineError::Conflict { .. }) => Outcome::Conflict,
        Err(EngineError::Validation(_) | EngineError::NotFound { .. }) => Outcome::Rejected,
        Err(EngineError::Store(_)) => Outcome::Failed,
    }
}

/// Log and count the end of an engine call.
fn finish_operation<T>(
    operation: Operation,
    show_id: ShowId,
    started: Instant,
    result: &Result<T, EngineError>,
    replayed: bool,
) {
    let outcome = outcome_of(result, replayed);
    metrics::record_operation(operation.as_str(), outcome, started.elapsed().as_secs_f64());
    match result {
        Ok(_) => tracing::info!(
            operation = operation.as_str(),
            show_id = %show_id,
            outcome = outcome.as_str(),
            "Operation completed"
        ),
        Err(EngineError::Conflict {
            requested, claimed, ..
        }) => {
            metrics::record_conflict(operation.as_str());
            tracing::warn!(
                operation = operation.as_str(),
                show_id = %show_id,
                requested,
                claimed,
                "Seat claim conflict, transaction rolled back"
            );
        }
        Err(EngineError::Store(error)) => tracing::error!(
            operation = operation.as_str(),
            show_id = %show_id,
            error = %error,
            "Store failure, transaction rolled back"
        ),
        Err(error) => tracing::info!(
            operation = operation.as_str(),
            show_id = %show_id,
            error = %error,
            "Request rejected"
        ),
    }
}

/// Roll back, logging instead of masking the error that caused it.
async fn rollback_quietly(tx: Box<dyn boxoffice_core::store::StoreTransaction>) {
    if let Err(error) = tx.rollback().await {
        log_rollback_failure(&error);
    }
}

fn log_rollback_failure(error: &StoreError) {
    tracing::warn!(error = %error, "Rollback failed; the connection drops the transaction");
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice_testing::{InMemoryTicketStore, test_clock};

    fn engine(max: usize) -> PurchaseEngine {
        PurchaseEngine::new(
            Arc::new(InMemoryTicketStore::new()),
            Arc::new(test_clock()),
            EngineConfig {
                max_seats_per_request: max,
                ..EngineConfig::default()
            },
        )
    }

    fn seats(ids: &[i64]) -> Vec<SeatId> {
        ids.iter().copied().map(SeatId::new).collect()
    }

    #[test]
    fn seats_are_sorted_after_validation() {
        let validated = engine(10).validate_seats(&seats(&[3, 1, 2]));
        assert!(matches!(validated, Ok(ref s) if *s == seats(&[1, 2, 3])));
    }

    #[test]
    fn empty_repeated_and_oversized_requests_are_rejected() {
        let engine = engine(2);
        assert!(matches!(engine.validate_seats(&[]), Err(EngineError::Validation(_))));
        assert!(matches!(
            engine.validate_seats(&seats(&[1, 1])),
            Err(EngineError::Validation(_))
        ));
        assert!(matches!(
            engine.validate_seats(&seats(&[1, 2, 3])),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn outcomes_follow_the_error_taxonomy() {
        let conflict: Result<(), EngineError> = Err(EngineError::Conflict {
            show_id: ShowId::new(1),
            requested: 2,
            claimed: 1,
        });
        assert_eq!(outcome_of(&conflict, false), Outcome::Conflict);
        assert_eq!(outcome_of(&Ok::<(), EngineError>(()), true), Outcome::Replayed);
        assert_eq!(
            outcome_of(&Err::<(), _>(EngineError::not_found("Show", 9)), false),
            Outcome::Rejected
        );
    }
}
