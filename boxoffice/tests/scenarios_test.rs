//! End-to-end engine scenarios over the in-memory store.
//!
//! Each test builds a fresh show with seats {1, 2, 3} starting two hours
//! after T0 and drives the engine with a manual clock.
//!
//! Run with: `cargo test --test scenarios_test`

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::panic)]

use boxoffice::config::EngineConfig;
use boxoffice::engine::{
    ConfirmSaleRequest, PurchaseEngine, PurchaseOutcome, ReserveRequest, SellRequest,
};
use boxoffice_core::error::EngineError;
use boxoffice_core::types::{
    CustomerIdentity, Money, PaymentMethod, PurchaseState, RegisteredCustomer, SeatId,
    SeatState, ShowId, TicketState,
};
use boxoffice_testing::{InMemoryTicketStore, ManualClock, ShowFixture};
use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;

const SHOW: ShowId = ShowId::new(1);

struct Harness {
    t0: DateTime<Utc>,
    clock: Arc<ManualClock>,
    store: Arc<InMemoryTicketStore>,
    engine: Arc<PurchaseEngine>,
}

impl Harness {
    async fn new() -> Self {
        let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::starting_at(t0));
        let store = Arc::new(InMemoryTicketStore::new());
        ShowFixture::new(SHOW.get())
            .starting_in_hours(t0, 2)
            .seats([1, 2, 3])
            .provision(&store)
            .await;
        let engine = Arc::new(PurchaseEngine::new(
            store.clone(),
            clock.clone(),
            EngineConfig::default(),
        ));
        Self {
            t0,
            clock,
            store,
            engine,
        }
    }

    async fn state_of(&self, seat: i64) -> SeatState {
        self.store
            .seat(SHOW, SeatId::new(seat))
            .await
            .expect("seat exists")
            .state
    }

    async fn reserve(&self, seats: &[i64]) -> Result<PurchaseOutcome, EngineError> {
        self.engine
            .reserve(ReserveRequest {
                show_id: SHOW,
                seat_ids: ids(seats),
                customer: RegisteredCustomer {
                    provider: "google".into(),
                    subject: "viewer-1".into(),
                    email: Some("viewer@example.com".into()),
                    name: None,
                },
                idempotency_key: None,
            })
            .await
    }

    async fn sell(
        &self,
        seats: &[i64],
        method: PaymentMethod,
        key: Option<&str>,
    ) -> Result<PurchaseOutcome, EngineError> {
        self.engine
            .sell(SellRequest {
                show_id: SHOW,
                seat_ids: ids(seats),
                payment_method: method,
                customer: None,
                idempotency_key: key.map(Into::into),
            })
            .await
    }
}

fn ids(seats: &[i64]) -> Vec<SeatId> {
    seats.iter().copied().map(SeatId::new).collect()
}

/// Scenario 1: two simultaneous sales of the same seat.
///
/// Exactly one succeeds with an issued ticket; the other gets a conflict.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn scenario_1_simultaneous_sales_have_one_winner() {
    let h = Harness::new().await;

    let (a, b) = tokio::join!(
        h.sell(&[1], PaymentMethod::Cash, None),
        h.sell(&[1], PaymentMethod::Card, None)
    );

    let (winner, loser) = match (a, b) {
        (Ok(win), Err(lose)) | (Err(lose), Ok(win)) => (win, lose),
        other => panic!("expected one winner and one loser, got {other:?}"),
    };
    assert_eq!(winner.purchase.state, PurchaseState::Paid);
    assert_eq!(winner.purchase.tickets.len(), 1);
    assert_eq!(winner.purchase.tickets[0].state, TicketState::Issued);
    assert!(winner.purchase.tickets[0].code.is_some());
    assert!(matches!(loser, EngineError::Conflict { requested: 1, claimed: 0, .. }));

    assert_eq!(h.state_of(1).await, SeatState::Sold);
    assert_eq!(h.store.purchases().await.len(), 1);
}

/// Scenario 2: a reservation confirmed at the box office within the hold.
#[tokio::test]
async fn scenario_2_reservation_confirmed_at_box_office() {
    let h = Harness::new().await;

    let reserved = h.reserve(&[1, 2]).await.unwrap();
    assert_eq!(reserved.purchase.state, PurchaseState::Pending);
    assert!(!reserved.replayed);
    assert!(reserved.purchase.tickets.iter().all(|t| t.state == TicketState::Held));
    assert!(reserved.purchase.tickets.iter().all(|t| t.code.is_none()));

    let held = h.store.seat(SHOW, SeatId::new(1)).await.unwrap();
    assert_eq!(held.state, SeatState::Held);
    assert_eq!(held.hold_expiry, Some(h.t0 + Duration::hours(1)));

    h.clock.advance(Duration::minutes(30));
    let confirmed = h
        .engine
        .confirm_sale(ConfirmSaleRequest {
            show_id: SHOW,
            seat_ids: ids(&[1, 2]),
            payment_method: PaymentMethod::Card,
            customer: None,
        })
        .await
        .unwrap();

    assert_eq!(confirmed.confirmed_from_hold, 2);
    assert_eq!(confirmed.newly_sold, 0);
    assert_eq!(confirmed.new_purchase_id, None);
    assert_eq!(confirmed.settled_purchase_ids, vec![reserved.purchase.id]);

    let paid = h.engine.purchase(reserved.purchase.id).await.unwrap();
    assert_eq!(paid.state, PurchaseState::Paid);
    assert_eq!(paid.payment_method, PaymentMethod::Card);
    assert!(paid.tickets.iter().all(|t| t.state == TicketState::Issued));
    assert!(paid.tickets.iter().all(|t| t.code.is_some()));
    assert_eq!(h.state_of(1).await, SeatState::Sold);
    assert_eq!(h.state_of(2).await, SeatState::Sold);
}

/// Scenario 3: an expired hold is sold again without an explicit release.
#[tokio::test]
async fn scenario_3_expired_hold_is_reclaimed_by_a_sale() {
    let h = Harness::new().await;
    let reserved = h.reserve(&[1, 2]).await.unwrap();

    h.clock.advance(Duration::minutes(90));
    let stale = h.store.seat(SHOW, SeatId::new(1)).await.unwrap();
    assert_eq!(stale.state, SeatState::Held);
    assert!(stale.hold_expiry.unwrap() < h.clock_now());

    let sold = h.sell(&[1], PaymentMethod::Cash, None).await.unwrap();
    assert_eq!(sold.purchase.state, PurchaseState::Paid);
    assert_eq!(h.state_of(1).await, SeatState::Sold);

    // The reservation lost seat 1 but still holds seat 2
    let pending = h.engine.purchase(reserved.purchase.id).await.unwrap();
    assert_eq!(pending.state, PurchaseState::Pending);
    let seat_1 = pending.tickets.iter().find(|t| t.seat_id == SeatId::new(1)).unwrap();
    assert_eq!(seat_1.state, TicketState::Void);
}

/// Scenario 4: the sweep releases what is left of the lapsed reservation.
#[tokio::test]
async fn scenario_4_release_expired_holds_after_reclaim() {
    let h = Harness::new().await;
    let reserved = h.reserve(&[1, 2]).await.unwrap();
    h.clock.advance(Duration::minutes(90));
    h.sell(&[1], PaymentMethod::Cash, None).await.unwrap();

    let released = h.engine.release_expired_holds(SHOW).await.unwrap();
    assert_eq!(released, 1);
    assert_eq!(h.state_of(2).await, SeatState::Available);
    assert_eq!(h.state_of(1).await, SeatState::Sold);

    let cancelled = h.engine.purchase(reserved.purchase.id).await.unwrap();
    assert_eq!(cancelled.state, PurchaseState::Cancelled);
    assert!(cancelled.tickets.iter().all(|t| t.state == TicketState::Void));

    // Idempotent
    assert_eq!(h.engine.release_expired_holds(SHOW).await.unwrap(), 0);
}

/// Scenario 5: the same sale sent twice under one key.
#[tokio::test]
async fn scenario_5_idempotent_sale_replays_the_first_purchase() {
    let h = Harness::new().await;

    let first = h.sell(&[3], PaymentMethod::Cash, Some("abc")).await.unwrap();
    let second = h.sell(&[3], PaymentMethod::Cash, Some("abc")).await.unwrap();

    assert!(!first.replayed);
    assert!(second.replayed);
    assert_eq!(first.purchase.id, second.purchase.id);
    assert_eq!(first.purchase.total, second.purchase.total);
    assert_eq!(first.purchase.tickets, second.purchase.tickets);
    assert_eq!(second.purchase.idempotency_key.as_deref(), Some("abc"));
    assert_eq!(h.store.purchases().await.len(), 1);
}

/// Scenario 6: one unavailable seat fails the whole request.
#[tokio::test]
async fn scenario_6_partial_availability_changes_nothing() {
    let h = Harness::new().await;
    h.sell(&[2], PaymentMethod::Card, None).await.unwrap();

    let result = h.sell(&[1, 2, 3], PaymentMethod::Cash, None).await;

    assert!(matches!(
        result,
        Err(EngineError::Conflict { requested: 3, claimed: 2, .. })
    ));
    assert_eq!(h.state_of(1).await, SeatState::Available);
    assert_eq!(h.state_of(3).await, SeatState::Available);
    assert_eq!(h.store.purchases().await.len(), 1);
}

impl Harness {
    fn clock_now(&self) -> DateTime<Utc> {
        use boxoffice_core::environment::Clock;
        self.clock.now()
    }
}

// ============================================================================
// Further properties
// ============================================================================

/// Confirming part of a reservation leaves it PENDING.
#[tokio::test]
async fn partial_confirmation_keeps_the_reservation_pending() {
    let h = Harness::new().await;
    let reserved = h.reserve(&[1, 2]).await.unwrap();

    let confirmed = h
        .engine
        .confirm_sale(ConfirmSaleRequest {
            show_id: SHOW,
            seat_ids: ids(&[1]),
            payment_method: PaymentMethod::Cash,
            customer: None,
        })
        .await
        .unwrap();
    assert_eq!(confirmed.confirmed_from_hold, 1);
    assert!(confirmed.settled_purchase_ids.is_empty());

    let purchase = h.engine.purchase(reserved.purchase.id).await.unwrap();
    assert_eq!(purchase.state, PurchaseState::Pending);
    let states: Vec<TicketState> = purchase.tickets.iter().map(|t| t.state).collect();
    assert_eq!(states, vec![TicketState::Issued, TicketState::Held]);
}

/// Held and free seats confirmed together: the free one gets a new purchase.
#[tokio::test]
async fn confirmation_sells_unheld_seats_to_the_buyer() {
    let h = Harness::new().await;
    h.reserve(&[1]).await.unwrap();

    let confirmed = h
        .engine
        .confirm_sale(ConfirmSaleRequest {
            show_id: SHOW,
            seat_ids: ids(&[1, 3]),
            payment_method: PaymentMethod::PayPal,
            customer: Some(CustomerIdentity::WalkIn {
                email: None,
                name: Some("Ana".into()),
            }),
        })
        .await
        .unwrap();

    assert_eq!(confirmed.confirmed_from_hold, 1);
    assert_eq!(confirmed.newly_sold, 1);
    let new_id = confirmed.new_purchase_id.expect("new purchase");
    let fresh = h.engine.purchase(new_id).await.unwrap();
    assert_eq!(fresh.state, PurchaseState::Paid);
    assert_eq!(fresh.seat_ids(), ids(&[3]));
    assert_eq!(fresh.payment_method, PaymentMethod::PayPal);
}

/// A lapsed hold is not confirmed for its holder; the seat is sold as fresh.
#[tokio::test]
async fn confirmation_treats_lapsed_holds_as_fresh_seats() {
    let h = Harness::new().await;
    let reserved = h.reserve(&[1]).await.unwrap();
    h.clock.advance(Duration::minutes(61));

    let confirmed = h
        .engine
        .confirm_sale(ConfirmSaleRequest {
            show_id: SHOW,
            seat_ids: ids(&[1]),
            payment_method: PaymentMethod::Cash,
            customer: None,
        })
        .await
        .unwrap();

    assert_eq!(confirmed.confirmed_from_hold, 0);
    assert_eq!(confirmed.newly_sold, 1);
    let old = h.engine.purchase(reserved.purchase.id).await.unwrap();
    assert_eq!(old.state, PurchaseState::Cancelled);
}

/// A conflict on the fresh part rolls back the hold conversion too.
#[tokio::test]
async fn confirmation_conflict_applies_nothing() {
    let h = Harness::new().await;
    let reserved = h.reserve(&[1]).await.unwrap();
    h.sell(&[2], PaymentMethod::Cash, None).await.unwrap();

    let result = h
        .engine
        .confirm_sale(ConfirmSaleRequest {
            show_id: SHOW,
            seat_ids: ids(&[1, 2]),
            payment_method: PaymentMethod::Cash,
            customer: None,
        })
        .await;

    assert!(matches!(result, Err(EngineError::Conflict { .. })));
    assert_eq!(h.state_of(1).await, SeatState::Held);
    let still_pending = h.engine.purchase(reserved.purchase.id).await.unwrap();
    assert_eq!(still_pending.state, PurchaseState::Pending);
    assert_eq!(still_pending.tickets[0].state, TicketState::Held);
}

/// Reservations close one hour before the show.
#[tokio::test]
async fn reservations_close_an_hour_before_the_show() {
    let h = Harness::new().await;
    h.clock.advance(Duration::minutes(60));

    let result = h.reserve(&[1]).await;

    assert!(matches!(result, Err(EngineError::Validation(_))));
    assert_eq!(h.state_of(1).await, SeatState::Available);
    // Direct sales stay open
    assert!(h.sell(&[1], PaymentMethod::Cash, None).await.is_ok());
}

/// Unknown shows, inactive shows and unknown seats.
#[tokio::test]
async fn bad_references_are_rejected() {
    let h = Harness::new().await;
    ShowFixture::new(2)
        .starting_in_hours(h.t0, 5)
        .inactive()
        .seats([1])
        .provision(&h.store)
        .await;

    let unknown = h
        .engine
        .sell(SellRequest {
            show_id: ShowId::new(99),
            seat_ids: ids(&[1]),
            payment_method: PaymentMethod::Cash,
            customer: None,
            idempotency_key: None,
        })
        .await;
    assert!(matches!(unknown, Err(EngineError::NotFound { resource: "Show", .. })));

    let inactive = h
        .engine
        .sell(SellRequest {
            show_id: ShowId::new(2),
            seat_ids: ids(&[1]),
            payment_method: PaymentMethod::Cash,
            customer: None,
            idempotency_key: None,
        })
        .await;
    assert!(matches!(inactive, Err(EngineError::Validation(_))));

    let missing_seat = h.sell(&[1, 42], PaymentMethod::Cash, None).await;
    assert!(matches!(missing_seat, Err(EngineError::Conflict { .. })));
    assert_eq!(h.state_of(1).await, SeatState::Available);
}

/// A replay answers even when the seats are gone since.
#[tokio::test]
async fn replays_do_not_touch_inventory() {
    let h = Harness::new().await;
    let first = h.sell(&[1], PaymentMethod::Cash, Some("key-1")).await.unwrap();

    // Same key, different seats: the recorded purchase wins
    let replay = h.sell(&[2], PaymentMethod::Card, Some("  key-1  ")).await.unwrap();

    assert!(replay.replayed);
    assert_eq!(replay.purchase.id, first.purchase.id);
    assert_eq!(h.state_of(2).await, SeatState::Available);
}

/// Returning registered customers are not duplicated.
#[tokio::test]
async fn repeat_buyers_share_one_customer_record() {
    let h = Harness::new().await;
    let a = h.reserve(&[1]).await.unwrap();
    let b = h.reserve(&[2]).await.unwrap();

    assert_eq!(a.purchase.customer_id, b.purchase.customer_id);
    assert_eq!(h.store.customers().await.len(), 1);
}

/// A blank registered identity is rejected before the show is looked up.
#[tokio::test]
async fn blank_identity_fails_validation_before_any_lookup() {
    let h = Harness::new().await;
    h.sell(&[1], PaymentMethod::Cash, Some("taken")).await.unwrap();
    let blank = RegisteredCustomer {
        provider: " ".into(),
        subject: String::new(),
        email: None,
        name: None,
    };

    let unknown_show = h
        .engine
        .reserve(ReserveRequest {
            show_id: ShowId::new(99),
            seat_ids: ids(&[1]),
            customer: blank.clone(),
            idempotency_key: None,
        })
        .await;
    assert!(matches!(unknown_show, Err(EngineError::Validation(_))));

    let recorded_key = h
        .engine
        .reserve(ReserveRequest {
            show_id: SHOW,
            seat_ids: ids(&[2]),
            customer: blank.clone(),
            idempotency_key: Some("taken".into()),
        })
        .await;
    assert!(matches!(recorded_key, Err(EngineError::Validation(_))));

    let sale = h
        .engine
        .sell(SellRequest {
            show_id: ShowId::new(99),
            seat_ids: ids(&[1]),
            payment_method: PaymentMethod::Cash,
            customer: Some(CustomerIdentity::Registered(blank.clone())),
            idempotency_key: Some("taken".into()),
        })
        .await;
    assert!(matches!(sale, Err(EngineError::Validation(_))));

    let confirmation = h
        .engine
        .confirm_sale(ConfirmSaleRequest {
            show_id: ShowId::new(99),
            seat_ids: ids(&[2]),
            payment_method: PaymentMethod::Cash,
            customer: Some(CustomerIdentity::Registered(blank)),
        })
        .await;
    assert!(matches!(confirmation, Err(EngineError::Validation(_))));
    assert_eq!(h.state_of(2).await, SeatState::Available);
}

/// A confirmation whose combined total overflows applies nothing.
#[tokio::test]
async fn confirmation_total_overflow_is_rejected() {
    let t0 = Utc.with_ymd_and_hms(2025, 6, 1, 18, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::starting_at(t0));
    let store = Arc::new(InMemoryTicketStore::new());
    ShowFixture::new(SHOW.get())
        .starting_in_hours(t0, 2)
        .price(Money::from_cents(u64::MAX))
        .seats([1, 2])
        .provision(&store)
        .await;
    let engine = PurchaseEngine::new(store.clone(), clock, EngineConfig::default());

    let reserved = engine
        .reserve(ReserveRequest {
            show_id: SHOW,
            seat_ids: ids(&[1]),
            customer: RegisteredCustomer {
                provider: "google".into(),
                subject: "viewer-1".into(),
                email: None,
                name: None,
            },
            idempotency_key: None,
        })
        .await
        .unwrap();

    let result = engine
        .confirm_sale(ConfirmSaleRequest {
            show_id: SHOW,
            seat_ids: ids(&[1, 2]),
            payment_method: PaymentMethod::Card,
            customer: None,
        })
        .await;

    assert!(matches!(result, Err(EngineError::Validation(_))));
    let pending = engine.purchase(reserved.purchase.id).await.unwrap();
    assert_eq!(pending.state, PurchaseState::Pending);
    let seat_2 = store.seat(SHOW, SeatId::new(2)).await.unwrap();
    assert_eq!(seat_2.state, SeatState::Available);
}
