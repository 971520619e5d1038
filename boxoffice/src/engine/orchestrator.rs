//! Purchase orchestrator: Reserve, Sell and `ConfirmSale`.
//!
//! Each call runs in exactly one store transaction. The claim is the only
//! synchronization point; the purchase and its tickets are written after it,
//! and any shortfall rolls the whole transaction back.

use super::holds::{hold_expiry_for, retire_stale_holds};
use super::{
    ConfirmSaleRequest, ConfirmationOutcome, Operation, PurchaseEngine, PurchaseOutcome,
    ReserveRequest, SellRequest, customers, finish_operation, idempotency, pricing,
    rollback_quietly,
};
use crate::metrics;
use boxoffice_core::error::EngineError;
use boxoffice_core::inventory::{ClaimRule, ClaimedSeat, SeatTarget};
use boxoffice_core::store::StoreTransaction;
use boxoffice_core::types::{
    CustomerId, CustomerIdentity, Money, PaymentMethod, Purchase, PurchaseId, PurchaseState,
    SeatId, Show, ShowId, Ticket, TicketId, TicketState,
};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::time::Instant;
use uuid::Uuid;

/// What a transaction attempt produced before commit.
enum Recorded {
    /// The key was already in the ledger.
    Replay(Purchase),
    /// A new purchase was written.
    Fresh(Purchase),
}

impl PurchaseEngine {
    /// `Reserve`: hold seats under a PENDING purchase for a registered customer.
    ///
    /// Holds expire one hour before the show. A retry with the same
    /// idempotency key returns the first purchase flagged as replayed.
    ///
    /// # Errors
    ///
    /// - `Validation`: bad seat list or key, inactive show, or the hold would
    ///   already be expired
    /// - `NotFound`: unknown show
    /// - `Conflict`: at least one seat is held or sold
    /// - `Store`: the transaction failed
    #[tracing::instrument(
        skip(self, request),
        fields(show_id = %request.show_id, seats = request.seat_ids.len())
    )]
    pub async fn reserve(&self, request: ReserveRequest) -> Result<PurchaseOutcome, EngineError> {
        let started = Instant::now();
        let show_id = request.show_id;
        let result = self.run_reserve(request).await;
        finish_purchase(Operation::Reserve, show_id, started, &result);
        result
    }

    /// `Sell`: sell seats outright under a PAID purchase with issued tickets.
    ///
    /// # Errors
    ///
    /// Same taxonomy as [`PurchaseEngine::reserve`], without the expiry check.
    #[tracing::instrument(
        skip(self, request),
        fields(show_id = %request.show_id, seats = request.seat_ids.len())
    )]
    pub async fn sell(&self, request: SellRequest) -> Result<PurchaseOutcome, EngineError> {
        let started = Instant::now();
        let show_id = request.show_id;
        let result = self.run_sell(request).await;
        finish_purchase(Operation::Sell, show_id, started, &result);
        result
    }

    /// `ConfirmSale`: the box office converts live holds to sales and sells
    /// the remaining requested seats, all in one transaction.
    ///
    /// A pending purchase becomes PAID once none of its tickets is held.
    ///
    /// # Errors
    ///
    /// - `Validation`: bad seat list or inactive show
    /// - `NotFound`: unknown show
    /// - `Conflict`: a hold lapsed mid-flight or a fresh seat is taken;
    ///   nothing is applied
    /// - `Store`: the transaction failed
    #[tracing::instrument(
        skip(self, request),
        fields(show_id = %request.show_id, seats = request.seat_ids.len())
    )]
    pub async fn confirm_sale(
        &self,
        request: ConfirmSaleRequest,
    ) -> Result<ConfirmationOutcome, EngineError> {
        let started = Instant::now();
        let show_id = request.show_id;
        let result = self.run_confirm_sale(request).await;
        finish_operation(Operation::ConfirmSale, show_id, started, &result, false);
        result
    }

    async fn run_reserve(&self, request: ReserveRequest) -> Result<PurchaseOutcome, EngineError> {
        let ReserveRequest {
            show_id,
            seat_ids,
            customer,
            idempotency_key,
        } = request;
        let seats = self.validate_seats(&seat_ids)?;
        let key = idempotency::normalize(idempotency_key)?;
        customers::validate_registered(&customer)?;
        let now = self.clock.now();

        let mut tx = self.store.begin().await?;
        let attempt = async {
            if let Some(existing) = idempotency::find_by_key(tx.as_mut(), key.as_deref()).await? {
                return Ok(Recorded::Replay(existing));
            }

            let show = pricing::active_show(tx.as_mut(), show_id).await?;
            let expiry = hold_expiry_for(&show);
            if expiry <= now {
                return Err(EngineError::validation(format!(
                    "reservations for show {show_id} closed at {expiry}"
                )));
            }
            let customer =
                customers::resolve_registered(tx.as_mut(), &customer, now).await?;
            let claimed = claim_all(
                tx.as_mut(),
                show_id,
                &seats,
                ClaimRule::Reclaimable,
                SeatTarget::Held { expiry },
                now,
            )
            .await?;
            retire_stale_holds(tx.as_mut(), show_id, &seats).await?;

            let purchase = new_purchase(Draft {
                show: &show,
                customer_id: customer.id,
                claimed: &claimed,
                state: PurchaseState::Pending,
                payment_method: PaymentMethod::Cash,
                idempotency_key: key.clone(),
                now,
            })?;
            tx.insert_purchase(&purchase).await?;
            Ok::<_, EngineError>(Recorded::Fresh(purchase))
        }
        .await;

        self.settle(tx, attempt, key.as_deref()).await
    }

    async fn run_sell(&self, request: SellRequest) -> Result<PurchaseOutcome, EngineError> {
        let SellRequest {
            show_id,
            seat_ids,
            payment_method,
            customer,
            idempotency_key,
        } = request;
        let seats = self.validate_seats(&seat_ids)?;
        let key = idempotency::normalize(idempotency_key)?;
        customers::validate(customer.as_ref())?;
        let now = self.clock.now();

        let mut tx = self.store.begin().await?;
        let attempt = async {
            if let Some(existing) = idempotency::find_by_key(tx.as_mut(), key.as_deref()).await? {
                return Ok(Recorded::Replay(existing));
            }
            let show = pricing::active_show(tx.as_mut(), show_id).await?;
            let purchase = sell_in(
                tx.as_mut(),
                &show,
                &seats,
                payment_method,
                customer.as_ref(),
                key.clone(),
                now,
            )
            .await?;
            Ok::<_, EngineError>(Recorded::Fresh(purchase))
        }
        .await;

        self.settle(tx, attempt, key.as_deref()).await
    }

    async fn run_confirm_sale(
        &self,
        request: ConfirmSaleRequest,
    ) -> Result<ConfirmationOutcome, EngineError> {
        let ConfirmSaleRequest {
            show_id,
            seat_ids,
            payment_method,
            customer,
        } = request;
        let seats = self.validate_seats(&seat_ids)?;
        customers::validate(customer.as_ref())?;
        let now = self.clock.now();

        let mut tx = self.store.begin().await?;
        let attempt = async {
            let show = pricing::active_show(tx.as_mut(), show_id).await?;

            let held_tickets = tx.live_holds(show_id, &seats, now).await?;
            let held_seats: BTreeSet<SeatId> = held_tickets.iter().map(|t| t.seat_id).collect();
            let fresh_seats: Vec<SeatId> = seats
                .iter()
                .copied()
                .filter(|seat| !held_seats.contains(seat))
                .collect();

            let mut settled = Vec::new();
            let mut settled_revenue = Money::default();
            if !held_seats.is_empty() {
                let held: Vec<SeatId> = held_seats.iter().copied().collect();
                claim_all(
                    tx.as_mut(),
                    show_id,
                    &held,
                    ClaimRule::ActiveHold,
                    SeatTarget::Sold,
                    now,
                )
                .await?;

                let mut touched = BTreeSet::new();
                for (issued_so_far, ticket) in held_tickets.iter().enumerate() {
                    if tx.issue_ticket(ticket.id, &ticket_code()).await? != 1 {
                        return Err(EngineError::Conflict {
                            show_id,
                            requested: held_tickets.len(),
                            claimed: u64::try_from(issued_so_far).unwrap_or(u64::MAX),
                        });
                    }
                    touched.insert(ticket.purchase_id);
                }

                for purchase_id in touched {
                    if tx.count_held_tickets(purchase_id).await? > 0 {
                        continue;
                    }
                    if tx
                        .mark_purchase_paid(purchase_id, payment_method)
                        .await?
                        == 1
                    {
                        if let Some(paid) = tx.purchase(purchase_id).await? {
                            settled_revenue = add_revenue(settled_revenue, paid.total)?;
                        }
                        settled.push(purchase_id);
                    }
                }
            }

            let new_purchase = if fresh_seats.is_empty() {
                None
            } else {
                Some(
                    sell_in(
                        tx.as_mut(),
                        &show,
                        &fresh_seats,
                        payment_method,
                        customer.as_ref(),
                        None,
                        now,
                    )
                    .await?,
                )
            };

            let revenue = match &new_purchase {
                Some(purchase) => add_revenue(settled_revenue, purchase.total)?,
                None => settled_revenue,
            };

            Ok::<_, EngineError>((
                ConfirmationOutcome {
                    confirmed_from_hold: held_seats.len(),
                    newly_sold: fresh_seats.len(),
                    new_purchase_id: new_purchase.as_ref().map(|p| p.id),
                    settled_purchase_ids: settled,
                },
                revenue,
            ))
        }
        .await;

        match attempt {
            Ok((outcome, revenue)) => {
                tx.commit().await?;
                metrics::record_seats_sold(outcome.confirmed_from_hold + outcome.newly_sold);
                metrics::record_revenue(revenue.cents());
                Ok(outcome)
            }
            Err(error) => {
                rollback_quietly(tx).await;
                Err(error)
            }
        }
    }

    /// Commit or roll back an attempt, then resolve key races.
    async fn settle(
        &self,
        tx: Box<dyn StoreTransaction>,
        attempt: Result<Recorded, EngineError>,
        key: Option<&str>,
    ) -> Result<PurchaseOutcome, EngineError> {
        let error = match attempt {
            Ok(Recorded::Replay(purchase)) => {
                rollback_quietly(tx).await;
                return Ok(PurchaseOutcome {
                    purchase,
                    replayed: true,
                });
            }
            Ok(Recorded::Fresh(purchase)) => match tx.commit().await {
                Ok(()) => {
                    return Ok(PurchaseOutcome {
                        purchase,
                        replayed: false,
                    });
                }
                Err(error) => EngineError::from(error),
            },
            Err(error) => {
                rollback_quietly(tx).await;
                error
            }
        };

        let Some(key) = key else {
            return Err(error);
        };
        if !error.may_be_key_race() {
            return Err(error);
        }
        match idempotency::recover_race(self.store.as_ref(), key).await {
            Ok(Some(purchase)) => {
                tracing::debug!(purchase_id = %purchase.id, "Concurrent request won the key");
                Ok(PurchaseOutcome {
                    purchase,
                    replayed: true,
                })
            }
            Ok(None) => Err(error),
            Err(lookup) => {
                tracing::warn!(error = %lookup, "Idempotency re-read failed");
                Err(error)
            }
        }
    }
}

/// Log and count a finished Reserve or Sell.
fn finish_purchase(
    operation: Operation,
    show_id: ShowId,
    started: Instant,
    result: &Result<PurchaseOutcome, EngineError>,
) {
    let replayed = matches!(result, Ok(outcome) if outcome.replayed);
    finish_operation(operation, show_id, started, result, replayed);
    match result {
        Ok(outcome) if outcome.replayed => metrics::record_replay(operation.as_str()),
        Ok(outcome) => {
            let seats = outcome.purchase.tickets.len();
            if outcome.purchase.state == PurchaseState::Paid {
                metrics::record_seats_sold(seats);
                metrics::record_revenue(outcome.purchase.total.cents());
            } else {
                metrics::record_seats_held(seats);
            }
            tracing::debug!(
                operation = operation.as_str(),
                purchase_id = %outcome.purchase.id,
                seats,
                total = %outcome.purchase.total,
                "Purchase recorded"
            );
        }
        Err(_) => {}
    }
}

fn add_revenue(sum: Money, total: Money) -> Result<Money, EngineError> {
    sum.checked_add(total)
        .ok_or_else(|| EngineError::validation("confirmed sale total is out of range"))
}

/// Claim every seat or fail with `Conflict`.
async fn claim_all(
    tx: &mut dyn StoreTransaction,
    show_id: ShowId,
    seats: &[SeatId],
    rule: ClaimRule,
    target: SeatTarget,
    now: DateTime<Utc>,
) -> Result<Vec<ClaimedSeat>, EngineError> {
    let claimed = tx.claim_seats(show_id, seats, rule, target, now).await?;
    if claimed.len() != seats.len() {
        return Err(EngineError::Conflict {
            show_id,
            requested: seats.len(),
            claimed: u64::try_from(claimed.len()).unwrap_or(u64::MAX),
        });
    }
    Ok(claimed)
}

/// The sell path shared by `Sell` and the fresh part of `ConfirmSale`.
async fn sell_in(
    tx: &mut dyn StoreTransaction,
    show: &Show,
    seats: &[SeatId],
    payment_method: PaymentMethod,
    customer: Option<&CustomerIdentity>,
    idempotency_key: Option<String>,
    now: DateTime<Utc>,
) -> Result<Purchase, EngineError> {
    let customer = customers::resolve(tx, customer, now).await?;
    let claimed = claim_all(
        tx,
        show.id,
        seats,
        ClaimRule::Reclaimable,
        SeatTarget::Sold,
        now,
    )
    .await?;
    retire_stale_holds(tx, show.id, seats).await?;

    let purchase = new_purchase(Draft {
        show,
        customer_id: customer.id,
        claimed: &claimed,
        state: PurchaseState::Paid,
        payment_method,
        idempotency_key,
        now,
    })?;
    tx.insert_purchase(&purchase).await?;
    Ok(purchase)
}

struct Draft<'a> {
    show: &'a Show,
    customer_id: CustomerId,
    claimed: &'a [ClaimedSeat],
    state: PurchaseState,
    payment_method: PaymentMethod,
    idempotency_key: Option<String>,
    now: DateTime<Utc>,
}

/// Build a purchase with one ticket per claimed seat, ordered by seat.
///
/// Pending purchases get HELD tickets without codes; paid ones get ISSUED
/// tickets with fresh codes.
fn new_purchase(draft: Draft<'_>) -> Result<Purchase, EngineError> {
    let quote = pricing::quote(draft.show, draft.claimed.len())?;
    let purchase_id = PurchaseId::new();
    let paid = draft.state == PurchaseState::Paid;

    let mut claimed = draft.claimed.to_vec();
    claimed.sort_by_key(|seat| seat.seat_id);
    let tickets = claimed
        .iter()
        .map(|seat| Ticket {
            id: TicketId::new(),
            purchase_id,
            show_seat_id: seat.id,
            seat_id: seat.seat_id,
            unit_price: quote.unit_price,
            state: if paid {
                TicketState::Issued
            } else {
                TicketState::Held
            },
            code: paid.then(ticket_code),
        })
        .collect();

    let purchase = Purchase {
        id: purchase_id,
        customer_id: draft.customer_id,
        show_id: draft.show.id,
        total: quote.total,
        state: draft.state,
        payment_method: draft.payment_method,
        idempotency_key: draft.idempotency_key,
        created_at: draft.now,
        tickets,
    };
    debug_assert!(purchase.is_balanced());
    Ok(purchase)
}

fn ticket_code() -> String {
    Uuid::new_v4().simple().to_string().to_uppercase()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use boxoffice_core::types::ShowSeatId;
    use boxoffice_testing::ShowFixture;

    fn claimed(ids: &[i64]) -> Vec<ClaimedSeat> {
        ids.iter()
            .map(|&id| ClaimedSeat {
                id: ShowSeatId::new(id + 100),
                seat_id: SeatId::new(id),
            })
            .collect()
    }

    #[test]
    fn paid_purchases_issue_coded_tickets_in_seat_order() {
        let fixture = ShowFixture::new(1).price(Money::from_cents(900));
        let seats = claimed(&[3, 1, 2]);
        let purchase = new_purchase(Draft {
            show: fixture.show(),
            customer_id: CustomerId::new(),
            claimed: &seats,
            state: PurchaseState::Paid,
            payment_method: PaymentMethod::Card,
            idempotency_key: None,
            now: fixture.show().starts_at,
        })
        .unwrap();

        assert_eq!(purchase.total, Money::from_cents(2700));
        assert!(purchase.is_balanced());
        assert_eq!(
            purchase.seat_ids(),
            vec![SeatId::new(1), SeatId::new(2), SeatId::new(3)]
        );
        assert!(purchase.tickets.iter().all(|t| t.state == TicketState::Issued));
        assert!(purchase.tickets.iter().all(|t| t.code.is_some()));
    }

    #[test]
    fn pending_purchases_hold_uncoded_tickets() {
        let fixture = ShowFixture::new(1);
        let seats = claimed(&[5]);
        let purchase = new_purchase(Draft {
            show: fixture.show(),
            customer_id: CustomerId::new(),
            claimed: &seats,
            state: PurchaseState::Pending,
            payment_method: PaymentMethod::Cash,
            idempotency_key: Some("k".into()),
            now: fixture.show().starts_at,
        })
        .unwrap();

        assert_eq!(purchase.tickets[0].state, TicketState::Held);
        assert!(purchase.tickets[0].code.is_none());
        assert_eq!(purchase.idempotency_key.as_deref(), Some("k"));
    }

    #[test]
    fn ticket_codes_are_unique() {
        assert_ne!(ticket_code(), ticket_code());
    }
}
