//! In-memory implementation of the store port.
//!
//! A transaction takes the store-wide lock for its whole lifetime and works
//! on a private copy of the tables; `commit` swaps the copy in, while
//! `rollback` or drop throws it away. Transactions are therefore fully
//! serialised, which is stricter than Postgres but yields the same
//! observable outcomes for the engine's conditional claims.

use boxoffice_core::error::StoreError;
use boxoffice_core::inventory::{ClaimRule, ClaimedSeat, SeatTarget};
use boxoffice_core::store::{StoreFuture, StoreTransaction, TicketStore};
use boxoffice_core::types::{
    Customer, PaymentMethod, Purchase, PurchaseId, PurchaseState, Seat, SeatId, SeatState, Show,
    ShowId, ShowSeat, ShowSeatId, Ticket, TicketId, TicketState,
};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Default, Clone)]
struct Tables {
    shows: BTreeMap<ShowId, Show>,
    seats: BTreeMap<(ShowId, SeatId), ShowSeat>,
    purchases: BTreeMap<PurchaseId, Purchase>,
    customers: BTreeMap<(String, String), Customer>,
    next_show_seat_id: i64,
}

impl Tables {
    fn tickets(&self) -> impl Iterator<Item = &Ticket> {
        self.purchases.values().flat_map(|purchase| purchase.tickets.iter())
    }

    fn tickets_mut(&mut self) -> impl Iterator<Item = &mut Ticket> {
        self.purchases
            .values_mut()
            .flat_map(|purchase| purchase.tickets.iter_mut())
    }

    fn show_seat_ids(&self, show_id: ShowId, seat_ids: &[SeatId]) -> BTreeSet<ShowSeatId> {
        seat_ids
            .iter()
            .filter_map(|seat_id| self.seats.get(&(show_id, *seat_id)))
            .map(|seat| seat.id)
            .collect()
    }
}

/// In-memory [`TicketStore`] for tests.
///
/// Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTicketStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryTicketStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a show and one `AVAILABLE` inventory row per seat.
    ///
    /// Provisioning is outside the engine; tests and demos use this to seed data.
    pub async fn provision_show(&self, show: Show, seats: &[Seat]) {
        let mut tables = self.tables.lock().await;
        let show_id = show.id;
        tables.shows.insert(show_id, show);
        for seat in seats {
            tables.next_show_seat_id += 1;
            let id = ShowSeatId::new(tables.next_show_seat_id);
            tables.seats.insert(
                (show_id, seat.id),
                ShowSeat {
                    id,
                    show_id,
                    seat_id: seat.id,
                    row: seat.row.clone(),
                    column: seat.column,
                    seat_type: seat.seat_type.clone(),
                    state: SeatState::Available,
                    hold_expiry: None,
                },
            );
        }
    }

    /// Committed inventory row for a seat.
    pub async fn seat(&self, show_id: ShowId, seat_id: SeatId) -> Option<ShowSeat> {
        self.tables.lock().await.seats.get(&(show_id, seat_id)).cloned()
    }

    /// Every committed purchase, in id order.
    pub async fn purchases(&self) -> Vec<Purchase> {
        self.tables.lock().await.purchases.values().cloned().collect()
    }

    /// Every committed customer.
    pub async fn customers(&self) -> Vec<Customer> {
        self.tables.lock().await.customers.values().cloned().collect()
    }
}

impl TicketStore for InMemoryTicketStore {
    fn begin(&self) -> StoreFuture<'_, Box<dyn StoreTransaction>> {
        let tables = Arc::clone(&self.tables);
        Box::pin(async move {
            let guard = tables.lock_owned().await;
            let working = guard.clone();
            Ok(Box::new(InMemoryTransaction { guard, working }) as Box<dyn StoreTransaction>)
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}

/// Transaction over a private copy of the tables.
struct InMemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

impl StoreTransaction for InMemoryTransaction {
    fn show(&mut self, show_id: ShowId) -> StoreFuture<'_, Option<Show>> {
        let show = self.working.shows.get(&show_id).cloned();
        Box::pin(async move { Ok(show) })
    }

    fn active_shows(&mut self, now: DateTime<Utc>) -> StoreFuture<'_, Vec<ShowId>> {
        let mut shows: Vec<&Show> = self
            .working
            .shows
            .values()
            .filter(|show| show.active && show.ends_at > now)
            .collect();
        shows.sort_by_key(|show| show.starts_at);
        let ids = shows.into_iter().map(|show| show.id).collect();
        Box::pin(async move { Ok(ids) })
    }

    fn seat_map(&mut self, show_id: ShowId) -> StoreFuture<'_, Vec<ShowSeat>> {
        let mut seats: Vec<ShowSeat> = self
            .working
            .seats
            .values()
            .filter(|seat| seat.show_id == show_id)
            .cloned()
            .collect();
        seats.sort_by(|a, b| a.row.cmp(&b.row).then(a.column.cmp(&b.column)));
        Box::pin(async move { Ok(seats) })
    }

    fn claim_seats<'a>(
        &'a mut self,
        show_id: ShowId,
        seat_ids: &'a [SeatId],
        rule: ClaimRule,
        target: SeatTarget,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, Vec<ClaimedSeat>> {
        let requested: BTreeSet<SeatId> = seat_ids.iter().copied().collect();
        let mut claimed = Vec::new();
        for seat_id in requested {
            if let Some(seat) = self.working.seats.get_mut(&(show_id, seat_id)) {
                if seat.claim(rule, target, now) {
                    claimed.push(ClaimedSeat::from(&*seat));
                }
            }
        }
        Box::pin(async move { Ok(claimed) })
    }

    fn release_expired_holds(
        &mut self,
        show_id: ShowId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, Vec<SeatId>> {
        let released = self
            .working
            .seats
            .values_mut()
            .filter(|seat| seat.show_id == show_id)
            .filter_map(|seat| seat.release_if_expired(now).then_some(seat.seat_id))
            .collect();
        Box::pin(async move { Ok(released) })
    }

    fn live_holds<'a>(
        &'a mut self,
        show_id: ShowId,
        seat_ids: &'a [SeatId],
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, Vec<Ticket>> {
        let held_rows: BTreeSet<ShowSeatId> = seat_ids
            .iter()
            .filter_map(|seat_id| self.working.seats.get(&(show_id, *seat_id)))
            .filter(|seat| seat.has_active_hold(now))
            .map(|seat| seat.id)
            .collect();
        let mut tickets: Vec<Ticket> = self
            .working
            .tickets()
            .filter(|ticket| {
                ticket.state == TicketState::Held && held_rows.contains(&ticket.show_seat_id)
            })
            .cloned()
            .collect();
        tickets.sort_by_key(|ticket| ticket.seat_id);
        Box::pin(async move { Ok(tickets) })
    }

    fn void_held_tickets<'a>(
        &'a mut self,
        show_id: ShowId,
        seat_ids: &'a [SeatId],
    ) -> StoreFuture<'a, Vec<PurchaseId>> {
        let rows = self.working.show_seat_ids(show_id, seat_ids);
        let mut touched = BTreeSet::new();
        for ticket in self.working.tickets_mut() {
            if ticket.state == TicketState::Held && rows.contains(&ticket.show_seat_id) {
                ticket.state = TicketState::Void;
                touched.insert(ticket.purchase_id);
            }
        }
        Box::pin(async move { Ok(touched.into_iter().collect()) })
    }

    fn cancel_abandoned_purchases<'a>(
        &'a mut self,
        purchase_ids: &'a [PurchaseId],
    ) -> StoreFuture<'a, u64> {
        let mut cancelled = 0;
        for purchase_id in purchase_ids {
            if let Some(purchase) = self.working.purchases.get_mut(purchase_id) {
                let abandoned = purchase.state == PurchaseState::Pending
                    && !purchase.tickets.iter().any(|ticket| ticket.state.is_live());
                if abandoned {
                    purchase.state = PurchaseState::Cancelled;
                    cancelled += 1;
                }
            }
        }
        Box::pin(async move { Ok(cancelled) })
    }

    fn insert_purchase<'a>(&'a mut self, purchase: &'a Purchase) -> StoreFuture<'a, ()> {
        let result = check_insert(&self.working, purchase).map(|()| {
            let mut stored = purchase.clone();
            stored.tickets.sort_by_key(|ticket| ticket.seat_id);
            self.working.purchases.insert(stored.id, stored);
        });
        Box::pin(async move { result })
    }

    fn issue_ticket<'a>(&'a mut self, ticket_id: TicketId, code: &'a str) -> StoreFuture<'a, u64> {
        let mut changed = 0;
        if let Some(ticket) = self
            .working
            .tickets_mut()
            .find(|ticket| ticket.id == ticket_id && ticket.state == TicketState::Held)
        {
            ticket.state = TicketState::Issued;
            ticket.code = Some(code.to_string());
            changed = 1;
        }
        Box::pin(async move { Ok(changed) })
    }

    fn count_held_tickets(&mut self, purchase_id: PurchaseId) -> StoreFuture<'_, u64> {
        let held = self.working.purchases.get(&purchase_id).map_or(0, |purchase| {
            purchase
                .tickets
                .iter()
                .filter(|ticket| ticket.state == TicketState::Held)
                .count()
        });
        let held = u64::try_from(held).unwrap_or(u64::MAX);
        Box::pin(async move { Ok(held) })
    }

    fn mark_purchase_paid(
        &mut self,
        purchase_id: PurchaseId,
        method: PaymentMethod,
    ) -> StoreFuture<'_, u64> {
        let mut changed = 0;
        if let Some(purchase) = self.working.purchases.get_mut(&purchase_id) {
            if purchase.state == PurchaseState::Pending {
                purchase.state = PurchaseState::Paid;
                purchase.payment_method = method;
                changed = 1;
            }
        }
        Box::pin(async move { Ok(changed) })
    }

    fn purchase(&mut self, purchase_id: PurchaseId) -> StoreFuture<'_, Option<Purchase>> {
        let purchase = self.working.purchases.get(&purchase_id).cloned();
        Box::pin(async move { Ok(purchase) })
    }

    fn purchase_by_key<'a>(&'a mut self, key: &'a str) -> StoreFuture<'a, Option<Purchase>> {
        let purchase = self
            .working
            .purchases
            .values()
            .find(|purchase| purchase.idempotency_key.as_deref() == Some(key))
            .cloned();
        Box::pin(async move { Ok(purchase) })
    }

    fn upsert_customer<'a>(&'a mut self, customer: &'a Customer) -> StoreFuture<'a, Customer> {
        let stored = self
            .working
            .customers
            .entry((customer.provider.clone(), customer.subject.clone()))
            .and_modify(|existing| {
                if customer.email.is_some() {
                    existing.email.clone_from(&customer.email);
                }
                if customer.name.is_some() {
                    existing.name.clone_from(&customer.name);
                }
            })
            .or_insert_with(|| customer.clone())
            .clone();
        Box::pin(async move { Ok(stored) })
    }

    fn commit(self: Box<Self>) -> StoreFuture<'static, ()> {
        let Self { mut guard, working } = *self;
        *guard = working;
        Box::pin(async { Ok(()) })
    }

    fn rollback(self: Box<Self>) -> StoreFuture<'static, ()> {
        drop(self);
        Box::pin(async { Ok(()) })
    }
}

/// Enforce the unique constraints the Postgres schema declares.
fn check_insert(tables: &Tables, purchase: &Purchase) -> Result<(), StoreError> {
    if let Some(key) = &purchase.idempotency_key {
        if tables
            .purchases
            .values()
            .any(|existing| existing.idempotency_key.as_ref() == Some(key))
        {
            return Err(StoreError::DuplicateKey(format!("idempotency key {key}")));
        }
    }
    if tables.purchases.contains_key(&purchase.id) {
        return Err(StoreError::DuplicateKey(format!("purchase {}", purchase.id)));
    }
    let live_rows: BTreeSet<ShowSeatId> = tables
        .tickets()
        .filter(|ticket| ticket.state.is_live())
        .map(|ticket| ticket.show_seat_id)
        .collect();
    if let Some(ticket) = purchase
        .tickets
        .iter()
        .find(|ticket| ticket.state.is_live() && live_rows.contains(&ticket.show_seat_id))
    {
        return Err(StoreError::DuplicateKey(format!(
            "live ticket for seat {}",
            ticket.seat_id
        )));
    }
    Ok(())
}
