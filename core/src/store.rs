//! Transactional storage port for seats, purchases, tickets and customers.
//!
//! # Design
//!
//! The engine never mutates storage outside a [`StoreTransaction`]. One
//! transaction is opened per request; every read and write of that request
//! goes through it, and the orchestrator alone decides between
//! [`StoreTransaction::commit`] and [`StoreTransaction::rollback`]. Dropping a
//! transaction without committing discards its writes, so a cancelled request
//! leaves no partial claim behind.
//!
//! # Implementations
//!
//! - `PostgresTicketStore` (in `boxoffice-postgres`): production storage
//! - `InMemoryTicketStore` (in `boxoffice-testing`): serialised in-process tables
//!
//! # Dyn Compatibility
//!
//! Methods return [`StoreFuture`] (a pinned boxed future) instead of using
//! `async fn` so the engine can hold an `Arc<dyn TicketStore>` and a
//! `Box<dyn StoreTransaction>`.

use crate::error::StoreError;
use crate::inventory::{ClaimRule, ClaimedSeat, SeatTarget};
use crate::types::{
    Customer, PaymentMethod, Purchase, PurchaseId, SeatId, Show, ShowId, ShowSeat, Ticket,
    TicketId,
};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by every store operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Entry point to the store: hands out transactions.
pub trait TicketStore: Send + Sync {
    /// Open a transaction.
    ///
    /// # Errors
    ///
    /// - `Database`: no connection could be acquired
    fn begin(&self) -> StoreFuture<'_, Box<dyn StoreTransaction>>;

    /// Cheap connectivity probe for readiness checks.
    ///
    /// # Errors
    ///
    /// - `Database`: the backing store is unreachable
    fn ping(&self) -> StoreFuture<'_, ()>;
}

/// One unit of work against the store.
///
/// Writes become visible to other transactions only after [`commit`](Self::commit).
pub trait StoreTransaction: Send {
    /// Load a show.
    fn show(&mut self, show_id: ShowId) -> StoreFuture<'_, Option<Show>>;

    /// Active shows that have not ended at `now`, soonest first.
    fn active_shows(&mut self, now: DateTime<Utc>) -> StoreFuture<'_, Vec<ShowId>>;

    /// Every inventory row of a show, ordered by row then column.
    fn seat_map(&mut self, show_id: ShowId) -> StoreFuture<'_, Vec<ShowSeat>>;

    /// Conditional claim.
    ///
    /// Atomically moves every requested seat of `show_id` that satisfies
    /// `rule` at `now` into `target`, and returns the rows that moved. The
    /// caller compares their count with `seat_ids.len()`; a shortfall means
    /// the transaction must be rolled back. Touches only inventory rows.
    fn claim_seats<'a>(
        &'a mut self,
        show_id: ShowId,
        seat_ids: &'a [SeatId],
        rule: ClaimRule,
        target: SeatTarget,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, Vec<ClaimedSeat>>;

    /// Return every hold of `show_id` that lapsed at or before `now` to
    /// `AVAILABLE`, clearing its expiry. Returns the released seats.
    fn release_expired_holds(
        &mut self,
        show_id: ShowId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, Vec<SeatId>>;

    /// Held tickets whose seat is still under an unexpired hold at `now`.
    fn live_holds<'a>(
        &'a mut self,
        show_id: ShowId,
        seat_ids: &'a [SeatId],
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, Vec<Ticket>>;

    /// Void every `HELD` ticket on the given seats. Returns the distinct
    /// purchases that lost a ticket.
    fn void_held_tickets<'a>(
        &'a mut self,
        show_id: ShowId,
        seat_ids: &'a [SeatId],
    ) -> StoreFuture<'a, Vec<PurchaseId>>;

    /// Mark as `CANCELLED` each listed `PENDING` purchase that has no live
    /// ticket left. Returns how many purchases changed.
    fn cancel_abandoned_purchases<'a>(
        &'a mut self,
        purchase_ids: &'a [PurchaseId],
    ) -> StoreFuture<'a, u64>;

    /// Insert a purchase header together with its tickets.
    ///
    /// # Errors
    ///
    /// - `DuplicateKey`: the idempotency key is already taken; the
    ///   transaction stays usable
    fn insert_purchase<'a>(&'a mut self, purchase: &'a Purchase) -> StoreFuture<'a, ()>;

    /// Flip a `HELD` ticket to `ISSUED` with `code`. Returns rows changed.
    fn issue_ticket<'a>(&'a mut self, ticket_id: TicketId, code: &'a str)
    -> StoreFuture<'a, u64>;

    /// Number of `HELD` tickets remaining on a purchase.
    fn count_held_tickets(&mut self, purchase_id: PurchaseId) -> StoreFuture<'_, u64>;

    /// Flip a `PENDING` purchase to `PAID` with `method`. Returns rows changed.
    fn mark_purchase_paid(
        &mut self,
        purchase_id: PurchaseId,
        method: PaymentMethod,
    ) -> StoreFuture<'_, u64>;

    /// Load a purchase with its tickets.
    fn purchase(&mut self, purchase_id: PurchaseId) -> StoreFuture<'_, Option<Purchase>>;

    /// Load the purchase recorded under an idempotency key.
    fn purchase_by_key<'a>(&'a mut self, key: &'a str) -> StoreFuture<'a, Option<Purchase>>;

    /// Insert the customer, or refresh email and name of the existing record
    /// with the same `(provider, subject)`. Returns the stored record.
    fn upsert_customer<'a>(&'a mut self, customer: &'a Customer) -> StoreFuture<'a, Customer>;

    /// Publish every write of this transaction.
    fn commit(self: Box<Self>) -> StoreFuture<'static, ()>;

    /// Discard every write of this transaction.
    fn rollback(self: Box<Self>) -> StoreFuture<'static, ()>;
}
