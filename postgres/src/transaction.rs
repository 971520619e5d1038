//! [`StoreTransaction`] over a sqlx transaction.

use crate::rows::{
    CustomerRow, PurchaseRow, ShowRow, ShowSeatRow, TicketRow, cents_from_money, db_error,
};
use boxoffice_core::error::StoreError;
use boxoffice_core::inventory::{ClaimRule, ClaimedSeat, SeatTarget};
use boxoffice_core::store::{StoreFuture, StoreTransaction};
use boxoffice_core::types::{
    Customer, PaymentMethod, Purchase, PurchaseId, SeatId, SeatState, Show, ShowId, ShowSeat,
    ShowSeatId, Ticket, TicketId, TicketState,
};
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, Postgres, Transaction};
use std::collections::BTreeSet;
use uuid::Uuid;

const SELECT_TICKETS: &str = r"
    SELECT id, purchase_id, show_seat_id, seat_id, unit_price_cents, state, code
    FROM tickets
    WHERE purchase_id = $1
    ORDER BY seat_id
";

const SELECT_PURCHASE: &str = r"
    SELECT id, customer_id, show_id, total_cents, state, payment_method, idempotency_key, created_at
    FROM purchases
";

// Rows are locked in seat order so two overlapping multi-seat claims cannot deadlock.
const LOCK_SEATS: &str = r"
    SELECT id
    FROM show_seats
    WHERE show_id = $1 AND seat_id = ANY($2)
    ORDER BY seat_id
    FOR UPDATE
";

const CLAIM_RECLAIMABLE: &str = r"
    UPDATE show_seats
    SET state = $3, hold_expiry = $4
    WHERE show_id = $1
      AND seat_id = ANY($2)
      AND (state = 'AVAILABLE'
           OR (state = 'HELD' AND (hold_expiry IS NULL OR hold_expiry <= $5)))
    RETURNING id, seat_id
";

const CLAIM_ACTIVE_HOLD: &str = r"
    UPDATE show_seats
    SET state = $3, hold_expiry = $4
    WHERE show_id = $1
      AND seat_id = ANY($2)
      AND state = 'HELD'
      AND hold_expiry > $5
    RETURNING id, seat_id
";

fn raw_seat_ids(seat_ids: &[SeatId]) -> Vec<i64> {
    seat_ids.iter().map(|seat_id| seat_id.get()).collect()
}

async fn fetch_tickets(
    conn: &mut PgConnection,
    purchase_id: Uuid,
) -> Result<Vec<Ticket>, StoreError> {
    sqlx::query_as::<_, TicketRow>(SELECT_TICKETS)
        .bind(purchase_id)
        .fetch_all(conn)
        .await
        .map_err(db_error("Failed to load tickets"))?
        .into_iter()
        .map(Ticket::try_from)
        .collect()
}

async fn materialise(
    conn: &mut PgConnection,
    row: Option<PurchaseRow>,
) -> Result<Option<Purchase>, StoreError> {
    match row {
        Some(row) => {
            let tickets = fetch_tickets(conn, row.id).await?;
            row.into_purchase(tickets).map(Some)
        }
        None => Ok(None),
    }
}

/// A unit of work on the Postgres store.
///
/// Dropping it without calling `commit` rolls the transaction back.
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

impl PgStoreTransaction {
    pub(crate) const fn new(tx: Transaction<'static, Postgres>) -> Self {
        Self { tx }
    }
}

impl StoreTransaction for PgStoreTransaction {
    fn show(&mut self, show_id: ShowId) -> StoreFuture<'_, Option<Show>> {
        Box::pin(async move {
            sqlx::query_as::<_, ShowRow>(
                r"
                SELECT id, room_id, starts_at, ends_at, unit_price_cents, active
                FROM shows
                WHERE id = $1
                ",
            )
            .bind(show_id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error("Failed to load show"))?
            .map(Show::try_from)
            .transpose()
        })
    }

    fn active_shows(&mut self, now: DateTime<Utc>) -> StoreFuture<'_, Vec<ShowId>> {
        Box::pin(async move {
            let ids = sqlx::query_scalar::<_, i64>(
                "SELECT id FROM shows WHERE active AND ends_at > $1 ORDER BY starts_at",
            )
            .bind(now)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error("Failed to list active shows"))?;
            Ok(ids.into_iter().map(ShowId::new).collect())
        })
    }

    fn seat_map(&mut self, show_id: ShowId) -> StoreFuture<'_, Vec<ShowSeat>> {
        Box::pin(async move {
            sqlx::query_as::<_, ShowSeatRow>(
                r"
                SELECT ss.id, ss.show_id, ss.seat_id, s.seat_row, s.seat_column, s.seat_type,
                       ss.state, ss.hold_expiry
                FROM show_seats ss
                JOIN seats s ON s.id = ss.seat_id
                WHERE ss.show_id = $1
                ORDER BY s.seat_row, s.seat_column
                ",
            )
            .bind(show_id.get())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error("Failed to load seat map"))?
            .into_iter()
            .map(ShowSeat::try_from)
            .collect()
        })
    }

    fn claim_seats<'a>(
        &'a mut self,
        show_id: ShowId,
        seat_ids: &'a [SeatId],
        rule: ClaimRule,
        target: SeatTarget,
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, Vec<ClaimedSeat>> {
        Box::pin(async move {
            let ids = raw_seat_ids(seat_ids);

            sqlx::query(LOCK_SEATS)
                .bind(show_id.get())
                .bind(&ids)
                .fetch_all(&mut *self.tx)
                .await
                .map_err(db_error("Failed to lock seats"))?;

            let sql = match rule {
                ClaimRule::Reclaimable => CLAIM_RECLAIMABLE,
                ClaimRule::ActiveHold => CLAIM_ACTIVE_HOLD,
            };
            let claimed = sqlx::query_as::<_, (i64, i64)>(sql)
                .bind(show_id.get())
                .bind(&ids)
                .bind(target.state().as_str())
                .bind(target.hold_expiry())
                .bind(now)
                .fetch_all(&mut *self.tx)
                .await
                .map_err(db_error("Failed to claim seats"))?;

            tracing::debug!(
                show_id = %show_id,
                requested = ids.len(),
                claimed = claimed.len(),
                rule = ?rule,
                "Seat claim executed"
            );

            Ok(claimed
                .into_iter()
                .map(|(id, seat_id)| ClaimedSeat {
                    id: ShowSeatId::new(id),
                    seat_id: SeatId::new(seat_id),
                })
                .collect())
        })
    }

    fn release_expired_holds(
        &mut self,
        show_id: ShowId,
        now: DateTime<Utc>,
    ) -> StoreFuture<'_, Vec<SeatId>> {
        Box::pin(async move {
            let released = sqlx::query_scalar::<_, i64>(
                r"
                UPDATE show_seats
                SET state = $2, hold_expiry = NULL
                WHERE show_id = $1
                  AND state = 'HELD'
                  AND (hold_expiry IS NULL OR hold_expiry <= $3)
                RETURNING seat_id
                ",
            )
            .bind(show_id.get())
            .bind(SeatState::Available.as_str())
            .bind(now)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error("Failed to release expired holds"))?;
            Ok(released.into_iter().map(SeatId::new).collect())
        })
    }

    fn live_holds<'a>(
        &'a mut self,
        show_id: ShowId,
        seat_ids: &'a [SeatId],
        now: DateTime<Utc>,
    ) -> StoreFuture<'a, Vec<Ticket>> {
        Box::pin(async move {
            sqlx::query_as::<_, TicketRow>(
                r"
                SELECT t.id, t.purchase_id, t.show_seat_id, t.seat_id, t.unit_price_cents,
                       t.state, t.code
                FROM tickets t
                JOIN show_seats ss ON ss.id = t.show_seat_id
                WHERE ss.show_id = $1
                  AND ss.seat_id = ANY($2)
                  AND ss.state = 'HELD'
                  AND ss.hold_expiry > $3
                  AND t.state = 'HELD'
                ORDER BY t.seat_id
                ",
            )
            .bind(show_id.get())
            .bind(raw_seat_ids(seat_ids))
            .bind(now)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error("Failed to load live holds"))?
            .into_iter()
            .map(Ticket::try_from)
            .collect()
        })
    }

    fn void_held_tickets<'a>(
        &'a mut self,
        show_id: ShowId,
        seat_ids: &'a [SeatId],
    ) -> StoreFuture<'a, Vec<PurchaseId>> {
        Box::pin(async move {
            let touched = sqlx::query_scalar::<_, Uuid>(
                r"
                UPDATE tickets t
                SET state = $3
                FROM show_seats ss
                WHERE ss.id = t.show_seat_id
                  AND ss.show_id = $1
                  AND ss.seat_id = ANY($2)
                  AND t.state = 'HELD'
                RETURNING t.purchase_id
                ",
            )
            .bind(show_id.get())
            .bind(raw_seat_ids(seat_ids))
            .bind(TicketState::Void.as_str())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(db_error("Failed to void stale tickets"))?;

            let distinct: BTreeSet<Uuid> = touched.into_iter().collect();
            Ok(distinct.into_iter().map(PurchaseId::from_uuid).collect())
        })
    }

    fn cancel_abandoned_purchases<'a>(
        &'a mut self,
        purchase_ids: &'a [PurchaseId],
    ) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let ids: Vec<Uuid> = purchase_ids.iter().map(|id| *id.as_uuid()).collect();
            let result = sqlx::query(
                r"
                UPDATE purchases p
                SET state = 'CANCELLED'
                WHERE p.id = ANY($1)
                  AND p.state = 'PENDING'
                  AND NOT EXISTS (
                      SELECT 1 FROM tickets t
                      WHERE t.purchase_id = p.id AND t.state <> 'VOID'
                  )
                ",
            )
            .bind(ids)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error("Failed to cancel abandoned purchases"))?;
            Ok(result.rows_affected())
        })
    }

    fn insert_purchase<'a>(&'a mut self, purchase: &'a Purchase) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            // ON CONFLICT keeps the transaction usable so the caller can re-read the key.
            let inserted = sqlx::query(
                r"
                INSERT INTO purchases
                    (id, customer_id, show_id, total_cents, state, payment_method,
                     idempotency_key, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (idempotency_key) DO NOTHING
                ",
            )
            .bind(purchase.id.as_uuid())
            .bind(purchase.customer_id.as_uuid())
            .bind(purchase.show_id.get())
            .bind(cents_from_money(purchase.total)?)
            .bind(purchase.state.as_str())
            .bind(purchase.payment_method.as_str())
            .bind(purchase.idempotency_key.as_deref())
            .bind(purchase.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error("Failed to insert purchase"))?;

            if inserted.rows_affected() == 0 {
                return Err(StoreError::DuplicateKey(format!(
                    "idempotency key {}",
                    purchase.idempotency_key.as_deref().unwrap_or_default()
                )));
            }

            for ticket in &purchase.tickets {
                sqlx::query(
                    r"
                    INSERT INTO tickets
                        (id, purchase_id, show_seat_id, seat_id, unit_price_cents, state, code)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ",
                )
                .bind(ticket.id.as_uuid())
                .bind(ticket.purchase_id.as_uuid())
                .bind(ticket.show_seat_id.get())
                .bind(ticket.seat_id.get())
                .bind(cents_from_money(ticket.unit_price)?)
                .bind(ticket.state.as_str())
                .bind(ticket.code.as_deref())
                .execute(&mut *self.tx)
                .await
                .map_err(db_error("Failed to insert ticket"))?;
            }
            Ok(())
        })
    }

    fn issue_ticket<'a>(&'a mut self, ticket_id: TicketId, code: &'a str) -> StoreFuture<'a, u64> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE tickets SET state = 'ISSUED', code = $2 WHERE id = $1 AND state = 'HELD'",
            )
            .bind(ticket_id.as_uuid())
            .bind(code)
            .execute(&mut *self.tx)
            .await
            .map_err(db_error("Failed to issue ticket"))?;
            Ok(result.rows_affected())
        })
    }

    fn count_held_tickets(&mut self, purchase_id: PurchaseId) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let count = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM tickets WHERE purchase_id = $1 AND state = 'HELD'",
            )
            .bind(purchase_id.as_uuid())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_error("Failed to count held tickets"))?;
            u64::try_from(count).map_err(|_| StoreError::Corrupt(format!("Negative count: {count}")))
        })
    }

    fn mark_purchase_paid(
        &mut self,
        purchase_id: PurchaseId,
        method: PaymentMethod,
    ) -> StoreFuture<'_, u64> {
        Box::pin(async move {
            let result = sqlx::query(
                r"
                UPDATE purchases
                SET state = 'PAID', payment_method = $2
                WHERE id = $1 AND state = 'PENDING'
                ",
            )
            .bind(purchase_id.as_uuid())
            .bind(method.as_str())
            .execute(&mut *self.tx)
            .await
            .map_err(db_error("Failed to settle purchase"))?;
            Ok(result.rows_affected())
        })
    }

    fn purchase(&mut self, purchase_id: PurchaseId) -> StoreFuture<'_, Option<Purchase>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, PurchaseRow>(&format!("{SELECT_PURCHASE} WHERE id = $1"))
                .bind(purchase_id.as_uuid())
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(db_error("Failed to load purchase"))?;
            materialise(&mut self.tx, row).await
        })
    }

    fn purchase_by_key<'a>(&'a mut self, key: &'a str) -> StoreFuture<'a, Option<Purchase>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, PurchaseRow>(&format!(
                "{SELECT_PURCHASE} WHERE idempotency_key = $1"
            ))
            .bind(key)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db_error("Failed to look up idempotency key"))?;
            materialise(&mut self.tx, row).await
        })
    }

    fn upsert_customer<'a>(&'a mut self, customer: &'a Customer) -> StoreFuture<'a, Customer> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, CustomerRow>(
                r"
                INSERT INTO customers (id, provider, subject, email, name, walk_in, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (provider, subject) DO UPDATE
                SET email = COALESCE(EXCLUDED.email, customers.email),
                    name = COALESCE(EXCLUDED.name, customers.name)
                RETURNING id, provider, subject, email, name, walk_in, created_at
                ",
            )
            .bind(customer.id.as_uuid())
            .bind(&customer.provider)
            .bind(&customer.subject)
            .bind(customer.email.as_deref())
            .bind(customer.name.as_deref())
            .bind(customer.walk_in)
            .bind(customer.created_at)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db_error("Failed to upsert customer"))?;
            Ok(Customer::from(row))
        })
    }

    fn commit(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move {
            self.tx
                .commit()
                .await
                .map_err(db_error("Failed to commit transaction"))?;
            metrics::counter!("boxoffice_store_transactions_total", "outcome" => "committed")
                .increment(1);
            Ok(())
        })
    }

    fn rollback(self: Box<Self>) -> StoreFuture<'static, ()> {
        Box::pin(async move {
            self.tx
                .rollback()
                .await
                .map_err(db_error("Failed to roll back transaction"))?;
            metrics::counter!("boxoffice_store_transactions_total", "outcome" => "rolled_back")
                .increment(1);
            Ok(())
        })
    }
}
