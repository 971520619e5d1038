//! Pool-level entry point.

use crate::rows::{cents_from_money, db_error};
use crate::transaction::PgStoreTransaction;
use boxoffice_core::error::StoreError;
use boxoffice_core::store::{StoreFuture, StoreTransaction, TicketStore};
use boxoffice_core::types::{Seat, SeatState, Show};
use sqlx::postgres::{PgPool, PgPoolOptions};

/// `PostgreSQL`-backed [`TicketStore`].
///
/// Each [`begin`](TicketStore::begin) checks a connection out of the pool and
/// opens a `READ COMMITTED` transaction on it. Seat claims rely on row locks,
/// so the default isolation level is sufficient.
#[derive(Clone)]
pub struct PostgresTicketStore {
    pool: PgPool,
}

impl PostgresTicketStore {
    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a small default pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;
        Ok(Self::from_pool(pool))
    }

    /// Apply the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert a show, its physical seats and one `AVAILABLE` inventory row per seat.
    ///
    /// Seats that already exist are reused. Used by seeding and tests;
    /// show scheduling itself lives outside the engine.
    ///
    /// # Errors
    ///
    /// - `DuplicateKey`: the show id already exists
    /// - `Database`: any other failure
    pub async fn provision_show(&self, show: &Show, seats: &[Seat]) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to begin transaction"))?;

        sqlx::query(
            r"
            INSERT INTO shows (id, room_id, starts_at, ends_at, unit_price_cents, active)
            VALUES ($1, $2, $3, $4, $5, $6)
            ",
        )
        .bind(show.id.get())
        .bind(show.room_id.get())
        .bind(show.starts_at)
        .bind(show.ends_at)
        .bind(cents_from_money(show.unit_price)?)
        .bind(show.active)
        .execute(&mut *tx)
        .await
        .map_err(db_error("Failed to insert show"))?;

        for seat in seats {
            sqlx::query(
                r"
                INSERT INTO seats (id, seat_row, seat_column, seat_type)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (id) DO NOTHING
                ",
            )
            .bind(seat.id.get())
            .bind(&seat.row)
            .bind(seat.column)
            .bind(&seat.seat_type)
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to insert seat"))?;

            sqlx::query("INSERT INTO show_seats (show_id, seat_id, state) VALUES ($1, $2, $3)")
                .bind(show.id.get())
                .bind(seat.id.get())
                .bind(SeatState::Available.as_str())
                .execute(&mut *tx)
                .await
                .map_err(db_error("Failed to insert show seat"))?;
        }

        tx.commit()
            .await
            .map_err(db_error("Failed to commit provisioning"))?;

        tracing::info!(show_id = %show.id, seats = seats.len(), "Show provisioned");
        Ok(())
    }
}

impl TicketStore for PostgresTicketStore {
    fn begin(&self) -> StoreFuture<'_, Box<dyn StoreTransaction>> {
        Box::pin(async move {
            let tx = self
                .pool
                .begin()
                .await
                .map_err(db_error("Failed to begin transaction"))?;
            metrics::counter!("boxoffice_store_transactions_total", "outcome" => "started")
                .increment(1);
            Ok(Box::new(PgStoreTransaction::new(tx)) as Box<dyn StoreTransaction>)
        })
    }

    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(db_error("Health check failed"))?;
            Ok(())
        })
    }
}
