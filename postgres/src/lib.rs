//! `PostgreSQL` storage for the box office engine.
//!
//! This crate implements the `TicketStore` port from `boxoffice-core` on top of
//! sqlx. It provides:
//!
//! - Conditional seat claims as a single `UPDATE ... WHERE state ...`, preceded
//!   by a `SELECT ... FOR UPDATE` that locks the requested rows in seat order
//! - Purchase and ticket persistence with a unique idempotency key and a
//!   partial unique index allowing one live ticket per seat
//! - Schema management through `sqlx::migrate!`
//!
//! # Example
//!
//! ```ignore
//! use boxoffice_postgres::PostgresTicketStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresTicketStore::connect("postgres://localhost/boxoffice").await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod rows;
mod store;
mod transaction;

pub use store::PostgresTicketStore;
pub use transaction::PgStoreTransaction;
