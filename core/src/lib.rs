//! # Box Office Core
//!
//! Domain types and ports for the cinema seat inventory and purchase engine.
//!
//! The crate has no I/O of its own. It defines:
//!
//! - [`types`]: identifiers, money, shows, seats, purchases, tickets and customers
//! - [`inventory`]: the per-seat state machine (`AVAILABLE`, `HELD`, `SOLD`) and the
//!   claim predicates every store must honour
//! - [`store`]: the transactional storage port (`TicketStore` / `StoreTransaction`)
//! - [`error`]: store and engine error taxonomies
//! - [`environment`]: injected dependencies such as the [`environment::Clock`]
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │    Purchase orchestration    │  boxoffice::engine
//! ├──────────────────────────────┤
//! │  TicketStore / Transaction   │  this crate (port)
//! ├──────────────┬───────────────┤
//! │   Postgres   │   In-memory   │  boxoffice-postgres / boxoffice-testing
//! └──────────────┴───────────────┘
//! ```
//!
//! All synchronization lives in the store: a claim is a single conditional
//! update over the requested seats, and the orchestrator treats any shortfall
//! as a failure of the whole transaction.

pub mod error;
pub mod inventory;
pub mod store;
pub mod types;

pub use error::{EngineError, StoreError};
pub use inventory::{ClaimRule, ClaimedSeat, SeatTarget};
pub use store::{StoreFuture, StoreTransaction, TicketStore};

/// Environment traits for dependency injection.
///
/// External dependencies the engine needs at runtime are abstracted behind
/// traits so tests can substitute deterministic implementations.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Hold expiry and reclaim decisions are all taken against this clock,
    /// never against the database server's `NOW()`.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
