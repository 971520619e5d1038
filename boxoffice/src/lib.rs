//! # Box Office
//!
//! Cinema seat inventory and purchase transaction engine.
//!
//! Buyers reserve seats (a time-limited hold under a pending purchase) or buy
//! them outright; the box office converts holds into sales. Every operation
//! runs in a single store transaction, and a seat is claimed with a
//! conditional update so that of N concurrent buyers exactly one wins.
//!
//! # Layout
//!
//! - [`engine`]: the purchase orchestrator, hold manager, idempotency ledger,
//!   pricing lookup and customer resolver
//! - [`api`]: axum handlers and their JSON bodies
//! - [`server`]: application state and router
//! - [`config`]: environment configuration
//! - [`metrics`]: Prometheus business metrics
//!
//! # Example
//!
//! ```ignore
//! let engine = PurchaseEngine::new(store, Arc::new(SystemClock), EngineConfig::default());
//! let outcome = engine
//!     .sell(SellRequest {
//!         show_id: ShowId::new(1),
//!         seat_ids: vec![SeatId::new(3)],
//!         payment_method: PaymentMethod::Cash,
//!         customer: None,
//!         idempotency_key: Some("abc".into()),
//!     })
//!     .await?;
//! assert!(!outcome.replayed);
//! ```

pub mod api;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod server;

pub use config::{Config, EngineConfig};
pub use engine::{
    Availability, ConfirmSaleRequest, ConfirmationOutcome, PurchaseEngine, PurchaseOutcome,
    ReserveRequest, SellRequest,
};
pub use server::{AppState, build_router};
