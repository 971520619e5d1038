//! Application state for the box office HTTP server.

use crate::engine::PurchaseEngine;
use axum::extract::FromRef;
use boxoffice_core::store::TicketStore;
use std::sync::Arc;

/// State shared across all HTTP handlers; cloned per request.
#[derive(Clone)]
pub struct AppState {
    /// The purchase engine
    pub engine: Arc<PurchaseEngine>,

    /// Store handle, for readiness probes
    pub store: Arc<dyn TicketStore>,
}

impl AppState {
    /// Create the state around an engine; the store is the engine's own.
    #[must_use]
    pub fn new(engine: Arc<PurchaseEngine>) -> Self {
        let store = Arc::clone(engine.store());
        Self { engine, store }
    }
}

// Lets the shared readiness handler extract the store from AppState
impl FromRef<AppState> for Arc<dyn TicketStore> {
    fn from_ref(state: &AppState) -> Self {
        Arc::clone(&state.store)
    }
}
