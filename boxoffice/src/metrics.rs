//! Business metrics for the box office.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `boxoffice_purchases_total{operation, outcome}` - Engine calls by outcome
//!   (`created`, `replayed`, `conflict`, `rejected`, `failed`)
//! - `boxoffice_seats_sold_total` - Seats moved to SOLD
//! - `boxoffice_seats_held_total` - Seats moved to HELD
//! - `boxoffice_seat_conflicts_total{operation}` - Claims that came up short
//! - `boxoffice_idempotent_replays_total{operation}` - Requests answered from the ledger
//! - `boxoffice_holds_released_total` - Expired holds returned to inventory
//! - `boxoffice_revenue_cents_total` - Value of newly paid purchases
//! - `boxoffice_store_transactions_total{outcome}` - Store transactions (recorded by the store)
//! - `boxoffice_http_requests_total{method, status}` - HTTP requests (recorded by the middleware)
//!
//! ## Histograms
//! - `boxoffice_operation_duration_seconds{operation}` - Engine call latency
//! - `boxoffice_http_request_duration_seconds{method}` - HTTP latency

use axum::{Router, routing::get};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Outcome label of an engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// New purchase committed
    Created,
    /// Answered from the idempotency ledger
    Replayed,
    /// A seat claim came up short
    Conflict,
    /// Validation or not-found error
    Rejected,
    /// Store failure
    Failed,
}

impl Outcome {
    /// Label value.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Replayed => "replayed",
            Self::Conflict => "conflict",
            Self::Rejected => "rejected",
            Self::Failed => "failed",
        }
    }
}

/// Initialize and register all metric descriptions.
///
/// Call once at startup, after the recorder is installed.
pub fn register_business_metrics() {
    describe_counter!(
        "boxoffice_purchases_total",
        "Purchase engine calls by operation and outcome"
    );
    describe_counter!("boxoffice_seats_sold_total", "Seats moved to SOLD");
    describe_counter!("boxoffice_seats_held_total", "Seats moved to HELD");
    describe_counter!(
        "boxoffice_seat_conflicts_total",
        "Seat claims that could not claim every requested seat"
    );
    describe_counter!(
        "boxoffice_idempotent_replays_total",
        "Requests answered with a previously recorded purchase"
    );
    describe_counter!(
        "boxoffice_holds_released_total",
        "Expired holds returned to inventory"
    );
    describe_counter!(
        "boxoffice_revenue_cents_total",
        "Total value of purchases that reached PAID, in cents"
    );
    describe_counter!(
        "boxoffice_store_transactions_total",
        "Store transactions by outcome (started, committed, rolled_back)"
    );
    describe_counter!(
        "boxoffice_http_requests_total",
        "HTTP requests by method and status"
    );
    describe_histogram!(
        "boxoffice_operation_duration_seconds",
        "Time spent in a purchase engine operation"
    );
    describe_histogram!(
        "boxoffice_http_request_duration_seconds",
        "Time spent serving an HTTP request"
    );

    tracing::info!("Business metrics registered");
}

/// Install the Prometheus recorder and return its render handle.
///
/// # Errors
///
/// Returns [`MetricsError`] if the exporter cannot be built or a recorder is
/// already installed.
pub fn install_recorder() -> Result<PrometheusHandle, MetricsError> {
    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        )
        .map_err(|e| MetricsError::Build(e.to_string()))?
        .install_recorder()
        .map_err(|e| MetricsError::Install(e.to_string()))?;
    register_business_metrics();
    Ok(handle)
}

/// Router exposing `GET /metrics` in the Prometheus text format.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    )
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Record the outcome and latency of an engine call.
pub fn record_operation(operation: &'static str, outcome: Outcome, duration_secs: f64) {
    metrics::counter!(
        "boxoffice_purchases_total",
        "operation" => operation,
        "outcome" => outcome.as_str()
    )
    .increment(1);
    metrics::histogram!("boxoffice_operation_duration_seconds", "operation" => operation)
        .record(duration_secs);
    tracing::debug!(operation, outcome = outcome.as_str(), duration_secs, "Recorded operation metric");
}

/// Record seats moved to SOLD.
pub fn record_seats_sold(count: usize) {
    metrics::counter!("boxoffice_seats_sold_total").increment(as_u64(count));
}

/// Record seats moved to HELD.
pub fn record_seats_held(count: usize) {
    metrics::counter!("boxoffice_seats_held_total").increment(as_u64(count));
}

/// Record a claim shortfall.
pub fn record_conflict(operation: &'static str) {
    metrics::counter!("boxoffice_seat_conflicts_total", "operation" => operation).increment(1);
}

/// Record a request answered from the idempotency ledger.
pub fn record_replay(operation: &'static str) {
    metrics::counter!("boxoffice_idempotent_replays_total", "operation" => operation).increment(1);
}

/// Record expired holds returned to inventory.
pub fn record_holds_released(count: usize) {
    metrics::counter!("boxoffice_holds_released_total").increment(as_u64(count));
}

/// Record the value of a purchase that reached PAID.
pub fn record_revenue(amount_cents: u64) {
    metrics::counter!("boxoffice_revenue_cents_total").increment(amount_cents);
}

fn as_u64(count: usize) -> u64 {
    u64::try_from(count).unwrap_or(u64::MAX)
}
