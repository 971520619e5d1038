//! Axum plumbing for the box office HTTP API.
//!
//! Domain handlers live in the `boxoffice` crate; this crate holds the parts
//! that do not depend on the engine:
//!
//! - [`AppError`]: maps `EngineError` onto status codes and a `{code, message}` body
//! - [`extractors`]: correlation id, `Idempotency-Key`, customer identity headers and
//!   JSON bodies rejected in the API's error format
//! - [`middleware`]: correlation tracking and request metrics
//! - [`handlers::health`]: liveness and readiness probes
//!
//! # Request Flow
//!
//! 1. **Correlation layer** assigns the request id and opens its span
//! 2. **Extractors** pull path, headers and JSON body
//! 3. **Handler** calls the purchase engine
//! 4. **`EngineError`** converts into [`AppError`] through `?`
//! 5. **Response** carries `X-Correlation-ID`

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;

pub use error::AppError;
pub use extractors::{CorrelationId, CustomerHeaders, IdempotencyKey, JsonBody, PathParam};
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
