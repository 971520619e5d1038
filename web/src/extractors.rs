//! Custom Axum extractors.
//!
//! - `CorrelationId`: request correlation id, from the middleware or the header
//! - `IdempotencyKey`: raw `Idempotency-Key` header, if any
//! - `CustomerHeaders`: identity asserted by the upstream auth layer
//! - `JsonBody`: `Json` whose rejections are 400 `{code, message}` bodies
//! - `PathParam`: `Path` with the same rejection format
//!
//! # Examples
//!
//! ```ignore
//! async fn reserve(
//!     correlation_id: CorrelationId,
//!     IdempotencyKey(key): IdempotencyKey,
//!     customer: CustomerHeaders,
//!     Json(body): Json<ReserveBody>,
//! ) -> Result<Json<PurchaseBody>, AppError> {
//!     tracing::info!(correlation_id = %correlation_id.0, subject = %customer.subject, "Reserving");
//!     ...
//! }
//! ```

use crate::error::AppError;
use crate::middleware::CORRELATION_ID_HEADER;
use axum::{
    Json, async_trait,
    extract::{FromRequest, FromRequestParts, Path, Request, rejection::JsonRejection},
    http::{HeaderMap, request::Parts},
};
use boxoffice_core::types::RegisteredCustomer;
use serde::de::DeserializeOwned;
use uuid::Uuid;

/// Header carrying the client's retry token.
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";
/// Identity provider of the authenticated customer.
pub const CUSTOMER_PROVIDER_HEADER: &str = "X-Customer-Provider";
/// Subject of the authenticated customer; required for reservations.
pub const CUSTOMER_SUBJECT_HEADER: &str = "X-Customer-Subject";
/// Contact email of the authenticated customer.
pub const CUSTOMER_EMAIL_HEADER: &str = "X-Customer-Email";
/// Display name of the authenticated customer.
pub const CUSTOMER_NAME_HEADER: &str = "X-Customer-Name";

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
}

/// Correlation ID for request tracing.
///
/// Reads the id stored by the correlation middleware, falling back to the
/// `X-Correlation-ID` header, or a fresh UUID v4.
#[derive(Debug, Clone, Copy)]
pub struct CorrelationId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(id) = parts.extensions.get::<Uuid>() {
            return Ok(Self(*id));
        }

        let correlation_id = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .unwrap_or_else(Uuid::new_v4);

        Ok(Self(correlation_id))
    }
}

/// The `Idempotency-Key` header, blank treated as absent. The engine normalises the rest.
#[derive(Debug, Clone, Default)]
pub struct IdempotencyKey(pub Option<String>);

impl IdempotencyKey {
    /// Prefer the header; fall back to a key carried in the body.
    #[must_use]
    pub fn or(self, body_key: Option<String>) -> Option<String> {
        self.0.or(body_key)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for IdempotencyKey
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(header(&parts.headers, IDEMPOTENCY_KEY_HEADER)))
    }
}

/// Customer identity set by the authentication layer in front of the API.
///
/// Rejects with 401 when `X-Customer-Subject` is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerHeaders {
    /// Identity provider, if the auth layer named one.
    pub provider: Option<String>,
    /// Subject within the provider.
    pub subject: String,
    /// Contact email.
    pub email: Option<String>,
    /// Display name.
    pub name: Option<String>,
}

impl CustomerHeaders {
    /// Build the registered identity, using `default_provider` when none was sent.
    #[must_use]
    pub fn into_registered(self, default_provider: &str) -> RegisteredCustomer {
        RegisteredCustomer {
            provider: self
                .provider
                .unwrap_or_else(|| default_provider.to_string()),
            subject: self.subject,
            email: self.email,
            name: self.name,
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CustomerHeaders
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let headers = &parts.headers;
        let subject = header(headers, CUSTOMER_SUBJECT_HEADER).ok_or_else(|| {
            AppError::unauthorized(format!("Missing {CUSTOMER_SUBJECT_HEADER} header"))
        })?;

        Ok(Self {
            provider: header(headers, CUSTOMER_PROVIDER_HEADER),
            subject,
            email: header(headers, CUSTOMER_EMAIL_HEADER),
            name: header(headers, CUSTOMER_NAME_HEADER),
        })
    }
}

/// JSON request body.
///
/// Any malformed, mistyped or wrongly declared body is rejected with 400 in
/// the same error format as the rest of the API.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::bad_request(rejection.body_text())),
        }
    }
}

/// Path parameters; a malformed segment is a 400 `{code, message}` body.
#[derive(Debug, Clone, Copy)]
pub struct PathParam<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for PathParam<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(Self(value)),
            Err(rejection) => Err(AppError::bad_request(rejection.body_text())),
        }
    }
}
