//! HTTP handlers shared by every deployment of the API.

pub mod health;

pub use health::{HealthResponse, health_check, readiness_check};
