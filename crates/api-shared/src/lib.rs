//! # API Shared
//!
//! Shared definitions for the MUAC APIs.
//!
//! Contains:
//! - Request and response DTOs with OpenAPI schemas (`models` module)
//! - Shared services like `HealthService`
//!
//! Used by `api-rest` and the CLI so both surfaces render the same JSON.

pub mod health;
pub mod models;

pub use health::{HealthRes, HealthService};
pub use models::*;
