//! # API Shared
//!
//! Shared definitions for the gateway's client-facing APIs.
//!
//! Contains:
//! - Request/response DTOs (`dto` module), serialised in the camelCase shape the browser
//!   client expects and annotated for OpenAPI
//! - Shared services like `HealthService`
//!
//! Used by `api-rest` and by the operator CLI for common functionality.

pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
