//! # API Shared
//!
//! Shared definitions for the readmission dashboard's REST surface.
//!
//! Contains:
//! - Request and response types with OpenAPI schemas (`dto` module)
//! - Shared services like `HealthService`
//! - API key checking

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{validate_api_key, AuthError, API_KEY_HEADER};
pub use dto::*;
pub use health::HealthService;
