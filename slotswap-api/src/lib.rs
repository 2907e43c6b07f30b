//! SlotSwap API - REST layer over the swap coordinator
//!
//! Axum routes for the calendar and swap negotiation, JWT authentication,
//! and the two [`slotswap_storage::SlotStore`] backends the server can run on:
//! the in-process store and PostgreSQL.

mod macros;

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;
pub mod telemetry;
pub mod types;

pub use auth::{extract_token, generate_jwt_token, validate_jwt_token, AuthConfig, Claims, JwtSecret};
pub use config::{ApiConfig, StorageBackend};
pub use db::{DbConfig, PgStore};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use middleware::{auth_middleware, AuthMiddlewareState, Caller, CallerIdentity};
pub use openapi::ApiDoc;
pub use routes::create_api_router;
pub use state::AppState;
pub use types::*;
