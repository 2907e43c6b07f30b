//! REST API Routes Module
//!
//! - Calendar routes under /api/events
//! - Swap negotiation routes under /api
//! - Health checks at /api/health and /health/* (public)
//! - OpenAPI spec at /openapi.json (public)
//! - CORS support for the browser client

pub mod events;
pub mod health;
pub mod me;
pub mod swaps;

use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::time::Duration;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::auth::AuthConfig;
use crate::config::ApiConfig;
use crate::error::{ApiError, ApiResult};
use crate::middleware::{auth_middleware, AuthMiddlewareState};
use crate::openapi::ApiDoc;
use crate::state::AppState;

// ============================================================================
// OPENAPI ENDPOINT
// ============================================================================

async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ============================================================================
// PRODUCTION VALIDATION
// ============================================================================

fn is_production_environment() -> bool {
    std::env::var("SLOTSWAP_ENVIRONMENT")
        .map(|e| matches!(e.to_lowercase().as_str(), "production" | "prod"))
        .unwrap_or(false)
}

fn validate_api_config_for_production(config: &ApiConfig) -> ApiResult<()> {
    if config.cors_origins.is_empty() {
        return Err(ApiError::invalid_input(
            "CORS origins not configured for production. Set SLOTSWAP_CORS_ORIGINS.",
        ));
    }
    Ok(())
}

// ============================================================================
// ROUTER
// ============================================================================

/// Build the complete application router.
///
/// Layer order, outermost first: CORS, tracing, concurrency limit, body
/// limit, then auth on the protected `/api` routes only.
///
/// In production (`SLOTSWAP_ENVIRONMENT=production`) refuses to start with
/// the default JWT secret or without configured CORS origins.
pub fn create_api_router(
    state: AppState,
    api_config: &ApiConfig,
    auth_config: AuthConfig,
) -> ApiResult<Router> {
    if is_production_environment() {
        auth_config.validate_for_production()?;
        validate_api_config_for_production(api_config)?;
    }

    let auth_state = AuthMiddlewareState::new(auth_config, state.store.clone());

    let protected = Router::new()
        .nest("/events", events::create_router())
        .merge(swaps::create_router())
        .merge(me::create_router())
        .layer(from_fn_with_state(auth_state, auth_middleware));

    let api = Router::new()
        .route("/health", get(health::api_health))
        .merge(protected);

    let router = Router::new()
        .nest("/api", api)
        .nest("/health", health::create_router())
        .route("/openapi.json", get(openapi_json))
        .with_state(state);

    Ok(router
        .layer(DefaultBodyLimit::max(api_config.max_body_bytes))
        .layer(GlobalConcurrencyLimitLayer::new(api_config.max_concurrent_requests))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(api_config)))
}

// ============================================================================
// CORS LAYER
// ============================================================================

/// Empty origins allow any origin; otherwise only the configured ones.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any)
    } else {
        tracing::info!(origins = ?config.cors_origins, "CORS: Restricting origins");
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_requires_cors_origins() {
        let config = ApiConfig::default();
        assert!(validate_api_config_for_production(&config).is_err());

        let config = ApiConfig {
            cors_origins: vec!["https://slotswap.example".to_string()],
            ..ApiConfig::default()
        };
        assert!(validate_api_config_for_production(&config).is_ok());
    }
}
