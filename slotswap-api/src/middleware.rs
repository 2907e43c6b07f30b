//! Axum Middleware for Authentication
//!
//! - Validates the caller's token (bearer header or `token` cookie)
//! - Refreshes the caller's display profile in the user directory
//! - Injects [`CallerIdentity`] into request extensions
//! - Returns 401 for unauthenticated requests

use crate::auth::{extract_token, validate_jwt_token, AuthConfig};
use crate::error::ApiError;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use slotswap_core::{UserId, UserProfile};
use slotswap_storage::SlotStore;
use std::sync::Arc;

// ============================================================================
// CALLER IDENTITY
// ============================================================================

/// The authenticated user a request acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub user_id: UserId,
    pub name: String,
    pub email: String,
}

// ============================================================================
// MIDDLEWARE STATE
// ============================================================================

/// Shared state for the authentication middleware.
#[derive(Clone)]
pub struct AuthMiddlewareState {
    pub auth_config: Arc<AuthConfig>,
    pub store: Arc<dyn SlotStore>,
}

impl AuthMiddlewareState {
    pub fn new(auth_config: AuthConfig, store: Arc<dyn SlotStore>) -> Self {
        Self {
            auth_config: Arc::new(auth_config),
            store,
        }
    }
}

impl std::fmt::Debug for AuthMiddlewareState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthMiddlewareState")
            .field("auth_config", &self.auth_config)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// MIDDLEWARE FUNCTION
// ============================================================================

/// Authenticate the request and attach a [`CallerIdentity`].
///
/// ```ignore
/// let app = Router::new()
///     .route("/api/events", get(list_events))
///     .layer(middleware::from_fn_with_state(auth_state, auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<AuthMiddlewareState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthMiddlewareError> {
    let token = extract_token(request.headers()).ok_or_else(|| {
        AuthMiddlewareError(ApiError::unauthorized(
            "Authentication required: provide a Bearer token or token cookie",
        ))
    })?;

    let claims = validate_jwt_token(&state.auth_config, &token).map_err(AuthMiddlewareError)?;
    let user_id = claims.user_id().map_err(AuthMiddlewareError)?;

    // Profiles are display-only; a token without an email still authenticates.
    match UserProfile::new(user_id, &claims.name, &claims.email, Utc::now()) {
        Ok(profile) => {
            if let Err(err) = state.store.user_upsert(&profile).await {
                tracing::warn!(%user_id, error = %err, "Failed to refresh user profile");
            }
        }
        Err(err) => tracing::debug!(%user_id, error = %err, "Token carries no usable profile"),
    }

    request.extensions_mut().insert(CallerIdentity {
        user_id,
        name: claims.name,
        email: claims.email,
    });

    Ok(next.run(request).await)
}

// ============================================================================
// ERROR HANDLING
// ============================================================================

/// Error wrapper for middleware that implements IntoResponse.
#[derive(Debug)]
pub struct AuthMiddlewareError(pub ApiError);

impl IntoResponse for AuthMiddlewareError {
    fn into_response(self) -> Response {
        self.0.into_response()
    }
}

// ============================================================================
// TYPED EXTRACTOR
// ============================================================================

/// Typed extractor for the authenticated caller.
///
/// Requires `auth_middleware` on the route; without it every request fails
/// with 500.
#[derive(Debug, Clone)]
pub struct Caller(pub CallerIdentity);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AuthMiddlewareError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .map(Caller)
            .ok_or_else(|| {
                AuthMiddlewareError(ApiError::internal_error(
                    "CallerIdentity not found in request extensions. \
                     Ensure auth_middleware is applied to this route.",
                ))
            })
    }
}

impl std::ops::Deref for Caller {
    type Target = CallerIdentity;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

// ============================================================================
// TESTS
// ============================================================================
