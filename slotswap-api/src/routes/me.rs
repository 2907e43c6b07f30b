//! Caller profile route.

use axum::{extract::State, routing::get, Json, Router};
use slotswap_core::UserBrief;
use slotswap_storage::SlotStore;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::middleware::Caller;
use crate::state::AppState;
use crate::types::UserResponse;

/// GET /api/me - The caller as other users see them
#[utoipa::path(
    get,
    path = "/api/me",
    tag = "Users",
    responses(
        (status = 200, description = "Caller's profile", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_me(
    State(store): State<Arc<dyn SlotStore>>,
    caller: Caller,
) -> ApiResult<Json<UserResponse>> {
    let user = match store.user_get(caller.user_id).await? {
        Some(profile) => profile.brief(),
        None => UserBrief {
            id: caller.user_id,
            name: caller.name.clone(),
            email: caller.email.clone(),
        },
    };
    Ok(Json(UserResponse { user }))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/me", get(get_me))
}
