//! Swap REST API Routes
//!
//! Browsing other users' swappable slots, proposing a swap, answering one,
//! and listing requests from either side.

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use slotswap_coordinator::{calendar, SwapCoordinator};
use slotswap_core::SwapRequestId;

use crate::error::{ApiError, ApiResult};
use crate::extractors::{ApiJson, PathId};
use crate::middleware::Caller;
use crate::state::AppState;
use crate::types::{
    ProposeSwapRequest, RespondSwapRequest, SlotsResponse, SwapRequestResponse,
    SwapRequestsResponse,
};

/// GET /api/swappable-slots - Other users' slots open for exchange
#[utoipa::path(
    get,
    path = "/api/swappable-slots",
    tag = "Swaps",
    responses(
        (status = 200, description = "Swappable slots with owners, earliest first", body = SlotsResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_swappable_slots(
    State(coordinator): State<SwapCoordinator>,
    caller: Caller,
) -> ApiResult<Json<SlotsResponse>> {
    let slots = calendar::list_swappable_slots(coordinator.store(), caller.user_id).await?;
    Ok(Json(SlotsResponse { slots }))
}

/// GET /api/swap-requests/incoming - Pending requests awaiting the caller
#[utoipa::path(
    get,
    path = "/api/swap-requests/incoming",
    tag = "Swaps",
    responses(
        (status = 200, description = "Pending incoming requests, newest first", body = SwapRequestsResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_incoming(
    State(coordinator): State<SwapCoordinator>,
    caller: Caller,
) -> ApiResult<Json<SwapRequestsResponse>> {
    let requests = coordinator.list_incoming(caller.user_id).await?;
    Ok(Json(SwapRequestsResponse { requests }))
}

/// GET /api/swap-requests/outgoing - Every request the caller made
#[utoipa::path(
    get,
    path = "/api/swap-requests/outgoing",
    tag = "Swaps",
    responses(
        (status = 200, description = "Outgoing requests in any status, newest first", body = SwapRequestsResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_outgoing(
    State(coordinator): State<SwapCoordinator>,
    caller: Caller,
) -> ApiResult<Json<SwapRequestsResponse>> {
    let requests = coordinator.list_outgoing(caller.user_id).await?;
    Ok(Json(SwapRequestsResponse { requests }))
}

/// POST /api/swap-request - Propose exchanging two swappable slots
#[utoipa::path(
    post,
    path = "/api/swap-request",
    tag = "Swaps",
    request_body = ProposeSwapRequest,
    responses(
        (status = 201, description = "Request created, both slots locked", body = SwapRequestResponse),
        (status = 400, description = "Missing ids, a slot not SWAPPABLE, or mySlot not owned by the caller", body = ApiError),
        (status = 404, description = "A slot does not exist", body = ApiError),
        (status = 409, description = "A concurrent request locked a slot first", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn propose_swap(
    State(coordinator): State<SwapCoordinator>,
    caller: Caller,
    ApiJson(req): ApiJson<ProposeSwapRequest>,
) -> ApiResult<impl IntoResponse> {
    let request = coordinator.propose(caller.user_id, req.into()).await?;
    Ok((StatusCode::CREATED, Json(SwapRequestResponse { request })))
}

/// POST /api/swap-response/{requestId} - Accept or reject a pending request
#[utoipa::path(
    post,
    path = "/api/swap-response/{requestId}",
    tag = "Swaps",
    params(
        ("requestId" = Uuid, Path, description = "Swap request ID")
    ),
    request_body = RespondSwapRequest,
    responses(
        (status = 200, description = "Request resolved", body = SwapRequestResponse),
        (status = 403, description = "Caller is not the responder", body = ApiError),
        (status = 404, description = "Request or one of its slots is gone", body = ApiError),
        (status = 409, description = "Request already resolved", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn respond_swap(
    State(coordinator): State<SwapCoordinator>,
    caller: Caller,
    PathId(request_id): PathId<SwapRequestId>,
    ApiJson(req): ApiJson<RespondSwapRequest>,
) -> ApiResult<Json<SwapRequestResponse>> {
    let request = coordinator
        .respond(caller.user_id, request_id, req.accept)
        .await?;
    Ok(Json(SwapRequestResponse { request }))
}

/// Swap routes, merged directly under `/api`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/swappable-slots", get(list_swappable_slots))
        .route("/swap-requests/incoming", get(list_incoming))
        .route("/swap-requests/outgoing", get(list_outgoing))
        .route("/swap-request", post(propose_swap))
        .route("/swap-response/:request_id", post(respond_swap))
}
