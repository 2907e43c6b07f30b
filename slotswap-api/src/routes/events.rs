//! Event REST API Routes
//!
//! The caller's own calendar. Edits and deletes only reach events the caller
//! owns; an event locked in a pending swap refuses both.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use slotswap_coordinator::calendar;
use slotswap_core::{EventId, EventPatch, NewEvent};
use slotswap_storage::SlotStore;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::extractors::{ApiJson, PathId};
use crate::middleware::Caller;
use crate::state::AppState;
use crate::types::{CreateEventRequest, EventResponse, EventsResponse, OkResponse};

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/events - List the caller's events
#[utoipa::path(
    get,
    path = "/api/events",
    tag = "Events",
    responses(
        (status = 200, description = "Caller's events, earliest first", body = EventsResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_events(
    State(store): State<Arc<dyn SlotStore>>,
    caller: Caller,
) -> ApiResult<Json<EventsResponse>> {
    let events = calendar::list_my_events(store.as_ref(), caller.user_id).await?;
    Ok(Json(EventsResponse { events }))
}

/// POST /api/events - Create an event
#[utoipa::path(
    post,
    path = "/api/events",
    tag = "Events",
    request_body = CreateEventRequest,
    responses(
        (status = 201, description = "Event created", body = EventResponse),
        (status = 400, description = "Missing field or invalid time range", body = ApiError),
        (status = 401, description = "Unauthorized", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_event(
    State(store): State<Arc<dyn SlotStore>>,
    caller: Caller,
    ApiJson(req): ApiJson<CreateEventRequest>,
) -> ApiResult<impl IntoResponse> {
    let input = NewEvent::try_from(req).map_err(slotswap_core::SlotSwapError::from)?;
    let event = calendar::create_event(store.as_ref(), caller.user_id, input).await?;
    Ok((StatusCode::CREATED, Json(EventResponse { event })))
}

/// PUT /api/events/{id} - Edit an owned event
#[utoipa::path(
    put,
    path = "/api/events/{id}",
    tag = "Events",
    params(
        ("id" = Uuid, Path, description = "Event ID")
    ),
    request_body = EventPatch,
    responses(
        (status = 200, description = "Event updated", body = EventResponse),
        (status = 400, description = "Invalid time range or status", body = ApiError),
        (status = 404, description = "No such event owned by the caller", body = ApiError),
        (status = 409, description = "Event is locked in a pending swap", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_event(
    State(store): State<Arc<dyn SlotStore>>,
    caller: Caller,
    PathId(event_id): PathId<EventId>,
    ApiJson(patch): ApiJson<EventPatch>,
) -> ApiResult<Json<EventResponse>> {
    let event = calendar::update_event(store.as_ref(), caller.user_id, event_id, &patch).await?;
    Ok(Json(EventResponse { event }))
}

/// DELETE /api/events/{id} - Delete an owned event
#[utoipa::path(
    delete,
    path = "/api/events/{id}",
    tag = "Events",
    params(
        ("id" = Uuid, Path, description = "Event ID")
    ),
    responses(
        (status = 200, description = "Event deleted", body = OkResponse),
        (status = 404, description = "No such event owned by the caller", body = ApiError),
        (status = 409, description = "Event is locked in a pending swap", body = ApiError),
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_event(
    State(store): State<Arc<dyn SlotStore>>,
    caller: Caller,
    PathId(event_id): PathId<EventId>,
) -> ApiResult<Json<OkResponse>> {
    calendar::delete_event(store.as_ref(), caller.user_id, event_id).await?;
    Ok(Json(OkResponse::OK))
}

// ============================================================================
// ROUTER SETUP
// ============================================================================

/// Event routes, nested under `/api/events`.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_events).post(create_event))
        .route("/:id", axum::routing::put(update_event).delete(delete_event))
}
