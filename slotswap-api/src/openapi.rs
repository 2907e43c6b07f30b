//! OpenAPI Specification for the SlotSwap API
//!
//! Generated with utoipa from the route annotations and the schema derives on
//! the core and coordinator types.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::{ApiError, ErrorCode};
use crate::routes::health::{ApiHealth, ComponentHealth, HealthDetails, HealthResponse, HealthStatus};
use crate::routes::{events, health, me, swaps};
use crate::types::*;

use slotswap_coordinator::{SlotView, SwapRequestView};
use slotswap_core::{Event, EventPatch, EventStatus, SwapRequestStatus, UserBrief};

/// OpenAPI document for the SlotSwap API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "SlotSwap API",
        version = "0.1.0",
        description = "Calendar slots and the swap requests that exchange them between users",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:4000", description = "Local Development")
    ),
    tags(
        (name = "Events", description = "The caller's own calendar"),
        (name = "Swaps", description = "Swappable slots and swap negotiation"),
        (name = "Users", description = "Caller profile"),
        (name = "Health", description = "Liveness and readiness probes")
    ),
    paths(
        // === Event Routes ===
        events::list_events,
        events::create_event,
        events::update_event,
        events::delete_event,

        // === Swap Routes ===
        swaps::list_swappable_slots,
        swaps::list_incoming,
        swaps::list_outgoing,
        swaps::propose_swap,
        swaps::respond_swap,

        // === User Routes ===
        me::get_me,

        // === Health Routes ===
        health::api_health,
        health::ping,
        health::liveness,
        health::readiness,
    ),
    components(
        schemas(
            // Domain
            Event,
            EventStatus,
            EventPatch,
            SwapRequestStatus,
            UserBrief,
            SlotView,
            SwapRequestView,

            // Requests
            CreateEventRequest,
            ProposeSwapRequest,
            RespondSwapRequest,

            // Responses
            EventsResponse,
            EventResponse,
            SlotsResponse,
            SwapRequestsResponse,
            SwapRequestResponse,
            UserResponse,
            OkResponse,
            ApiHealth,
            HealthResponse,
            HealthStatus,
            HealthDetails,
            ComponentHealth,

            // Errors
            ApiError,
            ErrorCode,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT Bearer token; the `token` cookie is also accepted"))
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    /// Generate OpenAPI spec as JSON string.
    pub fn to_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&Self::openapi())
    }
}
