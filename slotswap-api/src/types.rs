//! Request and response bodies for the REST surface.
//!
//! Every response wraps its payload in a named field (`{ "events": [...] }`,
//! `{ "request": {...} }`) so clients can grow responses without breaking.

use serde::{Deserialize, Serialize};
use slotswap_coordinator::{ProposeSwap, SlotView, SwapRequestView};
use slotswap_core::{Event, EventId, EventStatus, NewEvent, Timestamp, UserBrief, ValidationError};

// ============================================================================
// REQUESTS
// ============================================================================

/// Body of `POST /api/events`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub start_time: Option<Timestamp>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub end_time: Option<Timestamp>,
    /// `BUSY` when absent.
    #[serde(default)]
    pub status: Option<EventStatus>,
}

impl TryFrom<CreateEventRequest> for NewEvent {
    type Error = ValidationError;

    fn try_from(req: CreateEventRequest) -> Result<Self, Self::Error> {
        let missing = |field: &str| ValidationError::RequiredFieldMissing {
            field: field.to_string(),
        };
        Ok(NewEvent {
            title: req.title.ok_or_else(|| missing("title"))?,
            start_time: req.start_time.ok_or_else(|| missing("startTime"))?,
            end_time: req.end_time.ok_or_else(|| missing("endTime"))?,
            status: req.status,
        })
    }
}

/// Body of `POST /api/swap-request`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct ProposeSwapRequest {
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub my_slot_id: Option<EventId>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "uuid"))]
    pub their_slot_id: Option<EventId>,
}

impl From<ProposeSwapRequest> for ProposeSwap {
    fn from(req: ProposeSwapRequest) -> Self {
        ProposeSwap {
            my_slot_id: req.my_slot_id,
            their_slot_id: req.their_slot_id,
        }
    }
}

/// Body of `POST /api/swap-response/{requestId}`. A missing `accept` rejects.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct RespondSwapRequest {
    #[serde(default)]
    pub accept: bool,
}

// ============================================================================
// RESPONSES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EventsResponse {
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct EventResponse {
    pub event: Event,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SlotsResponse {
    pub slots: Vec<SlotView>,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SwapRequestsResponse {
    pub requests: Vec<SwapRequestView>,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SwapRequestResponse {
    pub request: SwapRequestView,
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UserResponse {
    pub user: UserBrief,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub const OK: OkResponse = OkResponse { ok: true };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_reports_first_missing_field() -> Result<(), serde_json::Error> {
        let req: CreateEventRequest = serde_json::from_str(r#"{"title":"Standup"}"#)?;
        let err = NewEvent::try_from(req).err();
        assert_eq!(
            err,
            Some(ValidationError::RequiredFieldMissing {
                field: "startTime".to_string()
            })
        );
        Ok(())
    }

    #[test]
    fn test_create_request_reads_camel_case() -> Result<(), serde_json::Error> {
        let req: CreateEventRequest = serde_json::from_str(
            r#"{"title":"Standup","startTime":"2025-03-14T09:00:00Z","endTime":"2025-03-14T10:00:00Z","status":"SWAPPABLE"}"#,
        )?;
        let new_event = NewEvent::try_from(req);
        assert!(matches!(
            new_event,
            Ok(NewEvent {
                status: Some(EventStatus::Swappable),
                ..
            })
        ));
        Ok(())
    }

    #[test]
    fn test_respond_defaults_to_reject() -> Result<(), serde_json::Error> {
        let req: RespondSwapRequest = serde_json::from_str("{}")?;
        assert!(!req.accept);
        Ok(())
    }

    #[test]
    fn test_propose_rejects_malformed_ids() {
        let parsed: Result<ProposeSwapRequest, _> =
            serde_json::from_str(r#"{"mySlotId":"64f0c2a1e4b0","theirSlotId":null}"#);
        assert!(parsed.is_err());
    }
}
