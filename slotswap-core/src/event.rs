//! Calendar events and the slot status state machine.
//!
//! # Event Status Transitions
//!
//! ```text
//!            owner              propose()               accept()
//!   BUSY ◄─────────► SWAPPABLE ──────────► SWAP_PENDING ────────► BUSY
//!                        ▲                      │
//!                        └──────────────────────┘
//!                                reject()
//! ```
//!
//! Owners may only toggle `BUSY ⇄ SWAPPABLE`. Everything touching
//! `SWAP_PENDING` goes through [`EventStatus::apply`], which is reserved for
//! the swap coordinator.

use crate::{
    EntityIdType, EventId, SlotSwapResult, StateError, Timestamp, UserId, ValidationError,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// EVENT STATUS
// ============================================================================

/// Availability status of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    /// Occupied and not offered for exchange
    Busy,
    /// Offered for exchange
    Swappable,
    /// Locked by an outstanding swap request
    SwapPending,
}

/// A coordinator-driven transition of an event's status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SlotTransition {
    /// `SWAPPABLE → SWAP_PENDING` when a proposal is created.
    Lock,
    /// `SWAP_PENDING → SWAPPABLE` when a proposal is rejected.
    Release,
    /// `SWAP_PENDING → BUSY` when a proposal is accepted.
    Settle,
}

impl SlotTransition {
    /// Status the event must be in for this transition to apply.
    pub fn expected_status(&self) -> EventStatus {
        match self {
            SlotTransition::Lock => EventStatus::Swappable,
            SlotTransition::Release | SlotTransition::Settle => EventStatus::SwapPending,
        }
    }

    /// Status the event ends up in.
    pub fn target_status(&self) -> EventStatus {
        match self {
            SlotTransition::Lock => EventStatus::SwapPending,
            SlotTransition::Release => EventStatus::Swappable,
            SlotTransition::Settle => EventStatus::Busy,
        }
    }
}

impl fmt::Display for SlotTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SlotTransition::Lock => "lock",
            SlotTransition::Release => "release",
            SlotTransition::Settle => "settle",
        };
        f.write_str(name)
    }
}

impl EventStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            EventStatus::Busy => "BUSY",
            EventStatus::Swappable => "SWAPPABLE",
            EventStatus::SwapPending => "SWAP_PENDING",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, EventStatusParseError> {
        match s.to_uppercase().as_str() {
            "BUSY" => Ok(EventStatus::Busy),
            "SWAPPABLE" => Ok(EventStatus::Swappable),
            "SWAP_PENDING" | "SWAPPENDING" => Ok(EventStatus::SwapPending),
            _ => Err(EventStatusParseError(s.to_string())),
        }
    }

    /// Whether the event is currently reserved by a pending swap.
    pub fn is_locked(&self) -> bool {
        matches!(self, EventStatus::SwapPending)
    }

    /// Validate a status change requested directly by the owner.
    ///
    /// Only `BUSY ⇄ SWAPPABLE` (and no-op changes outside the lock) are
    /// permitted; `SWAP_PENDING` can neither be entered nor left this way.
    pub fn owner_change(self, to: EventStatus) -> Result<EventStatus, ValidationError> {
        match (self, to) {
            (EventStatus::Busy | EventStatus::Swappable, EventStatus::Busy | EventStatus::Swappable) => {
                Ok(to)
            }
            (from, to) => Err(ValidationError::IllegalStatusChange { from, to }),
        }
    }

    /// Apply a coordinator transition.
    ///
    /// Returns `None` when the transition is not legal from the current status.
    pub fn apply(self, transition: SlotTransition) -> Option<EventStatus> {
        if self == transition.expected_status() {
            Some(transition.target_status())
        } else {
            None
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for EventStatus {
    type Err = EventStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid event status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventStatusParseError(pub String);

impl fmt::Display for EventStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid event status: {}", self.0)
    }
}

impl std::error::Error for EventStatusParseError {}

// ============================================================================
// TIME RANGE
// ============================================================================

/// A validated half-open time window: the tradable unit in a swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    start: Timestamp,
    end: Timestamp,
}

impl TimeRange {
    /// Create a range, rejecting `end <= start`.
    pub fn new(start: Timestamp, end: Timestamp) -> Result<Self, ValidationError> {
        if end <= start {
            return Err(ValidationError::InvalidTimeRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Timestamp {
        self.start
    }

    pub fn end(&self) -> Timestamp {
        self.end
    }
}

/// Trim and check a title.
pub fn validate_title(title: &str) -> Result<String, ValidationError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::RequiredFieldMissing {
            field: "title".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

// ============================================================================
// EVENT
// ============================================================================

/// A calendar event owned by exactly one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(rename = "id")]
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub event_id: EventId,
    pub title: String,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub start_time: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub end_time: Timestamp,
    pub status: EventStatus,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub owner_id: UserId,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
}

/// Owner input for creating an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub title: String,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    /// Initial status; `BUSY` when absent.
    pub status: Option<EventStatus>,
}

/// Partial update requested by an event's owner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct EventPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub start_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub end_time: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EventStatus>,
}

impl EventPatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.start_time.is_none()
            && self.end_time.is_none()
            && self.status.is_none()
    }
}

impl Event {
    /// Build a new event for `owner` from validated owner input.
    pub fn create(owner_id: UserId, input: NewEvent, now: Timestamp) -> Result<Self, ValidationError> {
        let title = validate_title(&input.title)?;
        let range = TimeRange::new(input.start_time, input.end_time)?;
        let status = EventStatus::Busy.owner_change(input.status.unwrap_or(EventStatus::Busy))?;

        Ok(Self {
            event_id: EventId::now_v7(),
            title,
            start_time: range.start(),
            end_time: range.end(),
            status,
            owner_id,
            created_at: now,
            updated_at: now,
        })
    }

    /// Current time window.
    pub fn time_range(&self) -> TimeRange {
        TimeRange {
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// Replace the time window, leaving title and owner untouched.
    pub fn set_time_range(&mut self, range: TimeRange) {
        self.start_time = range.start();
        self.end_time = range.end();
    }

    /// Apply an owner edit.
    ///
    /// Locked events reject every edit. The merged result is validated as a
    /// whole before anything is written, so a failed patch leaves the event
    /// unchanged.
    pub fn apply_owner_patch(&mut self, patch: &EventPatch, now: Timestamp) -> SlotSwapResult<()> {
        if self.status.is_locked() {
            return Err(StateError::EventLocked {
                event_id: self.event_id.as_uuid(),
            }
            .into());
        }

        let title = match &patch.title {
            Some(title) => validate_title(title)?,
            None => self.title.clone(),
        };
        let range = TimeRange::new(
            patch.start_time.unwrap_or(self.start_time),
            patch.end_time.unwrap_or(self.end_time),
        )?;
        let status = match patch.status {
            Some(status) => self.status.owner_change(status)?,
            None => self.status,
        };

        self.title = title;
        self.set_time_range(range);
        self.status = status;
        self.updated_at = now;
        Ok(())
    }

    /// Apply a coordinator transition, failing if the event is not in the
    /// transition's expected status.
    pub fn apply_transition(&mut self, transition: SlotTransition, now: Timestamp) -> Result<(), StateError> {
        let next = self
            .status
            .apply(transition)
            .ok_or_else(|| StateError::IllegalTransition {
                event_id: self.event_id.as_uuid(),
                status: self.status,
                transition: transition.to_string(),
            })?;
        self.status = next;
        self.updated_at = now;
        Ok(())
    }
}
