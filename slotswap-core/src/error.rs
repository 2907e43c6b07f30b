//! Error types for SlotSwap operations

use crate::{EntityType, EventStatus, SwapRequestStatus, Timestamp};
use thiserror::Error;
use uuid::Uuid;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Entity not found: {entity_type:?} with id {id}")]
    NotFound { entity_type: EntityType, id: Uuid },

    #[error("Insert failed for {entity_type:?}: {reason}")]
    InsertFailed { entity_type: EntityType, reason: String },

    /// A compare-and-swap guard did not hold, or the backend aborted the
    /// transaction because of a concurrent writer.
    #[error("Write conflict on {entity_type:?} with id {id}: {reason}")]
    Conflict {
        entity_type: EntityType,
        id: Uuid,
        reason: String,
    },

    #[error("Storage backend error: {reason}")]
    Backend { reason: String },
}

/// Validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid time range: end {end} must be after start {start}")]
    InvalidTimeRange { start: Timestamp, end: Timestamp },

    #[error("Event {event_id} is not owned by the requester")]
    NotSlotOwner { event_id: Uuid },

    #[error("Cannot request your own slot {event_id}")]
    SelfSwap { event_id: Uuid },

    #[error("Event {event_id} is {status}, both slots must be SWAPPABLE")]
    NotSwappable { event_id: Uuid, status: EventStatus },

    #[error("Status change from {from} to {to} is not allowed")]
    IllegalStatusChange { from: EventStatus, to: EventStatus },
}

/// Authorization errors for an authenticated caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("User {user_id} is not authorized to respond to swap request {request_id}")]
    NotResponder { request_id: Uuid, user_id: Uuid },
}

/// Errors raised when an operation conflicts with the current lifecycle state.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("Event {event_id} is locked by a pending swap request")]
    EventLocked { event_id: Uuid },

    #[error("Swap request {request_id} was already {status}")]
    RequestAlreadyResolved {
        request_id: Uuid,
        status: SwapRequestStatus,
    },

    #[error("Illegal {transition} transition for event {event_id} in status {status}")]
    IllegalTransition {
        event_id: Uuid,
        status: EventStatus,
        transition: String,
    },
}

/// Coarse classification used at the API edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Forbidden,
    Conflict,
    Internal,
}

/// Master error type for all SlotSwap errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SlotSwapError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Access error: {0}")]
    Access(#[from] AccessError),

    #[error("State error: {0}")]
    State(#[from] StateError),
}

impl SlotSwapError {
    /// Shorthand for a not-found storage error.
    pub fn not_found(entity_type: EntityType, id: impl Into<Uuid>) -> Self {
        SlotSwapError::Storage(StorageError::NotFound {
            entity_type,
            id: id.into(),
        })
    }

    /// Classify the error into the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            SlotSwapError::Validation(_) => ErrorKind::Validation,
            SlotSwapError::Access(_) => ErrorKind::Forbidden,
            SlotSwapError::State(_) => ErrorKind::Conflict,
            SlotSwapError::Storage(StorageError::NotFound { .. }) => ErrorKind::NotFound,
            SlotSwapError::Storage(StorageError::Conflict { .. }) => ErrorKind::Conflict,
            SlotSwapError::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Whether the caller may retry the same operation unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SlotSwapError::Storage(StorageError::Conflict { .. }))
    }
}

/// Result type alias for SlotSwap operations.
pub type SlotSwapResult<T> = Result<T, SlotSwapError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_display_not_found() {
        let err = StorageError::NotFound {
            entity_type: EntityType::Event,
            id: Uuid::nil(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Entity not found"));
        assert!(msg.contains("Event"));
        assert!(msg.contains("00000000-0000-0000-0000-000000000000"));
    }

    #[test]
    fn test_validation_error_display_not_swappable() {
        let err = ValidationError::NotSwappable {
            event_id: Uuid::nil(),
            status: EventStatus::Busy,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("BUSY"));
        assert!(msg.contains("SWAPPABLE"));
    }

    #[test]
    fn test_state_error_display_already_resolved() {
        let err = StateError::RequestAlreadyResolved {
            request_id: Uuid::nil(),
            status: SwapRequestStatus::Accepted,
        };
        assert!(format!("{}", err).contains("ACCEPTED"));
    }

    #[test]
    fn test_error_kind_classification() {
        let validation = SlotSwapError::from(ValidationError::RequiredFieldMissing {
            field: "mySlotId".to_string(),
        });
        assert_eq!(validation.kind(), ErrorKind::Validation);

        let not_found = SlotSwapError::not_found(EntityType::Event, Uuid::nil());
        assert_eq!(not_found.kind(), ErrorKind::NotFound);

        let forbidden = SlotSwapError::from(AccessError::NotResponder {
            request_id: Uuid::nil(),
            user_id: Uuid::nil(),
        });
        assert_eq!(forbidden.kind(), ErrorKind::Forbidden);

        let locked = SlotSwapError::from(StateError::EventLocked {
            event_id: Uuid::nil(),
        });
        assert_eq!(locked.kind(), ErrorKind::Conflict);

        let backend = SlotSwapError::from(StorageError::Backend {
            reason: "connection reset".to_string(),
        });
        assert_eq!(backend.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_only_storage_conflicts_are_retryable() {
        let conflict = SlotSwapError::from(StorageError::Conflict {
            entity_type: EntityType::Event,
            id: Uuid::nil(),
            reason: "status changed".to_string(),
        });
        assert!(conflict.is_retryable());
        assert_eq!(conflict.kind(), ErrorKind::Conflict);

        let locked = SlotSwapError::from(StateError::EventLocked {
            event_id: Uuid::nil(),
        });
        assert!(!locked.is_retryable());
    }
}
