//! Swap request typestate for compile-time safety of the negotiation lifecycle.
//!
//! # State Transition Diagram
//!
//! ```text
//! propose() → Pending ──┬── accept() ──→ Accepted (terminal)
//!                       └── reject() ──→ Rejected (terminal)
//! ```
//!
//! Only `SwapRequest<Pending>` exposes `accept`/`reject`, so a resolved
//! request cannot be resolved a second time.

use crate::{EntityIdType, EventId, StateError, SwapRequestId, Timestamp, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

// ============================================================================
// SWAP REQUEST STATUS
// ============================================================================

/// Status of a swap request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SwapRequestStatus {
    /// Waiting for the responder
    Pending,
    /// Responder accepted; time ranges were exchanged
    Accepted,
    /// Responder rejected; both slots were released
    Rejected,
}

impl SwapRequestStatus {
    /// Convert to database string representation.
    pub fn as_db_str(&self) -> &'static str {
        match self {
            SwapRequestStatus::Pending => "PENDING",
            SwapRequestStatus::Accepted => "ACCEPTED",
            SwapRequestStatus::Rejected => "REJECTED",
        }
    }

    /// Parse from database string representation.
    pub fn from_db_str(s: &str) -> Result<Self, SwapRequestStatusParseError> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(SwapRequestStatus::Pending),
            "ACCEPTED" => Ok(SwapRequestStatus::Accepted),
            "REJECTED" => Ok(SwapRequestStatus::Rejected),
            _ => Err(SwapRequestStatusParseError(s.to_string())),
        }
    }

    /// Check if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SwapRequestStatus::Pending)
    }
}

impl fmt::Display for SwapRequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

impl FromStr for SwapRequestStatus {
    type Err = SwapRequestStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_db_str(s)
    }
}

/// Error when parsing an invalid swap request status string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequestStatusParseError(pub String);

impl fmt::Display for SwapRequestStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid swap request status: {}", self.0)
    }
}

impl std::error::Error for SwapRequestStatusParseError {}

// ============================================================================
// SWAP REQUEST DATA (state-independent)
// ============================================================================

/// Persisted fields of a swap request, independent of typestate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequestData {
    #[serde(rename = "id")]
    pub swap_request_id: SwapRequestId,
    pub requester_id: UserId,
    /// Owner of `their_slot_id` at the time the request was made.
    pub responder_id: UserId,
    pub my_slot_id: EventId,
    pub their_slot_id: EventId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub responded_at: Option<Timestamp>,
}

// ============================================================================
// TYPESTATE MARKERS
// ============================================================================

/// Marker trait for swap request states.
pub trait SwapState: private::Sealed + Send + Sync {
    /// Runtime status matching this marker.
    const STATUS: SwapRequestStatus;
}

/// Waiting for the responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pending;
impl SwapState for Pending {
    const STATUS: SwapRequestStatus = SwapRequestStatus::Pending;
}

/// Accepted by the responder (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Accepted;
impl SwapState for Accepted {
    const STATUS: SwapRequestStatus = SwapRequestStatus::Accepted;
}

/// Rejected by the responder (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rejected;
impl SwapState for Rejected {
    const STATUS: SwapRequestStatus = SwapRequestStatus::Rejected;
}

mod private {
    pub trait Sealed {}
    impl Sealed for super::Pending {}
    impl Sealed for super::Accepted {}
    impl Sealed for super::Rejected {}
}

// ============================================================================
// SWAP REQUEST TYPESTATE WRAPPER
// ============================================================================

/// A swap request with compile-time state tracking.
#[derive(Debug, Clone)]
pub struct SwapRequest<S: SwapState> {
    data: SwapRequestData,
    _state: PhantomData<S>,
}

impl<S: SwapState> SwapRequest<S> {
    pub fn data(&self) -> &SwapRequestData {
        &self.data
    }

    pub fn id(&self) -> SwapRequestId {
        self.data.swap_request_id
    }

    pub fn requester_id(&self) -> UserId {
        self.data.requester_id
    }

    pub fn responder_id(&self) -> UserId {
        self.data.responder_id
    }

    pub fn my_slot_id(&self) -> EventId {
        self.data.my_slot_id
    }

    pub fn their_slot_id(&self) -> EventId {
        self.data.their_slot_id
    }

    pub fn status(&self) -> SwapRequestStatus {
        S::STATUS
    }

    /// Erase the typestate for persistence.
    pub fn into_stored(self) -> StoredSwapRequest {
        StoredSwapRequest {
            data: self.data,
            status: S::STATUS,
        }
    }
}

impl SwapRequest<Pending> {
    /// Open a new request from `requester_id` offering `my_slot_id` in
    /// exchange for `their_slot_id`, owned by `responder_id`.
    pub fn propose(
        requester_id: UserId,
        responder_id: UserId,
        my_slot_id: EventId,
        their_slot_id: EventId,
        now: Timestamp,
    ) -> Self {
        SwapRequest {
            data: SwapRequestData {
                swap_request_id: SwapRequestId::now_v7(),
                requester_id,
                responder_id,
                my_slot_id,
                their_slot_id,
                created_at: now,
                updated_at: now,
                responded_at: None,
            },
            _state: PhantomData,
        }
    }

    /// Accept the request. Consumes the pending request.
    pub fn accept(mut self, responded_at: Timestamp) -> SwapRequest<Accepted> {
        self.data.responded_at = Some(responded_at);
        self.data.updated_at = responded_at;
        SwapRequest {
            data: self.data,
            _state: PhantomData,
        }
    }

    /// Reject the request. Consumes the pending request.
    pub fn reject(mut self, responded_at: Timestamp) -> SwapRequest<Rejected> {
        self.data.responded_at = Some(responded_at);
        self.data.updated_at = responded_at;
        SwapRequest {
            data: self.data,
            _state: PhantomData,
        }
    }
}

// ============================================================================
// DATABASE BOUNDARY: STORED SWAP REQUEST
// ============================================================================

/// A swap request as stored (status-agnostic).
///
/// Use [`StoredSwapRequest::into_pending`] to recover a typed request before
/// resolving it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSwapRequest {
    pub data: SwapRequestData,
    pub status: SwapRequestStatus,
}

/// All possible runtime states of a loaded swap request.
#[derive(Debug, Clone)]
pub enum LoadedSwapRequest {
    Pending(SwapRequest<Pending>),
    Accepted(SwapRequest<Accepted>),
    Rejected(SwapRequest<Rejected>),
}

impl StoredSwapRequest {
    /// Convert to a typed request based on the stored status.
    pub fn into_typed(self) -> LoadedSwapRequest {
        match self.status {
            SwapRequestStatus::Pending => LoadedSwapRequest::Pending(SwapRequest {
                data: self.data,
                _state: PhantomData,
            }),
            SwapRequestStatus::Accepted => LoadedSwapRequest::Accepted(SwapRequest {
                data: self.data,
                _state: PhantomData,
            }),
            SwapRequestStatus::Rejected => LoadedSwapRequest::Rejected(SwapRequest {
                data: self.data,
                _state: PhantomData,
            }),
        }
    }

    /// Try to convert to a pending request.
    pub fn into_pending(self) -> Result<SwapRequest<Pending>, SwapStateError> {
        if self.status != SwapRequestStatus::Pending {
            return Err(SwapStateError::WrongState {
                request_id: self.data.swap_request_id,
                expected: SwapRequestStatus::Pending,
                actual: self.status,
            });
        }
        Ok(SwapRequest {
            data: self.data,
            _state: PhantomData,
        })
    }

    pub fn id(&self) -> SwapRequestId {
        self.data.swap_request_id
    }

    pub fn status(&self) -> SwapRequestStatus {
        self.status
    }

    /// Whether `event_id` is one of the two slots this request references.
    pub fn references(&self, event_id: EventId) -> bool {
        self.data.my_slot_id == event_id || self.data.their_slot_id == event_id
    }
}

/// Errors when transitioning swap request states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapStateError {
    /// Request is not in the expected state.
    WrongState {
        request_id: SwapRequestId,
        expected: SwapRequestStatus,
        actual: SwapRequestStatus,
    },
}

impl fmt::Display for SwapStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwapStateError::WrongState {
                request_id,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Swap request {} is in state {} but expected {}",
                    request_id, actual, expected
                )
            }
        }
    }
}

impl std::error::Error for SwapStateError {}

impl From<SwapStateError> for StateError {
    fn from(err: SwapStateError) -> Self {
        match err {
            SwapStateError::WrongState {
                request_id, actual, ..
            } => StateError::RequestAlreadyResolved {
                request_id: request_id.as_uuid(),
                status: actual,
            },
        }
    }
}

impl From<SwapStateError> for crate::SlotSwapError {
    fn from(err: SwapStateError) -> Self {
        crate::SlotSwapError::State(err.into())
    }
}
