//! SlotSwap Storage - Event Store, Swap Ledger and user directory
//!
//! Every backend implements [`SlotStore`]. Multi-record writes performed by
//! the swap coordinator go through [`SlotStore::swap_apply`] as a single
//! [`SwapBatch`], which the backend must apply atomically: either every
//! guard holds and every write lands, or nothing changes.

mod batch;
mod memory;

pub use batch::{EventWrite, RequestWrite, SwapBatch};
pub use memory::InMemoryStore;

use async_trait::async_trait;
use slotswap_core::{
    Event, EventId, EventPatch, SlotSwapResult, StoredSwapRequest, SwapRequestId, UserId,
    UserProfile,
};

/// Async storage trait for calendar events, swap requests and user profiles.
#[async_trait]
pub trait SlotStore: Send + Sync {
    // ========================================================================
    // EVENT OPERATIONS
    // ========================================================================

    /// Insert a new, already validated event.
    async fn event_insert(&self, event: &Event) -> SlotSwapResult<()>;

    /// Get an event by ID.
    async fn event_get(&self, id: EventId) -> SlotSwapResult<Option<Event>>;

    /// Batch lookup. Missing ids are skipped; order is unspecified.
    async fn events_get_many(&self, ids: &[EventId]) -> SlotSwapResult<Vec<Event>>;

    /// Apply an owner edit in one atomic step.
    ///
    /// Fails with NotFound when `id` does not exist or is not owned by
    /// `owner`, and with a state conflict when the event is `SWAP_PENDING`.
    async fn event_update_owned(
        &self,
        id: EventId,
        owner: UserId,
        patch: &EventPatch,
    ) -> SlotSwapResult<Event>;

    /// Delete an event on behalf of its owner. Same failure rules as
    /// [`SlotStore::event_update_owned`].
    async fn event_delete_owned(&self, id: EventId, owner: UserId) -> SlotSwapResult<()>;

    /// All events owned by `owner`, ordered by start time ascending.
    async fn event_list_by_owner(&self, owner: UserId) -> SlotSwapResult<Vec<Event>>;

    /// `SWAPPABLE` events not owned by `exclude_owner`, ordered by start time
    /// ascending.
    async fn event_list_swappable(&self, exclude_owner: UserId) -> SlotSwapResult<Vec<Event>>;

    // ========================================================================
    // SWAP LEDGER OPERATIONS
    // ========================================================================

    /// Get a swap request by ID.
    async fn swap_get(&self, id: SwapRequestId) -> SlotSwapResult<Option<StoredSwapRequest>>;

    /// `PENDING` requests addressed to `user`, newest first.
    async fn swap_list_incoming(&self, user: UserId) -> SlotSwapResult<Vec<StoredSwapRequest>>;

    /// Requests of any status made by `user`, newest first.
    async fn swap_list_outgoing(&self, user: UserId) -> SlotSwapResult<Vec<StoredSwapRequest>>;

    /// Apply a guarded multi-record write atomically.
    ///
    /// A failed guard surfaces as `StorageError::Conflict` and leaves every
    /// record untouched.
    async fn swap_apply(&self, batch: &SwapBatch) -> SlotSwapResult<()>;

    // ========================================================================
    // USER DIRECTORY
    // ========================================================================

    /// Insert or refresh a user's display profile.
    async fn user_upsert(&self, profile: &UserProfile) -> SlotSwapResult<()>;

    /// Get a user's profile.
    async fn user_get(&self, id: UserId) -> SlotSwapResult<Option<UserProfile>>;

    /// Batch lookup for read-time joins. Missing ids are skipped.
    async fn users_get_many(&self, ids: &[UserId]) -> SlotSwapResult<Vec<UserProfile>>;

    // ========================================================================
    // HEALTH
    // ========================================================================

    /// Round trip to the backend.
    async fn ping(&self) -> SlotSwapResult<()>;
}
