//! Swap Coordinator
//!
//! Validates proposals and responses against current state, then hands the
//! store a single [`SwapBatch`]. Every multi-record effect is guarded by
//! compare-and-swap on the statuses observed here, so a concurrent writer
//! surfaces as a retryable conflict instead of a half-applied swap.

use crate::views::{bare_request_view, request_view, request_views, SwapRequestView};
use chrono::Utc;
use slotswap_core::{
    AccessError, EntityType, Event, EventId, EventStatus, SlotSwapError, SlotSwapResult,
    StoredSwapRequest, SwapRequest, SwapRequestId, UserId, ValidationError,
};
use slotswap_storage::{SlotStore, SwapBatch};
use std::sync::Arc;
use tracing::{info, warn};

/// Ids named in a proposal. Either may be missing in the caller's input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProposeSwap {
    pub my_slot_id: Option<EventId>,
    pub their_slot_id: Option<EventId>,
}

/// Entry point for the negotiation protocol.
#[derive(Clone)]
pub struct SwapCoordinator {
    store: Arc<dyn SlotStore>,
}

impl SwapCoordinator {
    pub fn new(store: Arc<dyn SlotStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn SlotStore {
        self.store.as_ref()
    }

    async fn load_event(&self, id: EventId) -> SlotSwapResult<Event> {
        self.store
            .event_get(id)
            .await?
            .ok_or_else(|| SlotSwapError::not_found(EntityType::Event, id))
    }

    /// Offer `my_slot_id` (owned by `requester`) in exchange for `their_slot_id`.
    ///
    /// On success a `PENDING` request exists and both slots are `SWAP_PENDING`.
    /// Any failure leaves every record untouched.
    #[tracing::instrument(skip(self), err)]
    pub async fn propose(&self, requester: UserId, input: ProposeSwap) -> SlotSwapResult<SwapRequestView> {
        let my_slot_id = input.my_slot_id.ok_or_else(|| ValidationError::RequiredFieldMissing {
            field: "mySlotId".to_string(),
        })?;
        let their_slot_id = input.their_slot_id.ok_or_else(|| ValidationError::RequiredFieldMissing {
            field: "theirSlotId".to_string(),
        })?;

        let my_slot = self.load_event(my_slot_id).await?;
        if my_slot.owner_id != requester {
            return Err(ValidationError::NotSlotOwner {
                event_id: my_slot_id.into(),
            }
            .into());
        }

        let their_slot = self.load_event(their_slot_id).await?;
        if their_slot.owner_id == requester {
            return Err(ValidationError::SelfSwap {
                event_id: their_slot_id.into(),
            }
            .into());
        }

        for slot in [&my_slot, &their_slot] {
            if slot.status != EventStatus::Swappable {
                return Err(ValidationError::NotSwappable {
                    event_id: slot.event_id.into(),
                    status: slot.status,
                }
                .into());
            }
        }

        let now = Utc::now();
        let request = SwapRequest::propose(requester, their_slot.owner_id, my_slot_id, their_slot_id, now);
        let record = request.clone().into_stored();
        let batch = SwapBatch::propose(request, now);

        if let Err(err) = self.store.swap_apply(&batch).await {
            if err.is_retryable() {
                warn!(%my_slot_id, %their_slot_id, error = %err, "Swap proposal lost a race");
            }
            return Err(err);
        }

        info!(
            request_id = %record.id(),
            responder = %their_slot.owner_id,
            "Swap proposed, slots locked"
        );
        Ok(self.committed_view(record, &batch, my_slot, their_slot).await)
    }

    /// Accept or reject a pending request addressed to `responder`.
    ///
    /// Accepting exchanges the two slots' time windows, leaving titles and
    /// owners in place, and settles both as `BUSY`. Rejecting releases both
    /// back to `SWAPPABLE`. Either way the request is resolved exactly once.
    #[tracing::instrument(skip(self), err)]
    pub async fn respond(
        &self,
        responder: UserId,
        request_id: SwapRequestId,
        accept: bool,
    ) -> SlotSwapResult<SwapRequestView> {
        let stored = self
            .store
            .swap_get(request_id)
            .await?
            .ok_or_else(|| SlotSwapError::not_found(EntityType::SwapRequest, request_id))?;

        if stored.data.responder_id != responder {
            return Err(AccessError::NotResponder {
                request_id: request_id.into(),
                user_id: responder.into(),
            }
            .into());
        }

        let pending = stored.into_pending()?;
        let my_slot = self.load_event(pending.my_slot_id()).await?;
        let their_slot = self.load_event(pending.their_slot_id()).await?;

        let now = Utc::now();
        let batch = if accept {
            SwapBatch::accept(pending.accept(now), &my_slot, &their_slot, now)
        } else {
            SwapBatch::reject(pending.reject(now), now)
        };
        let record = batch.request.record().clone();

        if let Err(err) = self.store.swap_apply(&batch).await {
            if err.is_retryable() {
                warn!(%request_id, error = %err, "Swap response lost a race");
            }
            return Err(err);
        }

        info!(%request_id, status = %record.status, "Swap request resolved");
        Ok(self.committed_view(record, &batch, my_slot, their_slot).await)
    }

    /// View of a request whose batch has already committed. Enrichment
    /// failures fall back to the slots loaded before the commit, so the
    /// caller never sees an error for a swap that took effect.
    async fn committed_view(
        &self,
        record: StoredSwapRequest,
        batch: &SwapBatch,
        my_slot: Event,
        their_slot: Event,
    ) -> SwapRequestView {
        let request_id = record.id();
        match request_view(self.store.as_ref(), record.clone()).await {
            Ok(view) => view,
            Err(err) => {
                warn!(%request_id, error = %err, "Swap committed but view lookup failed");
                bare_request_view(
                    record,
                    Some(batch.committed(my_slot)),
                    Some(batch.committed(their_slot)),
                )
            }
        }
    }

    /// Pending requests awaiting `user`'s response, newest first.
    pub async fn list_incoming(&self, user: UserId) -> SlotSwapResult<Vec<SwapRequestView>> {
        let records = self.store.swap_list_incoming(user).await?;
        request_views(self.store.as_ref(), records).await
    }

    /// Every request `user` has made, in any status, newest first.
    pub async fn list_outgoing(&self, user: UserId) -> SlotSwapResult<Vec<SwapRequestView>> {
        let records = self.store.swap_list_outgoing(user).await?;
        request_views(self.store.as_ref(), records).await
    }
}

impl std::fmt::Debug for SwapCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwapCoordinator").finish_non_exhaustive()
    }
}
