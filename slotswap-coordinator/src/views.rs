//! Read-time joins for listings.
//!
//! Requests store only ids. Views resolve them against the current events and
//! the user directory at read time, so a listing always shows each slot's
//! present state. A slot whose event no longer exists renders as `null`.

use serde::Serialize;
use slotswap_core::{
    Event, EventId, SlotSwapResult, StoredSwapRequest, SwapRequestId, SwapRequestStatus,
    Timestamp, UserBrief, UserId,
};
use slotswap_storage::SlotStore;
use std::collections::HashMap;

/// A swappable slot together with its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SlotView {
    #[serde(flatten)]
    pub event: Event,
    pub owner: UserBrief,
}

/// A swap request with both parties and both slots resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct SwapRequestView {
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "uuid"))]
    pub id: SwapRequestId,
    pub requester: UserBrief,
    pub responder: UserBrief,
    pub my_slot: Option<Event>,
    pub their_slot: Option<Event>,
    pub status: SwapRequestStatus,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub created_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = String, format = "date-time"))]
    pub updated_at: Timestamp,
    #[cfg_attr(feature = "openapi", schema(value_type = Option<String>, format = "date-time"))]
    pub responded_at: Option<Timestamp>,
}

async fn user_briefs(store: &dyn SlotStore, ids: Vec<UserId>) -> SlotSwapResult<HashMap<UserId, UserBrief>> {
    let mut ids = ids;
    ids.sort();
    ids.dedup();
    Ok(store
        .users_get_many(&ids)
        .await?
        .into_iter()
        .map(|profile| (profile.user_id, profile.brief()))
        .collect())
}

fn brief_for(briefs: &HashMap<UserId, UserBrief>, id: UserId) -> UserBrief {
    briefs.get(&id).cloned().unwrap_or_else(|| UserBrief::unknown(id))
}

/// Attach owner details to each event, preserving order.
pub async fn slot_views(store: &dyn SlotStore, events: Vec<Event>) -> SlotSwapResult<Vec<SlotView>> {
    let briefs = user_briefs(store, events.iter().map(|e| e.owner_id).collect()).await?;
    Ok(events
        .into_iter()
        .map(|event| {
            let owner = brief_for(&briefs, event.owner_id);
            SlotView { event, owner }
        })
        .collect())
}

/// Resolve parties and slots for each request, preserving order.
pub async fn request_views(
    store: &dyn SlotStore,
    records: Vec<StoredSwapRequest>,
) -> SlotSwapResult<Vec<SwapRequestView>> {
    let user_ids = records
        .iter()
        .flat_map(|r| [r.data.requester_id, r.data.responder_id])
        .collect();
    let briefs = user_briefs(store, user_ids).await?;

    let mut event_ids: Vec<EventId> = records
        .iter()
        .flat_map(|r| [r.data.my_slot_id, r.data.their_slot_id])
        .collect();
    event_ids.sort();
    event_ids.dedup();
    let events: HashMap<EventId, Event> = store
        .events_get_many(&event_ids)
        .await?
        .into_iter()
        .map(|event| (event.event_id, event))
        .collect();

    Ok(records
        .into_iter()
        .map(|record| {
            let my_slot = events.get(&record.data.my_slot_id).cloned();
            let their_slot = events.get(&record.data.their_slot_id).cloned();
            assemble(record, &briefs, my_slot, their_slot)
        })
        .collect())
}

fn assemble(
    record: StoredSwapRequest,
    briefs: &HashMap<UserId, UserBrief>,
    my_slot: Option<Event>,
    their_slot: Option<Event>,
) -> SwapRequestView {
    let data = record.data;
    SwapRequestView {
        id: data.swap_request_id,
        requester: brief_for(briefs, data.requester_id),
        responder: brief_for(briefs, data.responder_id),
        my_slot,
        their_slot,
        status: record.status,
        created_at: data.created_at,
        updated_at: data.updated_at,
        responded_at: data.responded_at,
    }
}

/// Build a view from data already in hand, without touching the store.
/// Both parties render as placeholders.
pub fn bare_request_view(
    record: StoredSwapRequest,
    my_slot: Option<Event>,
    their_slot: Option<Event>,
) -> SwapRequestView {
    assemble(record, &HashMap::new(), my_slot, their_slot)
}

/// Resolve a single request.
pub async fn request_view(store: &dyn SlotStore, record: StoredSwapRequest) -> SlotSwapResult<SwapRequestView> {
    let id = record.id();
    request_views(store, vec![record])
        .await?
        .pop()
        .ok_or_else(|| slotswap_core::SlotSwapError::not_found(slotswap_core::EntityType::SwapRequest, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotswap_core::{EntityIdType, EventStatus, SwapRequest};
    use slotswap_storage::{InMemoryStore, SwapBatch};
    use slotswap_test_utils::{base_time, fixtures};

    #[tokio::test]
    async fn test_slot_view_flattens_event_and_embeds_owner() {
        let store = InMemoryStore::new();
        let fx = fixtures::TwoShifts::seed(&store).await.unwrap();

        let views = slot_views(&store, vec![fx.shift2.clone()]).await.unwrap();
        assert_eq!(views[0].owner.name, "Bob");

        let json = serde_json::to_value(&views[0]).unwrap();
        assert_eq!(json["title"], "Shift2");
        assert_eq!(json["status"], "SWAPPABLE");
        assert_eq!(json["owner"]["email"], "bob@example.com");
    }

    #[tokio::test]
    async fn test_unknown_owner_renders_placeholder() {
        let store = InMemoryStore::new();
        let stranger = UserId::now_v7();
        let event = fixtures::event(stranger, "Orphan", 3, EventStatus::Swappable);
        let views = slot_views(&store, vec![event]).await.unwrap();
        assert_eq!(views[0].owner.id, stranger);
        assert!(views[0].owner.name.is_empty());
    }

    #[tokio::test]
    async fn test_request_view_resolves_both_sides() {
        let store = InMemoryStore::new();
        let fx = fixtures::TwoShifts::seed(&store).await.unwrap();
        let request = SwapRequest::propose(
            fx.alice.user_id,
            fx.bob.user_id,
            fx.shift1.event_id,
            fx.shift2.event_id,
            base_time(),
        );
        let stored = request.clone().into_stored();
        store.swap_apply(&SwapBatch::propose(request, base_time())).await.unwrap();

        let view = request_view(&store, stored).await.unwrap();
        assert_eq!(view.requester.name, "Alice");
        assert_eq!(view.responder.name, "Bob");
        let my_slot = view.my_slot.as_ref().unwrap();
        assert_eq!(my_slot.status, EventStatus::SwapPending);

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["status"], "PENDING");
        assert_eq!(json["mySlot"]["title"], "Shift1");
        assert_eq!(json["theirSlot"]["title"], "Shift2");
        assert!(json["respondedAt"].is_null());
    }

    #[tokio::test]
    async fn test_bare_view_uses_placeholders_and_given_slots() {
        let store = InMemoryStore::new();
        let fx = fixtures::TwoShifts::seed(&store).await.unwrap();
        let record = SwapRequest::propose(
            fx.alice.user_id,
            fx.bob.user_id,
            fx.shift1.event_id,
            fx.shift2.event_id,
            base_time(),
        )
        .into_stored();

        let view = bare_request_view(record, Some(fx.shift1.clone()), None);
        assert_eq!(view.requester.id, fx.alice.user_id);
        assert!(view.requester.name.is_empty());
        assert_eq!(view.responder.id, fx.bob.user_id);
        assert_eq!(view.my_slot.as_ref().map(|e| e.event_id), Some(fx.shift1.event_id));
        assert!(view.their_slot.is_none());
        assert_eq!(view.status, SwapRequestStatus::Pending);
    }

    #[tokio::test]
    async fn test_missing_slot_renders_null() {
        let store = InMemoryStore::new();
        let fx = fixtures::TwoShifts::seed(&store).await.unwrap();
        let record = SwapRequest::propose(
            fx.alice.user_id,
            fx.bob.user_id,
            fx.shift1.event_id,
            EventId::now_v7(),
            base_time(),
        )
        .into_stored();

        let view = request_view(&store, record).await.unwrap();
        assert!(view.my_slot.is_some());
        assert!(view.their_slot.is_none());
        let json = serde_json::to_value(&view).unwrap();
        assert!(json["theirSlot"].is_null());
    }
}
