//! Calendar operations for event owners.

use crate::views::{slot_views, SlotView};
use chrono::Utc;
use slotswap_core::{Event, EventId, EventPatch, NewEvent, SlotSwapResult, UserId};
use slotswap_storage::SlotStore;
use tracing::info;

/// Create an event owned by `owner`. Status defaults to `BUSY`.
#[tracing::instrument(skip(store, input), fields(title = %input.title))]
pub async fn create_event(store: &dyn SlotStore, owner: UserId, input: NewEvent) -> SlotSwapResult<Event> {
    let event = Event::create(owner, input, Utc::now())?;
    store.event_insert(&event).await?;
    info!(event_id = %event.event_id, status = %event.status, "Event created");
    Ok(event)
}

/// Apply an owner edit. Locked events are refused.
#[tracing::instrument(skip(store, patch))]
pub async fn update_event(
    store: &dyn SlotStore,
    owner: UserId,
    event_id: EventId,
    patch: &EventPatch,
) -> SlotSwapResult<Event> {
    let event = store.event_update_owned(event_id, owner, patch).await?;
    info!(status = %event.status, "Event updated");
    Ok(event)
}

/// Delete an event owned by `owner`. Locked events are refused.
#[tracing::instrument(skip(store))]
pub async fn delete_event(store: &dyn SlotStore, owner: UserId, event_id: EventId) -> SlotSwapResult<()> {
    store.event_delete_owned(event_id, owner).await?;
    info!("Event deleted");
    Ok(())
}

pub async fn list_my_events(store: &dyn SlotStore, owner: UserId) -> SlotSwapResult<Vec<Event>> {
    store.event_list_by_owner(owner).await
}

/// Other users' `SWAPPABLE` slots with owner details, earliest first.
pub async fn list_swappable_slots(store: &dyn SlotStore, caller: UserId) -> SlotSwapResult<Vec<SlotView>> {
    let events = store.event_list_swappable(caller).await?;
    slot_views(store, events).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use slotswap_core::{EntityIdType, ErrorKind, EventStatus};
    use slotswap_storage::InMemoryStore;
    use slotswap_test_utils::{assertions::assert_kind, base_time, fixtures};

    fn new_event(title: &str, hours_from_base: i64, status: Option<EventStatus>) -> NewEvent {
        let start = base_time() + Duration::hours(hours_from_base);
        NewEvent {
            title: title.to_string(),
            start_time: start,
            end_time: start + Duration::hours(2),
            status,
        }
    }

    #[tokio::test]
    async fn test_create_assigns_owner_and_default_status() {
        let store = InMemoryStore::new();
        let owner = UserId::now_v7();
        let event = create_event(&store, owner, new_event("Standup", 1, None)).await.unwrap();
        assert_eq!(event.owner_id, owner);
        assert_eq!(event.status, EventStatus::Busy);
        assert_eq!(list_my_events(&store, owner).await.unwrap(), vec![event]);
    }

    #[tokio::test]
    async fn test_create_rejects_swap_pending() {
        let store = InMemoryStore::new();
        let result = create_event(
            &store,
            UserId::now_v7(),
            new_event("Sneaky", 1, Some(EventStatus::SwapPending)),
        )
        .await;
        assert_kind(&result, ErrorKind::Validation);
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn test_create_rejects_inverted_range() {
        let store = InMemoryStore::new();
        let mut input = new_event("Backwards", 5, None);
        input.end_time = input.start_time - Duration::minutes(1);
        let result = create_event(&store, UserId::now_v7(), input).await;
        assert_kind(&result, ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_update_other_users_event_is_not_found() {
        let store = InMemoryStore::new();
        let fx = fixtures::TwoShifts::seed(&store).await.unwrap();
        let patch = EventPatch {
            title: Some("Mine now".to_string()),
            ..Default::default()
        };
        let result = update_event(&store, fx.alice.user_id, fx.shift2.event_id, &patch).await;
        assert_kind(&result, ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn test_delete_then_list() {
        let store = InMemoryStore::new();
        let fx = fixtures::TwoShifts::seed(&store).await.unwrap();
        delete_event(&store, fx.alice.user_id, fx.shift1.event_id).await.unwrap();
        assert!(list_my_events(&store, fx.alice.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_swappable_slots_exclude_caller() {
        let store = InMemoryStore::new();
        let fx = fixtures::TwoShifts::seed(&store).await.unwrap();
        let slots = list_swappable_slots(&store, fx.alice.user_id).await.unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].event.event_id, fx.shift2.event_id);
        assert_eq!(slots[0].owner.name, "Bob");
    }
}
