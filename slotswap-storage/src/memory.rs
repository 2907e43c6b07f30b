//! In-memory backend.
//!
//! All collections sit behind one `tokio::sync::RwLock`, so holding the write
//! guard is a transaction: batches are staged against clones and committed
//! only after every guard has passed.

use crate::{RequestWrite, SlotStore, SwapBatch};
use async_trait::async_trait;
use chrono::Utc;
use slotswap_core::{
    EntityIdType, EntityType, Event, EventId, EventPatch, EventStatus, SlotSwapError,
    SlotSwapResult, StateError, StorageError, StoredSwapRequest, SwapRequestId, UserId,
    UserProfile,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    events: HashMap<EventId, Event>,
    requests: HashMap<SwapRequestId, StoredSwapRequest>,
    users: HashMap<UserId, UserProfile>,
}

impl State {
    fn owned_event(&self, id: EventId, owner: UserId) -> SlotSwapResult<&Event> {
        self.events
            .get(&id)
            .filter(|event| event.owner_id == owner)
            .ok_or_else(|| SlotSwapError::not_found(EntityType::Event, id))
    }

    /// Check every guard in `batch` and return the events as they will look
    /// after the write. Nothing is mutated.
    fn stage(&self, batch: &SwapBatch) -> SlotSwapResult<Vec<Event>> {
        let mut staged: Vec<Event> = Vec::with_capacity(batch.events.len());
        for write in &batch.events {
            if staged.iter().any(|e| e.event_id == write.event_id) {
                return Err(conflict(EntityType::Event, write.event_id.as_uuid(), "event written twice in one batch"));
            }
            let mut event = self
                .events
                .get(&write.event_id)
                .cloned()
                .ok_or_else(|| SlotSwapError::not_found(EntityType::Event, write.event_id))?;
            write
                .apply_to(&mut event, batch.at)
                .map_err(|err| conflict(EntityType::Event, write.event_id.as_uuid(), &err.to_string()))?;
            staged.push(event);
        }

        let record = batch.request.record();
        match (&batch.request, self.requests.get(&record.id())) {
            (RequestWrite::Insert(_), Some(_)) => {
                return Err(StorageError::InsertFailed {
                    entity_type: EntityType::SwapRequest,
                    reason: "already exists".to_string(),
                }
                .into());
            }
            (RequestWrite::Insert(_), None) => {}
            (RequestWrite::Resolve(_), None) => {
                return Err(SlotSwapError::not_found(EntityType::SwapRequest, record.id()));
            }
            (RequestWrite::Resolve(_), Some(current)) => {
                if Some(current.status) != batch.request.expected_status() {
                    return Err(conflict(
                        EntityType::SwapRequest,
                        record.id().as_uuid(),
                        &format!("request is already {}", current.status),
                    ));
                }
            }
        }

        Ok(staged)
    }
}

fn conflict(entity_type: EntityType, id: uuid::Uuid, reason: &str) -> SlotSwapError {
    StorageError::Conflict {
        entity_type,
        id,
        reason: reason.to_string(),
    }
    .into()
}

fn newest_first(requests: &mut [StoredSwapRequest]) {
    requests.sort_by(|a, b| {
        b.data
            .created_at
            .cmp(&a.data.created_at)
            .then_with(|| b.id().cmp(&a.id()))
    });
}

fn by_start_time(events: &mut [Event]) {
    events.sort_by(|a, b| {
        a.start_time
            .cmp(&b.start_time)
            .then_with(|| a.event_id.cmp(&b.event_id))
    });
}

/// In-memory store for development and tests.
#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all stored data.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.events.clear();
        state.requests.clear();
        state.users.clear();
    }

    pub async fn event_count(&self) -> usize {
        self.state.read().await.events.len()
    }

    pub async fn request_count(&self) -> usize {
        self.state.read().await.requests.len()
    }
}

#[async_trait]
impl SlotStore for InMemoryStore {
    async fn event_insert(&self, event: &Event) -> SlotSwapResult<()> {
        let mut state = self.state.write().await;
        if state.events.contains_key(&event.event_id) {
            return Err(StorageError::InsertFailed {
                entity_type: EntityType::Event,
                reason: "already exists".to_string(),
            }
            .into());
        }
        state.events.insert(event.event_id, event.clone());
        Ok(())
    }

    async fn event_get(&self, id: EventId) -> SlotSwapResult<Option<Event>> {
        Ok(self.state.read().await.events.get(&id).cloned())
    }

    async fn events_get_many(&self, ids: &[EventId]) -> SlotSwapResult<Vec<Event>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.events.get(id).cloned()).collect())
    }

    async fn event_update_owned(
        &self,
        id: EventId,
        owner: UserId,
        patch: &EventPatch,
    ) -> SlotSwapResult<Event> {
        let mut state = self.state.write().await;
        let mut event = state.owned_event(id, owner)?.clone();
        event.apply_owner_patch(patch, Utc::now())?;
        state.events.insert(id, event.clone());
        Ok(event)
    }

    async fn event_delete_owned(&self, id: EventId, owner: UserId) -> SlotSwapResult<()> {
        let mut state = self.state.write().await;
        let event = state.owned_event(id, owner)?;
        if event.status == EventStatus::SwapPending {
            return Err(StateError::EventLocked {
                event_id: id.as_uuid(),
            }
            .into());
        }
        state.events.remove(&id);
        Ok(())
    }

    async fn event_list_by_owner(&self, owner: UserId) -> SlotSwapResult<Vec<Event>> {
        let state = self.state.read().await;
        let mut events: Vec<Event> = state
            .events
            .values()
            .filter(|e| e.owner_id == owner)
            .cloned()
            .collect();
        by_start_time(&mut events);
        Ok(events)
    }

    async fn event_list_swappable(&self, exclude_owner: UserId) -> SlotSwapResult<Vec<Event>> {
        let state = self.state.read().await;
        let mut events: Vec<Event> = state
            .events
            .values()
            .filter(|e| e.status == EventStatus::Swappable && e.owner_id != exclude_owner)
            .cloned()
            .collect();
        by_start_time(&mut events);
        Ok(events)
    }

    async fn swap_get(&self, id: SwapRequestId) -> SlotSwapResult<Option<StoredSwapRequest>> {
        Ok(self.state.read().await.requests.get(&id).cloned())
    }

    async fn swap_list_incoming(&self, user: UserId) -> SlotSwapResult<Vec<StoredSwapRequest>> {
        let state = self.state.read().await;
        let mut requests: Vec<StoredSwapRequest> = state
            .requests
            .values()
            .filter(|r| r.data.responder_id == user && !r.status.is_terminal())
            .cloned()
            .collect();
        newest_first(&mut requests);
        Ok(requests)
    }

    async fn swap_list_outgoing(&self, user: UserId) -> SlotSwapResult<Vec<StoredSwapRequest>> {
        let state = self.state.read().await;
        let mut requests: Vec<StoredSwapRequest> = state
            .requests
            .values()
            .filter(|r| r.data.requester_id == user)
            .cloned()
            .collect();
        newest_first(&mut requests);
        Ok(requests)
    }

    async fn swap_apply(&self, batch: &SwapBatch) -> SlotSwapResult<()> {
        let mut state = self.state.write().await;
        let staged = state.stage(batch)?;

        for event in staged {
            state.events.insert(event.event_id, event);
        }
        let record = batch.request.record().clone();
        state.requests.insert(record.id(), record);
        Ok(())
    }

    async fn user_upsert(&self, profile: &UserProfile) -> SlotSwapResult<()> {
        let mut state = self.state.write().await;
        state.users.insert(profile.user_id, profile.clone());
        Ok(())
    }

    async fn user_get(&self, id: UserId) -> SlotSwapResult<Option<UserProfile>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn users_get_many(&self, ids: &[UserId]) -> SlotSwapResult<Vec<UserProfile>> {
        let state = self.state.read().await;
        Ok(ids.iter().filter_map(|id| state.users.get(id).cloned()).collect())
    }

    async fn ping(&self) -> SlotSwapResult<()> {
        let _state = self.state.read().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use slotswap_core::{
        ErrorKind, NewEvent, SwapRequest, SwapRequestStatus, Timestamp,
    };

    fn at(hour: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2025, 3, 14, hour, 0, 0).unwrap()
    }

    fn make_event(owner: UserId, title: &str, start: u32, status: EventStatus) -> Event {
        let mut event = Event::create(
            owner,
            NewEvent {
                title: title.to_string(),
                start_time: at(start),
                end_time: at(start) + Duration::hours(1),
                status: None,
            },
            at(0),
        )
        .unwrap();
        event.status = status;
        event
    }

    async fn seed(store: &InMemoryStore, events: &[&Event]) {
        for event in events {
            store.event_insert(event).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_event_insert_and_get() {
        let store = InMemoryStore::new();
        let event = make_event(UserId::now_v7(), "Shift1", 9, EventStatus::Busy);
        store.event_insert(&event).await.unwrap();

        assert_eq!(store.event_get(event.event_id).await.unwrap(), Some(event.clone()));
        assert!(store.event_get(EventId::now_v7()).await.unwrap().is_none());

        let dup = store.event_insert(&event).await.unwrap_err();
        assert!(matches!(dup, SlotSwapError::Storage(StorageError::InsertFailed { .. })));
    }

    #[tokio::test]
    async fn test_update_owned_requires_ownership() {
        let store = InMemoryStore::new();
        let owner = UserId::now_v7();
        let event = make_event(owner, "Shift1", 9, EventStatus::Busy);
        seed(&store, &[&event]).await;

        let patch = EventPatch {
            status: Some(EventStatus::Swappable),
            ..Default::default()
        };
        let err = store
            .event_update_owned(event.event_id, UserId::now_v7(), &patch)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let updated = store.event_update_owned(event.event_id, owner, &patch).await.unwrap();
        assert_eq!(updated.status, EventStatus::Swappable);
        assert_eq!(
            store.event_get(event.event_id).await.unwrap().unwrap().status,
            EventStatus::Swappable
        );
    }

    #[tokio::test]
    async fn test_locked_event_cannot_be_edited_or_deleted() {
        let store = InMemoryStore::new();
        let owner = UserId::now_v7();
        let event = make_event(owner, "Shift1", 9, EventStatus::SwapPending);
        seed(&store, &[&event]).await;

        let patch = EventPatch {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        let err = store.event_update_owned(event.event_id, owner, &patch).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = store.event_delete_owned(event.event_id, owner).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn test_delete_owned() {
        let store = InMemoryStore::new();
        let owner = UserId::now_v7();
        let event = make_event(owner, "Shift1", 9, EventStatus::Busy);
        seed(&store, &[&event]).await;

        let err = store.event_delete_owned(event.event_id, UserId::now_v7()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        store.event_delete_owned(event.event_id, owner).await.unwrap();
        assert!(store.event_get(event.event_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_listings_are_sorted_and_filtered() {
        let store = InMemoryStore::new();
        let (a, b) = (UserId::now_v7(), UserId::now_v7());
        let late = make_event(a, "late", 15, EventStatus::Busy);
        let early = make_event(a, "early", 8, EventStatus::Swappable);
        let theirs_late = make_event(b, "b-late", 17, EventStatus::Swappable);
        let theirs_early = make_event(b, "b-early", 7, EventStatus::Swappable);
        let theirs_busy = make_event(b, "b-busy", 6, EventStatus::Busy);
        seed(&store, &[&late, &early, &theirs_late, &theirs_early, &theirs_busy]).await;

        let mine: Vec<String> = store
            .event_list_by_owner(a)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(mine, vec!["early", "late"]);

        let swappable: Vec<String> = store
            .event_list_swappable(a)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(swappable, vec!["b-early", "b-late"]);
    }

    #[tokio::test]
    async fn test_swap_apply_propose_then_accept() {
        let store = InMemoryStore::new();
        let (a, b) = (UserId::now_v7(), UserId::now_v7());
        let mine = make_event(a, "Shift1", 9, EventStatus::Swappable);
        let theirs = make_event(b, "Shift2", 14, EventStatus::Swappable);
        seed(&store, &[&mine, &theirs]).await;

        let request = SwapRequest::propose(a, b, mine.event_id, theirs.event_id, at(1));
        store.swap_apply(&SwapBatch::propose(request.clone(), at(1))).await.unwrap();

        let locked = store.events_get_many(&[mine.event_id, theirs.event_id]).await.unwrap();
        assert!(locked.iter().all(|e| e.status == EventStatus::SwapPending));
        assert_eq!(store.swap_list_incoming(b).await.unwrap().len(), 1);

        let mine_now = store.event_get(mine.event_id).await.unwrap().unwrap();
        let theirs_now = store.event_get(theirs.event_id).await.unwrap().unwrap();
        let batch = SwapBatch::accept(request.accept(at(2)), &mine_now, &theirs_now, at(2));
        store.swap_apply(&batch).await.unwrap();

        let mine_after = store.event_get(mine.event_id).await.unwrap().unwrap();
        let theirs_after = store.event_get(theirs.event_id).await.unwrap().unwrap();
        assert_eq!(mine_after.title, "Shift1");
        assert_eq!(mine_after.start_time, theirs.start_time);
        assert_eq!(theirs_after.start_time, mine.start_time);
        assert_eq!(mine_after.status, EventStatus::Busy);
        assert_eq!(theirs_after.status, EventStatus::Busy);

        assert!(store.swap_list_incoming(b).await.unwrap().is_empty());
        let outgoing = store.swap_list_outgoing(a).await.unwrap();
        assert_eq!(outgoing[0].status, SwapRequestStatus::Accepted);
    }

    #[tokio::test]
    async fn test_swap_apply_guard_failure_changes_nothing() {
        let store = InMemoryStore::new();
        let (a, b) = (UserId::now_v7(), UserId::now_v7());
        let mine = make_event(a, "Shift1", 9, EventStatus::Swappable);
        let theirs = make_event(b, "Shift2", 14, EventStatus::Busy);
        seed(&store, &[&mine, &theirs]).await;

        let request = SwapRequest::propose(a, b, mine.event_id, theirs.event_id, at(1));
        let err = store.swap_apply(&SwapBatch::propose(request, at(1))).await.unwrap_err();
        assert!(err.is_retryable());

        assert_eq!(store.event_get(mine.event_id).await.unwrap().unwrap().status, EventStatus::Swappable);
        assert_eq!(store.request_count().await, 0);
    }

    #[tokio::test]
    async fn test_swap_apply_resolve_is_write_once() {
        let store = InMemoryStore::new();
        let (a, b) = (UserId::now_v7(), UserId::now_v7());
        let mine = make_event(a, "Shift1", 9, EventStatus::Swappable);
        let theirs = make_event(b, "Shift2", 14, EventStatus::Swappable);
        seed(&store, &[&mine, &theirs]).await;

        let request = SwapRequest::propose(a, b, mine.event_id, theirs.event_id, at(1));
        store.swap_apply(&SwapBatch::propose(request.clone(), at(1))).await.unwrap();
        store
            .swap_apply(&SwapBatch::reject(request.clone().reject(at(2)), at(2)))
            .await
            .unwrap();

        // A stale second response must not land.
        let err = store
            .swap_apply(&SwapBatch::reject(request.reject(at(3)), at(3)))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let stored = store.swap_list_outgoing(a).await.unwrap();
        assert_eq!(stored[0].data.responded_at, Some(at(2)));
    }

    #[tokio::test]
    async fn test_outgoing_is_newest_first() {
        let store = InMemoryStore::new();
        let (a, b) = (UserId::now_v7(), UserId::now_v7());
        let mut ids = Vec::new();
        for hour in [9, 11, 13] {
            let mine = make_event(a, "m", hour, EventStatus::Swappable);
            let theirs = make_event(b, "t", hour, EventStatus::Swappable);
            seed(&store, &[&mine, &theirs]).await;
            let request = SwapRequest::propose(a, b, mine.event_id, theirs.event_id, at(hour));
            ids.push(request.id());
            store.swap_apply(&SwapBatch::propose(request, at(hour))).await.unwrap();
        }

        let listed: Vec<SwapRequestId> = store
            .swap_list_outgoing(a)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id())
            .collect();
        ids.reverse();
        assert_eq!(listed, ids);
    }

    #[tokio::test]
    async fn test_user_directory() {
        let store = InMemoryStore::new();
        let id = UserId::now_v7();
        let profile = UserProfile::new(id, "Ada", "ada@example.com", at(1)).unwrap();
        store.user_upsert(&profile).await.unwrap();

        let renamed = UserProfile::new(id, "Ada L.", "ada@example.com", at(2)).unwrap();
        store.user_upsert(&renamed).await.unwrap();

        assert_eq!(store.user_get(id).await.unwrap().unwrap().name, "Ada L.");
        let many = store.users_get_many(&[id, UserId::now_v7()]).await.unwrap();
        assert_eq!(many.len(), 1);
        store.ping().await.unwrap();
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use slotswap_core::{NewEvent, SwapRequest};

    fn arb_status() -> impl Strategy<Value = EventStatus> {
        prop_oneof![
            Just(EventStatus::Busy),
            Just(EventStatus::Swappable),
            Just(EventStatus::SwapPending),
        ]
    }

    fn make_event(owner: UserId, start_min: i64, status: EventStatus) -> Event {
        let base = Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0).unwrap();
        let mut event = Event::create(
            owner,
            NewEvent {
                title: "slot".to_string(),
                start_time: base + Duration::minutes(start_min),
                end_time: base + Duration::minutes(start_min + 30),
                status: None,
            },
            base,
        )
        .unwrap();
        event.status = status;
        event
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// A propose batch lands only when both events are SWAPPABLE, and
        /// otherwise leaves every record exactly as it was.
        #[test]
        fn prop_propose_batch_is_all_or_nothing(
            s1 in arb_status(),
            s2 in arb_status(),
            m1 in 0i64..1000,
            m2 in 0i64..1000,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = InMemoryStore::new();
                let (a, b) = (UserId::now_v7(), UserId::now_v7());
                let mine = make_event(a, m1, s1);
                let theirs = make_event(b, m2, s2);
                store.event_insert(&mine).await.unwrap();
                store.event_insert(&theirs).await.unwrap();

                let request = SwapRequest::propose(a, b, mine.event_id, theirs.event_id, Utc::now());
                let result = store.swap_apply(&SwapBatch::propose(request, Utc::now())).await;

                let mine_after = store.event_get(mine.event_id).await.unwrap().unwrap();
                let theirs_after = store.event_get(theirs.event_id).await.unwrap().unwrap();

                if s1 == EventStatus::Swappable && s2 == EventStatus::Swappable {
                    assert!(result.is_ok());
                    assert_eq!(mine_after.status, EventStatus::SwapPending);
                    assert_eq!(theirs_after.status, EventStatus::SwapPending);
                    assert_eq!(store.request_count().await, 1);
                } else {
                    assert!(result.is_err());
                    assert_eq!(mine_after, mine);
                    assert_eq!(theirs_after, theirs);
                    assert_eq!(store.request_count().await, 0);
                }
            });
        }
    }
}
