//! SlotSwap Test Utilities
//!
//! Shared test infrastructure for the workspace:
//! - Proptest generators for events, statuses and time windows
//! - Fixtures that seed a store with users and slots
//! - Assertions over the error taxonomy

pub use slotswap_storage::{InMemoryStore, SlotStore};

pub use slotswap_core::{
    EntityIdType, EntityType, ErrorKind, Event, EventId, EventStatus, NewEvent, SlotSwapError,
    SlotSwapResult, StorageError, SwapRequestId, SwapRequestStatus, TimeRange, Timestamp, UserId,
    UserProfile,
};

use chrono::{Duration, TimeZone, Utc};

/// Fixed reference instant all generated times are offset from.
pub fn base_time() -> Timestamp {
    Utc.with_ymd_and_hms(2025, 3, 14, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating SlotSwap types.

    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Generate a random UUID.
    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    pub fn arb_user_id() -> impl Strategy<Value = UserId> {
        arb_uuid().prop_map(UserId::new)
    }

    pub fn arb_event_id() -> impl Strategy<Value = EventId> {
        arb_uuid().prop_map(EventId::new)
    }

    pub fn arb_event_status() -> impl Strategy<Value = EventStatus> {
        prop_oneof![
            Just(EventStatus::Busy),
            Just(EventStatus::Swappable),
            Just(EventStatus::SwapPending),
        ]
    }

    /// Statuses an owner may create an event with.
    pub fn arb_owner_status() -> impl Strategy<Value = EventStatus> {
        prop_oneof![Just(EventStatus::Busy), Just(EventStatus::Swappable)]
    }

    /// Non-blank titles.
    pub fn arb_title() -> impl Strategy<Value = String> {
        "[A-Za-z][A-Za-z0-9 ]{0,23}"
    }

    /// A valid window within a few weeks of [`base_time`], 15 minutes to 8 hours long.
    pub fn arb_time_range() -> impl Strategy<Value = TimeRange> {
        (0i64..40_000, 15i64..480).prop_filter_map("valid range", |(offset, len)| {
            let start = base_time() + Duration::minutes(offset);
            TimeRange::new(start, start + Duration::minutes(len)).ok()
        })
    }

    /// An event owned by `owner` with the given status.
    pub fn arb_event(owner: UserId, status: EventStatus) -> impl Strategy<Value = Event> {
        (arb_title(), arb_time_range()).prop_filter_map("valid event", move |(title, range)| {
            let mut event = Event::create(
                owner,
                NewEvent {
                    title,
                    start_time: range.start(),
                    end_time: range.end(),
                    status: None,
                },
                base_time(),
            )
            .ok()?;
            event.status = status;
            Some(event)
        })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-built fixtures for common scenarios.

    use super::*;

    /// A profile with a derived display name and email.
    pub fn user(name: &str) -> UserProfile {
        UserProfile {
            user_id: UserId::now_v7(),
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            last_seen_at: base_time(),
        }
    }

    /// An event starting `start_hour` hours after [`base_time`], one hour long.
    pub fn event(owner: UserId, title: &str, start_hour: i64, status: EventStatus) -> Event {
        let start = base_time() + Duration::hours(start_hour);
        Event {
            event_id: EventId::now_v7(),
            title: title.to_string(),
            start_time: start,
            end_time: start + Duration::hours(1),
            status,
            owner_id: owner,
            created_at: base_time(),
            updated_at: base_time(),
        }
    }

    /// Two users with one swappable slot each: "Shift1" (owned by the
    /// first) and "Shift2" (owned by the second).
    pub struct TwoShifts {
        pub alice: UserProfile,
        pub bob: UserProfile,
        pub shift1: Event,
        pub shift2: Event,
    }

    impl TwoShifts {
        /// Seed `store` with both users and both slots.
        pub async fn seed(store: &dyn SlotStore) -> SlotSwapResult<Self> {
            let alice = user("Alice");
            let bob = user("Bob");
            let shift1 = event(alice.user_id, "Shift1", 9, EventStatus::Swappable);
            let shift2 = event(bob.user_id, "Shift2", 14, EventStatus::Swappable);

            store.user_upsert(&alice).await?;
            store.user_upsert(&bob).await?;
            store.event_insert(&shift1).await?;
            store.event_insert(&shift2).await?;

            Ok(Self {
                alice,
                bob,
                shift1,
                shift2,
            })
        }
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions over the SlotSwap error taxonomy.

    use super::*;

    /// Assert that a result failed with the given error kind.
    #[track_caller]
    pub fn assert_kind<T: std::fmt::Debug>(result: &SlotSwapResult<T>, kind: ErrorKind) {
        match result {
            Err(err) => assert_eq!(err.kind(), kind, "unexpected error kind for {:?}", err),
            Ok(value) => panic!("Expected {:?} error, got Ok: {:?}", kind, value),
        }
    }

    /// Assert that a result is a NotFound storage error for `entity_type`.
    #[track_caller]
    pub fn assert_not_found<T: std::fmt::Debug>(result: &SlotSwapResult<T>, entity_type: EntityType) {
        match result {
            Err(SlotSwapError::Storage(StorageError::NotFound { entity_type: et, .. })) => {
                assert_eq!(*et, entity_type, "Wrong entity type in NotFound error");
            }
            other => panic!("Expected NotFound error for {:?}, got: {:?}", entity_type, other),
        }
    }

    /// Assert that `event` has the given status.
    #[track_caller]
    pub fn assert_status(event: &Event, status: EventStatus) {
        assert_eq!(
            event.status, status,
            "event {} ({}) has status {}, expected {}",
            event.event_id, event.title, event.status, status
        );
    }
}
