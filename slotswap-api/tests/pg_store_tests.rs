//! PostgreSQL store tests
//!
//! Require a reachable database configured through `SLOTSWAP_DB_*`; run with
//! `--features db-tests`. Every test seeds fresh ids so runs do not collide.

#![cfg(feature = "db-tests")]

use slotswap_api::{ApiResult, DbConfig, PgStore};
use slotswap_coordinator::{calendar, ProposeSwap, SwapCoordinator};
use slotswap_core::{EntityIdType, ErrorKind, EventPatch, EventStatus, SwapRequestStatus, UserId};
use slotswap_storage::SlotStore;
use slotswap_test_utils::fixtures::{self, TwoShifts};
use std::sync::Arc;

async fn test_store() -> ApiResult<Arc<PgStore>> {
    let store = PgStore::from_config(&DbConfig::from_env())?;
    store.migrate().await?;
    Ok(Arc::new(store))
}

fn proposal(fx: &TwoShifts) -> ProposeSwap {
    ProposeSwap {
        my_slot_id: Some(fx.shift1.event_id),
        their_slot_id: Some(fx.shift2.event_id),
    }
}

#[tokio::test]
async fn pg_event_round_trip_and_owner_scoping() -> Result<(), String> {
    let store = test_store().await.map_err(|e| e.to_string())?;
    let owner = UserId::now_v7();
    let event = fixtures::event(owner, "Standup", 3, EventStatus::Busy);
    store.event_insert(&event).await.map_err(|e| e.to_string())?;

    let loaded = store.event_get(event.event_id).await.map_err(|e| e.to_string())?;
    assert_eq!(loaded.as_ref().map(|e| e.title.as_str()), Some("Standup"));

    let stranger = UserId::now_v7();
    let err = store
        .event_update_owned(event.event_id, stranger, &EventPatch::default())
        .await
        .err()
        .ok_or("stranger edit should fail")?;
    assert_eq!(err.kind(), ErrorKind::NotFound);

    store.event_delete_owned(event.event_id, owner).await.map_err(|e| e.to_string())?;
    assert!(store.event_get(event.event_id).await.map_err(|e| e.to_string())?.is_none());
    Ok(())
}

#[tokio::test]
async fn pg_accept_exchanges_windows() -> Result<(), String> {
    let store = test_store().await.map_err(|e| e.to_string())?;
    let fx = TwoShifts::seed(store.as_ref()).await.map_err(|e| e.to_string())?;
    let coord = SwapCoordinator::new(store.clone());

    let request = coord.propose(fx.alice.user_id, proposal(&fx)).await.map_err(|e| e.to_string())?;
    assert_eq!(request.status, SwapRequestStatus::Pending);

    let locked = store
        .event_update_owned(fx.shift1.event_id, fx.alice.user_id, &EventPatch::default())
        .await
        .err()
        .ok_or("locked slot should refuse edits")?;
    assert_eq!(locked.kind(), ErrorKind::Conflict);

    let resolved = coord
        .respond(fx.bob.user_id, request.id, true)
        .await
        .map_err(|e| e.to_string())?;
    assert_eq!(resolved.status, SwapRequestStatus::Accepted);

    let mine = calendar::list_my_events(store.as_ref(), fx.alice.user_id)
        .await
        .map_err(|e| e.to_string())?;
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].time_range(), fx.shift2.time_range());
    assert_eq!(mine[0].status, EventStatus::Busy);
    Ok(())
}

#[tokio::test]
async fn pg_concurrent_proposals_lock_once() -> Result<(), String> {
    let store = test_store().await.map_err(|e| e.to_string())?;
    let fx = TwoShifts::seed(store.as_ref()).await.map_err(|e| e.to_string())?;
    let carol = fixtures::user("Carol");
    let shift3 = fixtures::event(carol.user_id, "Shift3", 20, EventStatus::Swappable);
    store.event_insert(&shift3).await.map_err(|e| e.to_string())?;
    let coord = SwapCoordinator::new(store.clone());

    let (a, c) = tokio::join!(
        coord.propose(fx.alice.user_id, proposal(&fx)),
        coord.propose(
            carol.user_id,
            ProposeSwap {
                my_slot_id: Some(shift3.event_id),
                their_slot_id: Some(fx.shift2.event_id),
            }
        ),
    );
    assert_eq!([a.is_ok(), c.is_ok()].iter().filter(|ok| **ok).count(), 1);

    let incoming = coord.list_incoming(fx.bob.user_id).await.map_err(|e| e.to_string())?;
    assert_eq!(incoming.len(), 1);
    Ok(())
}
