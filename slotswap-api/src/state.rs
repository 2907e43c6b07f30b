//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use slotswap_coordinator::SwapCoordinator;
use slotswap_storage::SlotStore;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Backend for events, requests and profiles.
    pub store: Arc<dyn SlotStore>,
    /// Negotiation protocol over the same store.
    pub coordinator: SwapCoordinator,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn SlotStore>) -> Self {
        Self {
            coordinator: SwapCoordinator::new(store.clone()),
            store,
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<dyn SlotStore>, store);
crate::impl_from_ref!(SwapCoordinator, coordinator);
crate::impl_from_ref!(Instant, start_time);
