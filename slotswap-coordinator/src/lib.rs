//! SlotSwap Coordinator
//!
//! The negotiation protocol on top of a [`slotswap_storage::SlotStore`]:
//! - [`SwapCoordinator`] proposes and resolves swaps
//! - [`calendar`] wraps the event store for owners
//! - [`views`] joins ids against current events and profiles for listings

pub mod calendar;
mod coordinator;
pub mod views;

pub use coordinator::{ProposeSwap, SwapCoordinator};
pub use views::{SlotView, SwapRequestView};
