//! Compare-and-swap write sets for the swap coordinator.

use slotswap_core::{
    Accepted, Event, EventId, Pending, Rejected, SlotTransition, StoredSwapRequest, SwapRequest,
    StateError, SwapRequestStatus, TimeRange, Timestamp,
};

/// A guarded status change on one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventWrite {
    pub event_id: EventId,
    /// Guard and target status: the event must currently be in
    /// `transition.expected_status()`.
    pub transition: SlotTransition,
    /// Replacement time window, set only when a swap is accepted.
    pub new_range: Option<TimeRange>,
}

impl EventWrite {
    /// Apply this write to a snapshot of its event. Fails, leaving the
    /// snapshot untouched, when the guard does not hold.
    pub fn apply_to(&self, event: &mut Event, at: Timestamp) -> Result<(), StateError> {
        event.apply_transition(self.transition, at)?;
        if let Some(range) = self.new_range {
            event.set_time_range(range);
        }
        Ok(())
    }
}

/// The ledger half of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestWrite {
    /// Insert a new request. Fails if the id already exists.
    Insert(StoredSwapRequest),
    /// Overwrite a request whose stored status is still `PENDING`.
    Resolve(StoredSwapRequest),
}

impl RequestWrite {
    pub fn record(&self) -> &StoredSwapRequest {
        match self {
            RequestWrite::Insert(record) | RequestWrite::Resolve(record) => record,
        }
    }

    /// Status the stored record must have before the write, if any.
    pub fn expected_status(&self) -> Option<SwapRequestStatus> {
        match self {
            RequestWrite::Insert(_) => None,
            RequestWrite::Resolve(_) => Some(SwapRequestStatus::Pending),
        }
    }
}

/// Everything one coordinator step writes, applied as a unit.
///
/// Built only from typed requests, so a batch can never resolve a request
/// that is not `PENDING` in the coordinator's view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapBatch {
    pub events: Vec<EventWrite>,
    pub request: RequestWrite,
    pub at: Timestamp,
}

impl SwapBatch {
    /// Insert a new pending request and lock both slots.
    pub fn propose(request: SwapRequest<Pending>, at: Timestamp) -> Self {
        let events = [request.my_slot_id(), request.their_slot_id()]
            .into_iter()
            .map(|event_id| EventWrite {
                event_id,
                transition: SlotTransition::Lock,
                new_range: None,
            })
            .collect();
        Self {
            events,
            request: RequestWrite::Insert(request.into_stored()),
            at,
        }
    }

    /// Exchange the two slots' time windows and settle both as `BUSY`.
    pub fn accept(request: SwapRequest<Accepted>, my_slot: &Event, their_slot: &Event, at: Timestamp) -> Self {
        let events = vec![
            EventWrite {
                event_id: my_slot.event_id,
                transition: SlotTransition::Settle,
                new_range: Some(their_slot.time_range()),
            },
            EventWrite {
                event_id: their_slot.event_id,
                transition: SlotTransition::Settle,
                new_range: Some(my_slot.time_range()),
            },
        ];
        Self {
            events,
            request: RequestWrite::Resolve(request.into_stored()),
            at,
        }
    }

    /// `event` as this batch leaves it once committed. Events the batch does
    /// not touch come back unchanged.
    pub fn committed(&self, mut event: Event) -> Event {
        if let Some(write) = self.events.iter().find(|w| w.event_id == event.event_id) {
            // A stale snapshot fails the guard and is returned as loaded.
            let _ = write.apply_to(&mut event, self.at);
        }
        event
    }

    /// Release both slots back to `SWAPPABLE`.
    pub fn reject(request: SwapRequest<Rejected>, at: Timestamp) -> Self {
        let events = [request.my_slot_id(), request.their_slot_id()]
            .into_iter()
            .map(|event_id| EventWrite {
                event_id,
                transition: SlotTransition::Release,
                new_range: None,
            })
            .collect();
        Self {
            events,
            request: RequestWrite::Resolve(request.into_stored()),
            at,
        }
    }
}
