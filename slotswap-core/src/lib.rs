//! SlotSwap Core - Entity Types
//!
//! Pure data structures shared by every other crate: identifiers, calendar
//! events, the swap request typestate and the error taxonomy. No I/O.

mod error;
mod event;
mod identity;
mod swap;
mod user;

pub use error::*;
pub use event::*;
pub use identity::*;
pub use swap::*;
pub use user::*;

#[cfg(test)]
mod prop_tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use proptest::prelude::*;

    fn arb_status() -> impl Strategy<Value = EventStatus> {
        prop_oneof![
            Just(EventStatus::Busy),
            Just(EventStatus::Swappable),
            Just(EventStatus::SwapPending),
        ]
    }

    fn arb_transition() -> impl Strategy<Value = SlotTransition> {
        prop_oneof![
            Just(SlotTransition::Lock),
            Just(SlotTransition::Release),
            Just(SlotTransition::Settle),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn prop_owner_never_enters_or_leaves_pending(from in arb_status(), to in arb_status()) {
            let result = from.owner_change(to);
            if from == EventStatus::SwapPending || to == EventStatus::SwapPending {
                prop_assert!(result.is_err());
            } else {
                prop_assert_eq!(result, Ok(to));
            }
        }

        #[test]
        fn prop_transition_requires_expected_status(from in arb_status(), t in arb_transition()) {
            match from.apply(t) {
                Some(next) => {
                    prop_assert_eq!(from, t.expected_status());
                    prop_assert_eq!(next, t.target_status());
                }
                None => prop_assert_ne!(from, t.expected_status()),
            }
        }

        #[test]
        fn prop_time_range_valid_iff_end_after_start(
            start_min in 0i64..100_000,
            len_min in -500i64..500,
        ) {
            let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
            let start = base + Duration::minutes(start_min);
            let end = start + Duration::minutes(len_min);
            prop_assert_eq!(TimeRange::new(start, end).is_ok(), len_min > 0);
        }
    }
}
