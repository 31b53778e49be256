//! Property-based tests for the playback scheduler.

mod common;

use anas_live::{OutputContext, PlaybackScheduler, PlaybackSegment};
use common::ManualOutput;
use proptest::prelude::*;
use std::sync::Arc;

const EPSILON: f64 = 1e-9;

/// Segment lengths in samples at 24 kHz paired with how far the clock moves
/// before the segment arrives.
fn arb_arrivals() -> impl Strategy<Value = Vec<(usize, f64)>> {
    prop::collection::vec((1usize..4_800, 0.0f64..0.3), 1..40)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Sources never overlap, never start in the past, and play back to
    /// back whenever the clock has not overtaken the cursor.
    #[test]
    fn prop_scheduled_sources_never_overlap(arrivals in arb_arrivals()) {
        let output = Arc::new(ManualOutput::default());
        let scheduler = PlaybackScheduler::new(output.clone());
        let mut previous_end: Option<f64> = None;

        for (samples, delay) in arrivals {
            output.advance(delay);
            let now = output.current_time();
            let source = scheduler
                .enqueue(PlaybackSegment::new(vec![0.0; samples], 24_000))
                .unwrap();

            prop_assert!(source.start + EPSILON >= now);
            if let Some(end) = previous_end {
                prop_assert!(source.start + EPSILON >= end, "overlap: {} < {}", source.start, end);
                if now <= end {
                    prop_assert!((source.start - end).abs() < EPSILON, "gap without a stall");
                }
            }
            prop_assert!((scheduler.next_start() - source.end()).abs() < EPSILON);
            previous_end = Some(source.end());
        }
    }

    /// Interruption always leaves nothing playing and the cursor at "now".
    #[test]
    fn prop_cancel_all_empties_active_set(arrivals in arb_arrivals(), later in 0.0f64..2.0) {
        let output = Arc::new(ManualOutput::default());
        let scheduler = PlaybackScheduler::new(output.clone());
        for (samples, delay) in &arrivals {
            output.advance(*delay);
            scheduler.enqueue(PlaybackSegment::new(vec![0.0; *samples], 24_000)).unwrap();
        }
        output.advance(later);

        let active_before = scheduler.active_count();
        prop_assert_eq!(scheduler.cancel_all(), active_before);
        prop_assert_eq!(scheduler.active_count(), 0);
        prop_assert!((scheduler.next_start() - output.current_time()).abs() < EPSILON);
    }
}

#[test]
fn test_sequence_numbers_follow_arrival_order() {
    let output = Arc::new(ManualOutput::default());
    let scheduler = PlaybackScheduler::new(output.clone());
    let seqs: Vec<u64> = (0..4)
        .map(|_| scheduler.enqueue(PlaybackSegment::new(vec![0.0; 240], 24_000)).unwrap().seq)
        .collect();
    assert_eq!(seqs, vec![0, 1, 2, 3]);
    assert_eq!(output.started.lock().unwrap().len(), 4);
}
