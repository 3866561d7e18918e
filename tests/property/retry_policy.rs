//! Failure accounting on work items.

use adbatch::generation::GenerationDefaults;
use adbatch::product::ProductRecord;
use adbatch::queue::{FailureOutcome, WorkItem};
use adbatch::types::ProcessingStatus;
use proptest::prelude::*;

proptest! {
    /// An item that keeps failing is requeued `max_retries - 1` times, then fails for good,
    /// and its priority only ever drops by one per requeue, never below zero.
    #[test]
    fn failures_exhaust_after_max_retries(max_retries in 1u32..8, priority in 0u32..6) {
        let product = ProductRecord::new(3, "Item", "Brand", "prompt");
        let mut item = WorkItem::from_product(&product, &GenerationDefaults::default(), max_retries);
        item.priority = priority;

        let mut requeues = 0;
        loop {
            item.mark_in_progress();
            let before = item.priority;
            match item.record_failure("boom".to_string()) {
                FailureOutcome::Requeued => {
                    requeues += 1;
                    prop_assert_eq!(item.status, ProcessingStatus::Pending);
                    prop_assert_eq!(item.priority, before.saturating_sub(1));
                }
                FailureOutcome::Exhausted => break,
            }
        }

        prop_assert_eq!(requeues, max_retries - 1);
        prop_assert_eq!(item.retry_count, max_retries);
        prop_assert_eq!(item.status, ProcessingStatus::Failed);
        prop_assert_eq!(item.priority, priority.saturating_sub(max_retries - 1));
        prop_assert!(item.result.is_some());
    }

    /// Resetting an interrupted item never spends a retry.
    #[test]
    fn reset_keeps_retry_count(retries in 0u32..5) {
        let product = ProductRecord::new(4, "Item", "Brand", "prompt");
        let mut item = WorkItem::from_product(&product, &GenerationDefaults::default(), 10);
        item.retry_count = retries;
        item.mark_in_progress();
        item.reset_to_pending();

        prop_assert_eq!(item.retry_count, retries);
        prop_assert_eq!(item.status, ProcessingStatus::Pending);
        prop_assert!(item.started_at.is_none());
    }
}
