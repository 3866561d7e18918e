//! Pop order of the priority queue for arbitrary admissions.

use adbatch::generation::GenerationDefaults;
use adbatch::product::ProductRecord;
use adbatch::queue::{PriorityQueue, WorkItem};
use proptest::prelude::*;

fn work_item(row: u32, priority: u32, sequence: u64) -> WorkItem {
    let product = ProductRecord::new(row, "Item", "Brand", "prompt");
    let mut item = WorkItem::from_product(&product, &GenerationDefaults::default(), 3);
    item.priority = priority;
    item.sequence = sequence;
    item
}

/// Items come out by descending priority; equal priorities keep admission order.
#[test]
fn test_pop_order_is_priority_then_fifo() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(0u32..5, 0..40), |priorities| {
            let created = chrono::Utc::now();
            let mut queue = PriorityQueue::new();
            for (i, priority) in priorities.iter().enumerate() {
                let mut item = work_item(i as u32 + 2, *priority, i as u64);
                item.created_at = created;
                queue.push(item);
            }

            let mut popped = Vec::new();
            while let Some(item) = queue.pop() {
                popped.push((item.priority, item.sequence));
            }

            prop_assert_eq!(popped.len(), priorities.len());
            for pair in popped.windows(2) {
                let (p1, s1) = pair[0];
                let (p2, s2) = pair[1];
                prop_assert!(p1 > p2 || (p1 == p2 && s1 < s2), "{:?}", pair);
            }
            Ok(())
        })
        .unwrap();
}

/// The sorted view matches what repeated pops return.
#[test]
fn test_sorted_view_matches_pop_order() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&prop::collection::vec(any::<u32>(), 0..30), |priorities| {
            let created = chrono::Utc::now();
            let mut queue = PriorityQueue::new();
            for (i, priority) in priorities.iter().enumerate() {
                let mut item = work_item(i as u32 + 2, *priority, i as u64);
                item.created_at = created;
                queue.push(item);
            }

            let view: Vec<u64> = queue.to_sorted_vec().iter().map(|i| i.sequence).collect();
            let mut popped = Vec::new();
            while let Some(item) = queue.pop() {
                popped.push(item.sequence);
            }
            prop_assert_eq!(view, popped);
            Ok(())
        })
        .unwrap();
}
