//! End-to-end dispatcher runs against scripted providers.

use crate::integration::test_utils::{failure, item, registry, MockProvider, Outcome};
use adbatch::checkpoint::CheckpointStore;
use adbatch::provider::ProviderSettings;
use adbatch::queue::{DispatchOptions, Dispatcher, ProgressSnapshot};
use adbatch::types::{ProcessingStatus, ProviderKind};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn options(concurrency: usize) -> DispatchOptions {
    DispatchOptions {
        concurrency,
        max_retries: 3,
    }
}

fn dispatcher(providers: &[Arc<MockProvider>], concurrency: usize) -> Dispatcher {
    Dispatcher::new(registry(providers), options(concurrency), None)
}

#[tokio::test]
async fn serial_run_succeeds_in_priority_order() {
    let kie = Arc::new(MockProvider::new(ProviderKind::SeedreamKie));
    let dispatcher = dispatcher(&[Arc::clone(&kie)], 1);
    dispatcher.admit([item(1, 10, 3), item(2, 30, 3), item(3, 20, 3)]);

    let results = dispatcher.run().await;

    assert_eq!(kie.calls(), vec![2, 3, 1]);
    assert_eq!(results.successful.len(), 3);
    let stats = dispatcher.statistics().stats;
    assert_eq!(stats.success, 3);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.retries, 0);
    assert_eq!(stats.processed, 3);
}

#[tokio::test]
async fn validation_failure_exhausts_retry_budget() {
    let kie = Arc::new(
        MockProvider::new(ProviderKind::SeedreamKie)
            .with_settings(|s: &mut ProviderSettings| s.max_reference_images = 0),
    );
    let dispatcher = dispatcher(&[Arc::clone(&kie)], 1);
    let mut work = item(4, 100, 2);
    work.request.reference_images = vec!["https://img.test/ref.png".to_string()];
    dispatcher.admit([work]);

    let results = dispatcher.run().await;

    assert_eq!(kie.call_count(), 0);
    assert_eq!(results.failed.len(), 1);
    let stats = dispatcher.statistics().stats;
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.retries, 1);

    let snapshot = dispatcher.snapshot();
    let failed = &snapshot.failed[0];
    assert_eq!(failed.status, ProcessingStatus::Failed);
    assert_eq!(failed.retry_count, 2);
    assert!(failed
        .error_message
        .as_deref()
        .unwrap()
        .contains("Too many reference images"));
}

#[tokio::test]
async fn higher_priority_dispatches_first() {
    let kie = Arc::new(MockProvider::new(ProviderKind::SeedreamKie));
    let dispatcher = dispatcher(&[Arc::clone(&kie)], 1);
    dispatcher.admit([item(1, 50, 3), item(2, 100, 3)]);

    dispatcher.run().await;

    assert_eq!(kie.calls(), vec![2, 1]);
}

#[tokio::test]
async fn equal_priority_is_first_in_first_out() {
    let kie = Arc::new(MockProvider::new(ProviderKind::SeedreamKie));
    let dispatcher = dispatcher(&[Arc::clone(&kie)], 1);
    dispatcher.admit([item(5, 100, 3), item(6, 100, 3), item(7, 100, 3)]);

    dispatcher.run().await;

    assert_eq!(kie.calls(), vec![5, 6, 7]);
}

#[tokio::test]
async fn always_failing_item_is_attempted_max_retries_times() {
    let kie = Arc::new(MockProvider::new(ProviderKind::SeedreamKie).always(failure("boom")));
    let dispatcher = dispatcher(&[Arc::clone(&kie)], 1);
    dispatcher.admit([item(1, 100, 3)]);

    let results = dispatcher.run().await;

    assert_eq!(kie.call_count(), 3);
    assert_eq!(results.failed.len(), 1);
    assert_eq!(
        results.failed[0].error_message.as_deref(),
        Some("Generation failed: boom")
    );
    let stats = dispatcher.statistics().stats;
    assert_eq!(stats.retries, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.processed, 1);
}

#[tokio::test]
async fn retry_lowers_priority_then_succeeds() {
    let kie = Arc::new(
        MockProvider::new(ProviderKind::SeedreamKie).script([failure("flaky"), Outcome::Succeed]),
    );
    let dispatcher = dispatcher(&[Arc::clone(&kie)], 1);
    dispatcher.admit([item(1, 10, 3)]);

    dispatcher.run().await;

    let snapshot = dispatcher.snapshot();
    assert_eq!(snapshot.completed.len(), 1);
    let done = &snapshot.completed[0];
    assert_eq!(done.priority, 9);
    assert_eq!(done.retry_count, 1);
    assert_eq!(done.status, ProcessingStatus::Success);
    assert!(done.error_message.is_none());
    assert_eq!(dispatcher.statistics().stats.retries, 1);
}

#[tokio::test]
async fn retried_item_yields_to_equal_priority_work() {
    let kie = Arc::new(
        MockProvider::new(ProviderKind::SeedreamKie).script([failure("flaky"), Outcome::Succeed]),
    );
    let dispatcher = dispatcher(&[Arc::clone(&kie)], 1);
    dispatcher.admit([item(1, 10, 3), item(2, 10, 3)]);

    dispatcher.run().await;

    assert_eq!(kie.calls(), vec![1, 2, 1]);
}

#[tokio::test]
async fn priority_does_not_go_below_zero() {
    let kie = Arc::new(
        MockProvider::new(ProviderKind::SeedreamKie)
            .script([failure("one"), failure("two"), Outcome::Succeed]),
    );
    let dispatcher = dispatcher(&[Arc::clone(&kie)], 1);
    dispatcher.admit([item(1, 0, 3)]);

    dispatcher.run().await;

    let snapshot = dispatcher.snapshot();
    assert_eq!(snapshot.completed[0].priority, 0);
    assert_eq!(snapshot.completed[0].retry_count, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn provider_calls_never_exceed_concurrency() {
    let kie = Arc::new(
        MockProvider::new(ProviderKind::SeedreamKie).with_delay(Duration::from_millis(15)),
    );
    let dispatcher = dispatcher(&[Arc::clone(&kie)], 3);
    dispatcher.admit((1..=12).map(|row| item(row, 100, 3)));

    let results = dispatcher.run().await;

    assert_eq!(results.successful.len(), 12);
    assert!(kie.max_active() <= 3, "max active {}", kie.max_active());
    let status = dispatcher.queue_status();
    assert!(status.peak_in_flight <= 3);
    assert!(status.peak_in_flight >= 1);
    assert_eq!(status.in_flight, 0);
    assert_eq!(status.pending, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_item_is_in_exactly_one_collection() {
    let kie = Arc::new(
        MockProvider::new(ProviderKind::SeedreamKie)
            .with_delay(Duration::from_millis(5))
            .script([failure("a"), failure("b"), failure("c")]),
    );
    let dispatcher = Arc::new(dispatcher(&[Arc::clone(&kie)], 4));
    dispatcher.admit((1..=20).map(|row| item(row, row % 3, 3)));

    let runner = Arc::clone(&dispatcher);
    let run = tokio::spawn(async move { runner.run().await });

    while !run.is_finished() {
        let snapshot = dispatcher.snapshot();
        let ids: Vec<_> = snapshot.ids().cloned().collect();
        let unique: HashSet<_> = ids.iter().cloned().collect();
        assert_eq!(ids.len(), unique.len(), "an item appeared twice");
        assert_eq!(ids.len(), snapshot.stats.total);
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    let results = run.await.unwrap();

    assert_eq!(results.successful.len(), 20);
    let snapshot = dispatcher.snapshot();
    assert_eq!(snapshot.completed.len(), 20);
    assert!(snapshot.queue.is_empty());
    assert!(snapshot.in_flight.is_empty());
    assert_eq!(snapshot.stats.retries, 3);
}

#[tokio::test]
async fn rate_limited_preferred_provider_falls_back() {
    let kie = Arc::new(MockProvider::new(ProviderKind::SeedreamKie));
    kie.set_rate_limited(true);
    let nano = Arc::new(MockProvider::new(ProviderKind::NanoBanana));
    let dispatcher = dispatcher(&[Arc::clone(&kie), Arc::clone(&nano)], 1);
    dispatcher.admit([item(1, 100, 3)]);

    let results = dispatcher.run().await;

    assert_eq!(kie.call_count(), 0);
    assert_eq!(nano.calls(), vec![1]);
    assert_eq!(
        results.successful[0].provider_used,
        Some(ProviderKind::NanoBanana)
    );
}

#[tokio::test]
async fn no_available_provider_counts_as_a_failed_attempt() {
    let kie = Arc::new(MockProvider::new(ProviderKind::SeedreamKie));
    kie.set_rate_limited(true);
    let dispatcher = dispatcher(&[Arc::clone(&kie)], 1);
    dispatcher.admit([item(1, 100, 2)]);

    let results = dispatcher.run().await;

    assert_eq!(results.failed.len(), 1);
    let message = results.failed[0].error_message.clone().unwrap();
    assert!(message.contains("No suitable provider available"), "{}", message);
    assert!(message.contains("seedream_kie: Rate limit reached"), "{}", message);
    assert_eq!(dispatcher.statistics().stats.retries, 1);
}

#[tokio::test]
async fn progress_is_reported_after_every_transition() {
    let kie = Arc::new(MockProvider::new(ProviderKind::SeedreamKie));
    let dispatcher = dispatcher(&[Arc::clone(&kie)], 1);
    let seen = Arc::new(parking_lot::Mutex::new(Vec::<ProgressSnapshot>::new()));
    let sink_seen = Arc::clone(&seen);
    dispatcher.set_progress_sink(Arc::new(move |s: &ProgressSnapshot| {
        sink_seen.lock().push(s.clone())
    }));
    dispatcher.admit([item(1, 100, 3), item(2, 90, 3)]);

    dispatcher.run().await;

    let seen = seen.lock();
    // pop and finish for each item, plus the final report
    assert_eq!(seen.len(), 5);
    assert_eq!(seen[0].in_progress, 1);
    assert_eq!(seen[0].pending, 1);
    let last = seen.last().unwrap();
    assert_eq!(last.processed, 2);
    assert!((last.completion_percentage - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn pause_stops_intake_and_resume_drains() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.json");
    let kie = Arc::new(MockProvider::new(ProviderKind::SeedreamKie));
    let dispatcher = Dispatcher::new(
        registry(&[Arc::clone(&kie)]),
        options(1),
        Some(CheckpointStore::new(&path)),
    );

    let pause = dispatcher.pause_handle();
    let fired = AtomicBool::new(false);
    let trigger = pause.clone();
    dispatcher.set_progress_sink(Arc::new(move |s: &ProgressSnapshot| {
        if s.processed >= 1 && !fired.swap(true, Ordering::SeqCst) {
            trigger.pause();
        }
    }));
    dispatcher.admit((1..=4).map(|row| item(row, 100, 3)));

    let first = dispatcher.run().await;
    assert_eq!(first.successful.len(), 1);
    let status = dispatcher.queue_status();
    assert!(status.paused);
    assert_eq!(status.pending, 3);
    assert!(path.exists());
    let saved = CheckpointStore::read(&path).unwrap();
    assert_eq!(saved.queue.len(), 3);
    assert_eq!(saved.completed.len(), 1);

    pause.resume();
    let second = dispatcher.run().await;

    assert_eq!(second.successful.len(), 4);
    assert_eq!(kie.call_count(), 4);
    assert!(!path.exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn progress_never_goes_backwards() {
    let kie = Arc::new(
        MockProvider::new(ProviderKind::SeedreamKie).with_delay(Duration::from_millis(1)),
    );
    let dispatcher = dispatcher(&[Arc::clone(&kie)], 8);
    let seen = Arc::new(parking_lot::Mutex::new(Vec::<usize>::new()));
    let sink_seen = Arc::clone(&seen);
    dispatcher.set_progress_sink(Arc::new(move |s: &ProgressSnapshot| {
        // widen the window between state change and delivery
        std::thread::sleep(Duration::from_micros(200));
        sink_seen.lock().push(s.processed)
    }));
    dispatcher.admit((1..=120).map(|row| item(row, 100, 3)));

    dispatcher.run().await;

    let seen = seen.lock();
    assert!(!seen.is_empty());
    for pair in seen.windows(2) {
        assert!(pair[0] <= pair[1], "processed went from {} to {}", pair[0], pair[1]);
    }
    assert_eq!(seen.last().copied(), Some(120));
}

#[tokio::test]
async fn provider_panic_counts_as_a_failed_attempt() {
    let kie = Arc::new(MockProvider::new(ProviderKind::SeedreamKie).script([Outcome::Panic]));
    let dispatcher = dispatcher(&[Arc::clone(&kie)], 1);
    dispatcher.admit([item(1, 100, 3)]);

    let results = dispatcher.run().await;

    assert_eq!(kie.call_count(), 2);
    assert_eq!(results.successful.len(), 1);
    assert_eq!(dispatcher.statistics().stats.retries, 1);
    assert_eq!(dispatcher.queue_status().in_flight, 0);
}

#[tokio::test]
async fn repeated_panics_end_in_failed() {
    let kie = Arc::new(MockProvider::new(ProviderKind::SeedreamKie).always(Outcome::Panic));
    let dispatcher = dispatcher(&[Arc::clone(&kie)], 1);
    dispatcher.admit([item(6, 100, 2)]);

    let results = dispatcher.run().await;

    assert_eq!(kie.call_count(), 2);
    assert_eq!(results.failed.len(), 1);
    assert_eq!(
        results.failed[0].error_message.as_deref(),
        Some("Generation failed: Provider panicked: backend crashed on row 6")
    );
    let status = dispatcher.queue_status();
    assert_eq!(status.in_flight, 0);
    assert_eq!(status.pending, 0);
}
