//! Checkpoint persistence and resume across dispatcher instances.

use crate::integration::test_utils::{item, product, registry, MockProvider};
use adbatch::checkpoint::{Checkpoint, CheckpointStore};
use adbatch::generation::GenerationDefaults;
use adbatch::product::ProductRecord;
use adbatch::queue::{DispatchOptions, DispatchStats, Dispatcher, ProgressSnapshot};
use adbatch::types::{ProcessingStatus, ProviderKind};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

const SERIAL: DispatchOptions = DispatchOptions {
    concurrency: 1,
    max_retries: 3,
};

fn products() -> Vec<ProductRecord> {
    (2..=6).map(|row| product(row, "Acme")).collect()
}

fn dispatcher_at(path: &Path, provider: &Arc<MockProvider>) -> Dispatcher {
    Dispatcher::new(
        registry(&[Arc::clone(provider)]),
        SERIAL,
        Some(CheckpointStore::new(path)),
    )
}

/// Pause once `processed` reaches `after`, only the first time.
fn pause_after(dispatcher: &Dispatcher, after: usize) {
    let trigger = dispatcher.pause_handle();
    let fired = AtomicBool::new(false);
    dispatcher.set_progress_sink(Arc::new(move |s: &ProgressSnapshot| {
        if s.processed >= after && !fired.swap(true, Ordering::SeqCst) {
            trigger.pause();
        }
    }));
}

#[tokio::test]
async fn interrupted_run_resumes_from_checkpoint() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("logs").join("checkpoint.json");
    let defaults = GenerationDefaults::default();

    let first_provider = Arc::new(MockProvider::new(ProviderKind::SeedreamKie));
    let first = dispatcher_at(&path, &first_provider);
    pause_after(&first, 2);
    assert_eq!(first.admit_products(&products(), &defaults).len(), 5);
    first.run().await;
    drop(first);

    let saved = CheckpointStore::read(&path).unwrap();
    assert_eq!(saved.completed.len(), 2);
    assert_eq!(saved.queue.len(), 3);
    assert_eq!(saved.stats.total, 5);

    let second_provider = Arc::new(MockProvider::new(ProviderKind::SeedreamKie));
    let second = dispatcher_at(&path, &second_provider);
    let restored = second.restore().expect("checkpoint should load");
    assert_eq!(restored.completed, 2);
    assert_eq!(restored.pending, 3);
    assert_eq!(restored.requeued_in_flight, 0);

    // The same feed is admitted again on restart; known rows are not duplicated.
    assert!(second.admit_products(&products(), &defaults).is_empty());

    let results = second.run().await;

    assert_eq!(second_provider.call_count(), 3);
    assert_eq!(results.successful.len(), 5);
    let stats = second.statistics().stats;
    assert_eq!(stats.total, 5);
    assert_eq!(stats.processed, 5);
    assert_eq!(stats.success, 5);
    assert!(!path.exists(), "drained run should remove its checkpoint");
}

#[tokio::test]
async fn in_flight_items_are_requeued_without_spending_a_retry() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.json");

    let mut running = item(9, 100, 3);
    running.retry_count = 1;
    running.mark_in_progress();
    let waiting = item(10, 50, 3);
    let checkpoint = Checkpoint::new(
        7,
        DispatchStats {
            total: 2,
            retries: 1,
            ..Default::default()
        },
        vec![waiting],
        vec![running],
        Vec::new(),
        Vec::new(),
    );
    CheckpointStore::new(&path).save(&checkpoint).unwrap();

    let provider = Arc::new(MockProvider::new(ProviderKind::SeedreamKie));
    let dispatcher = dispatcher_at(&path, &provider);
    let restored = dispatcher.restore().unwrap();
    assert_eq!(restored.requeued_in_flight, 1);
    assert_eq!(restored.pending, 1);

    let snapshot = dispatcher.snapshot();
    assert!(snapshot.in_flight.is_empty());
    let requeued = snapshot.queue.iter().find(|i| i.id.as_str() == "product_9").unwrap();
    assert_eq!(requeued.status, ProcessingStatus::Pending);
    assert_eq!(requeued.retry_count, 1);
    assert!(requeued.started_at.is_none());

    dispatcher.run().await;
    assert_eq!(provider.calls(), vec![9, 10]);
    let stats = dispatcher.statistics().stats;
    assert_eq!(stats.retries, 1);
    assert_eq!(stats.success, 2);
}

#[tokio::test]
async fn corrupt_checkpoint_is_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.json");
    std::fs::write(&path, "{ this is not json").unwrap();

    let provider = Arc::new(MockProvider::new(ProviderKind::SeedreamKie));
    let dispatcher = dispatcher_at(&path, &provider);
    assert!(dispatcher.restore().is_none());

    dispatcher.admit([item(1, 100, 3)]);
    let results = dispatcher.run().await;
    assert_eq!(results.successful.len(), 1);
    assert!(!path.exists());
}

#[test]
fn foreign_checkpoint_format_is_ignored() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.json");
    std::fs::write(&path, r#"{"format": "something-else", "version": 1}"#).unwrap();

    assert!(CheckpointStore::new(&path).load().is_none());
    assert!(CheckpointStore::read(&path).is_err());
}

#[test]
fn newer_checkpoint_version_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.json");
    std::fs::write(&path, r#"{"format": "adbatch-checkpoint", "version": 99}"#).unwrap();

    let err = CheckpointStore::read(&path).unwrap_err();
    assert!(err.to_string().contains("unsupported checkpoint version 99"));
}

#[test]
fn stale_revisions_are_not_written() {
    let dir = TempDir::new().unwrap();
    let store = CheckpointStore::new(dir.path().join("checkpoint.json"));
    let at = |revision: u64, rows: u32| {
        Checkpoint::new(
            revision,
            DispatchStats::default(),
            (1..=rows).map(|row| item(row, 100, 3)).collect(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        )
    };

    assert!(store.save(&at(5, 2)).unwrap());
    assert!(!store.save(&at(3, 4)).unwrap());

    let loaded = store.load().unwrap();
    assert_eq!(loaded.revision, 5);
    assert_eq!(loaded.queue.len(), 2);
}

#[tokio::test]
async fn saved_snapshot_preserves_items_and_counters() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("checkpoint.json");
    let provider = Arc::new(MockProvider::new(ProviderKind::SeedreamKie));
    let dispatcher = dispatcher_at(&path, &provider);
    pause_after(&dispatcher, 1);
    dispatcher.admit([item(1, 100, 3), item(2, 90, 3), item(3, 80, 3)]);
    dispatcher.run().await;

    let in_memory = dispatcher.snapshot();
    let on_disk = CheckpointStore::read(&path).unwrap();

    assert_eq!(on_disk.stats.total, in_memory.stats.total);
    assert_eq!(on_disk.stats.success, 1);
    let ids = |c: &Checkpoint| c.ids().map(|id| id.to_string()).collect::<Vec<_>>();
    assert_eq!(ids(&on_disk), ids(&in_memory));
    assert_eq!(on_disk.queue[0].id.as_str(), "product_2");
    assert_eq!(on_disk.completed[0].result.as_ref().unwrap().status, ProcessingStatus::Success);
}
