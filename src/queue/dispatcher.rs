//! Dispatcher
//!
//! A fixed pool of worker tasks drains the shared priority queue. Every state change of
//! a work item (pop, success, retry, terminal failure) happens inside one short critical
//! section over [`DispatchState`]; provider calls run with no lock held. After each
//! transition the dispatcher emits a progress snapshot and persists a checkpoint.

use crate::aggregate::{BatchResults, ResultAggregator};
use crate::checkpoint::{Checkpoint, CheckpointStore};
use crate::error::ProviderError;
use crate::generation::{GenerationDefaults, GenerationResult};
use crate::product::ProductRecord;
use crate::progress::ProgressSink;
use crate::provider::ProviderRegistry;
use crate::queue::item::{FailureOutcome, WorkItem, WorkItemId};
use crate::queue::priority::PriorityQueue;
use crate::queue::selection::select_provider;
use crate::queue::stats::{DispatchStats, ProgressSnapshot, QueueStatus, StatisticsReport};
use crate::types::ProcessingStatus;
use chrono::Utc;
use futures::future::join_all;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Dispatcher tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchOptions {
    /// Worker pool size; bounds simultaneous provider calls
    pub concurrency: usize,
    /// Retry budget given to items admitted from products
    pub max_retries: u32,
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self {
            concurrency: 3,
            max_retries: 3,
        }
    }
}

/// Stops workers from taking new items; in-flight items still finish.
#[derive(Debug, Clone, Default)]
pub struct PauseHandle(Arc<AtomicBool>);

impl PauseHandle {
    pub fn pause(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// What a checkpoint restore brought back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreSummary {
    pub pending: usize,
    /// In-flight at save time, now pending again
    pub requeued_in_flight: usize,
    pub completed: usize,
    pub failed: usize,
}

#[derive(Debug, Default)]
struct DispatchState {
    queue: PriorityQueue,
    in_flight: BTreeMap<WorkItemId, WorkItem>,
    completed: Vec<WorkItem>,
    failed: Vec<WorkItem>,
    stats: DispatchStats,
    known: HashSet<WorkItemId>,
    next_sequence: u64,
    revision: u64,
    /// Bumped for every progress snapshot taken
    progress_stamp: u64,
    peak_in_flight: usize,
}

impl DispatchState {
    /// Snapshot for the progress sink, stamped so late deliveries can be dropped.
    fn stamped_progress(&mut self) -> Stamped {
        self.progress_stamp += 1;
        Stamped {
            stamp: self.progress_stamp,
            snapshot: self.progress(),
        }
    }

    fn progress(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            total: self.stats.total,
            processed: self.stats.processed,
            in_progress: self.in_flight.len(),
            pending: self.queue.len(),
            success: self.stats.success,
            failed: self.stats.failed,
            retries: self.stats.retries,
            completion_percentage: self.stats.completion_percentage(),
            total_cost: self.stats.total_cost,
        }
    }

    fn snapshot(&self) -> Checkpoint {
        Checkpoint::new(
            self.revision,
            self.stats.clone(),
            self.queue.to_sorted_vec(),
            self.in_flight.values().cloned().collect(),
            self.completed.clone(),
            self.failed.clone(),
        )
    }

    /// Bump the revision and take a snapshot for persisting.
    fn next_checkpoint(&mut self) -> Checkpoint {
        self.revision += 1;
        self.snapshot()
    }

    fn from_checkpoint(checkpoint: Checkpoint) -> (Self, RestoreSummary) {
        let summary = RestoreSummary {
            pending: checkpoint.queue.len(),
            requeued_in_flight: checkpoint.in_flight.len(),
            completed: checkpoint.completed.len(),
            failed: checkpoint.failed.len(),
        };

        let mut state = DispatchState {
            stats: checkpoint.stats,
            revision: checkpoint.revision,
            ..Default::default()
        };
        for mut item in checkpoint.queue.into_iter().chain(checkpoint.in_flight) {
            item.reset_to_pending();
            state.known.insert(item.id.clone());
            state.next_sequence = state.next_sequence.max(item.sequence + 1);
            state.queue.push(item);
        }
        for item in checkpoint.completed.iter().chain(&checkpoint.failed) {
            state.known.insert(item.id.clone());
            state.next_sequence = state.next_sequence.max(item.sequence + 1);
        }
        state.completed = checkpoint.completed;
        state.failed = checkpoint.failed;
        state.stats.total = state.known.len();
        state.stats.end_time = None;
        (state, summary)
    }
}

struct Stamped {
    stamp: u64,
    snapshot: ProgressSnapshot,
}

struct Shared {
    registry: ProviderRegistry,
    state: Mutex<DispatchState>,
    checkpoint: Option<Arc<CheckpointStore>>,
    progress: RwLock<Option<Arc<dyn ProgressSink>>>,
    /// Stamp of the last snapshot handed to the sink; held while the sink runs
    last_emitted: Mutex<u64>,
    pause: PauseHandle,
}

/// Drives admitted work items to Success or Failed through a bounded worker pool.
pub struct Dispatcher {
    options: DispatchOptions,
    shared: Arc<Shared>,
}

impl Dispatcher {
    pub fn new(
        registry: ProviderRegistry,
        options: DispatchOptions,
        checkpoint: Option<CheckpointStore>,
    ) -> Self {
        Self {
            options,
            shared: Arc::new(Shared {
                registry,
                state: Mutex::new(DispatchState::default()),
                checkpoint: checkpoint.map(Arc::new),
                progress: RwLock::new(None),
                last_emitted: Mutex::new(0),
                pause: PauseHandle::default(),
            }),
        }
    }

    pub fn options(&self) -> DispatchOptions {
        self.options
    }

    pub fn set_progress_sink(&self, sink: Arc<dyn ProgressSink>) {
        *self.shared.progress.write() = Some(sink);
    }

    pub fn pause_handle(&self) -> PauseHandle {
        self.shared.pause.clone()
    }

    /// Replace in-memory state with the stored checkpoint, if there is a usable one.
    ///
    /// Items that were in flight when the checkpoint was written go back to the queue
    /// without spending a retry.
    pub fn restore(&self) -> Option<RestoreSummary> {
        let store = self.shared.checkpoint.as_ref()?;
        let checkpoint = store.load()?;
        let (mut state, summary) = DispatchState::from_checkpoint(checkpoint);
        {
            let mut current = self.shared.state.lock();
            state.progress_stamp = current.progress_stamp;
            *current = state;
        }
        info!(
            path = %store.path().display(),
            pending = summary.pending,
            requeued_in_flight = summary.requeued_in_flight,
            completed = summary.completed,
            failed = summary.failed,
            "Resumed from checkpoint"
        );
        Some(summary)
    }

    /// Queue items. Ids already known to this dispatcher are ignored.
    pub fn admit(&self, items: impl IntoIterator<Item = WorkItem>) -> Vec<WorkItemId> {
        let mut admitted = Vec::new();
        let mut state = self.shared.state.lock();
        for mut item in items {
            if !state.known.insert(item.id.clone()) {
                debug!(item_id = %item.id, "Work item already known, not admitted");
                continue;
            }
            item.status = ProcessingStatus::Pending;
            item.sequence = state.next_sequence;
            state.next_sequence += 1;
            state.stats.total += 1;
            admitted.push(item.id.clone());
            state.queue.push(item);
        }
        debug!(admitted = admitted.len(), pending = state.queue.len(), "Work items admitted");
        admitted
    }

    /// Turn product rows into work items and queue them.
    pub fn admit_products(
        &self,
        products: &[ProductRecord],
        defaults: &GenerationDefaults,
    ) -> Vec<WorkItemId> {
        let max_retries = self.options.max_retries;
        self.admit(
            products
                .iter()
                .map(|p| WorkItem::from_product(p, defaults, max_retries)),
        )
    }

    /// Run until the queue is drained (or a pause lets the workers stop) and all
    /// in-flight items have finished.
    pub async fn run(&self) -> BatchResults {
        let workers = {
            let mut state = self.shared.state.lock();
            if state.stats.start_time.is_none() {
                state.stats.start_time = Some(Utc::now());
            }
            state.stats.end_time = None;
            state.peak_in_flight = state.in_flight.len();
            self.options.concurrency.max(1).min(state.queue.len())
        };
        info!(
            workers,
            concurrency = self.options.concurrency,
            providers = self.shared.registry.len(),
            "Dispatch started"
        );

        let handles: Vec<_> = (0..workers)
            .map(|worker_id| tokio::spawn(worker_loop(worker_id, Arc::clone(&self.shared))))
            .collect();
        for joined in join_all(handles).await {
            if let Err(e) = joined {
                error!(error = %e, "Dispatch worker aborted");
            }
        }

        let (results, drained, final_checkpoint, progress) = {
            let mut state = self.shared.state.lock();
            state.stats.end_time = Some(Utc::now());
            let drained = state.queue.is_empty() && state.in_flight.is_empty();
            let results = ResultAggregator::aggregate(&state.completed, &state.failed, &[]);
            let checkpoint = if drained { None } else { Some(state.next_checkpoint()) };
            (results, drained, checkpoint, state.stamped_progress())
        };

        if let Some(store) = &self.shared.checkpoint {
            if drained {
                if let Err(e) = store.remove() {
                    warn!(path = %store.path().display(), error = %e, "Failed to remove checkpoint");
                }
            } else if let Some(checkpoint) = final_checkpoint {
                persist(Arc::clone(store), checkpoint).await;
            }
        }
        self.shared.emit(&progress);
        let progress = progress.snapshot;

        info!(
            processed = progress.processed,
            success = progress.success,
            failed = progress.failed,
            retries = progress.retries,
            pending = progress.pending,
            total_cost = progress.total_cost,
            paused = !drained,
            "Dispatch finished"
        );
        results
    }

    pub fn statistics(&self) -> StatisticsReport {
        self.shared.state.lock().stats.report(Utc::now())
    }

    pub fn queue_status(&self) -> QueueStatus {
        let state = self.shared.state.lock();
        QueueStatus {
            pending: state.queue.len(),
            in_flight: state.in_flight.len(),
            completed: state.completed.len(),
            failed: state.failed.len(),
            peak_in_flight: state.peak_in_flight,
            paused: self.shared.pause.is_paused(),
        }
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.shared.state.lock().progress()
    }

    /// Consistent copy of all four collections and the counters.
    pub fn snapshot(&self) -> Checkpoint {
        self.shared.state.lock().snapshot()
    }
}

impl Shared {
    /// Deliver a snapshot unless a newer one already went out.
    fn emit(&self, progress: &Stamped) {
        let Some(sink) = self.progress.read().clone() else {
            return;
        };
        let mut last = self.last_emitted.lock();
        if progress.stamp <= *last {
            debug!(stamp = progress.stamp, last = *last, "Dropping stale progress snapshot");
            return;
        }
        *last = progress.stamp;
        sink.on_progress(&progress.snapshot);
    }

    /// Pop the next item and move it into the in-flight set.
    fn begin_next(&self) -> Option<(WorkItem, Stamped)> {
        let mut state = self.state.lock();
        let mut item = state.queue.pop()?;
        item.mark_in_progress();
        state.in_flight.insert(item.id.clone(), item.clone());
        state.peak_in_flight = state.peak_in_flight.max(state.in_flight.len());
        Some((item, state.stamped_progress()))
    }

    /// Apply the attempt's outcome and publish the item to its next collection.
    fn finish(
        &self,
        mut item: WorkItem,
        outcome: Result<GenerationResult, ProviderError>,
    ) -> (Stamped, Option<Checkpoint>) {
        let mut state = self.state.lock();
        state.in_flight.remove(&item.id);

        match outcome {
            Ok(result) => {
                let cost = result.cost();
                item.mark_success(result);
                state.stats.success += 1;
                state.stats.processed += 1;
                state.stats.total_cost += cost;
                state.completed.push(item);
            }
            Err(err) => match item.record_failure(err.to_string()) {
                FailureOutcome::Requeued => {
                    state.stats.retries += 1;
                    state.queue.push(item);
                }
                FailureOutcome::Exhausted => {
                    state.stats.processed += 1;
                    state.stats.failed += 1;
                    state.failed.push(item);
                }
            },
        }

        let checkpoint = self.checkpoint.as_ref().map(|_| state.next_checkpoint());
        (state.stamped_progress(), checkpoint)
    }
}

async fn worker_loop(worker_id: usize, shared: Arc<Shared>) {
    debug!(worker_id, "Worker started");

    loop {
        if shared.pause.is_paused() {
            debug!(worker_id, "Pause requested, worker not taking new items");
            break;
        }
        let Some((item, progress)) = shared.begin_next() else {
            break;
        };
        shared.emit(&progress);
        process_item(worker_id, &shared, item).await;
    }

    debug!(worker_id, "Worker stopped");
}

async fn process_item(worker_id: usize, shared: &Shared, mut item: WorkItem) {
    let attempt = item.retry_count + 1;
    let started = Instant::now();

    let outcome = match select_provider(&shared.registry, &item.request) {
        Ok(provider) => {
            item.request.provider = Some(provider.kind());
            debug!(
                worker_id,
                item_id = %item.id,
                provider = %provider.kind(),
                attempt,
                priority = item.priority,
                "Dispatching work item"
            );
            AssertUnwindSafe(provider.generate(&item.request))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| {
                    Err(ProviderError::GenerationFailed(format!(
                        "Provider panicked: {}",
                        panic_message(&*panic)
                    )))
                })
        }
        Err(e) => Err(e),
    };
    let duration_ms = started.elapsed().as_millis() as u64;

    match &outcome {
        Ok(_) => info!(
            worker_id,
            item_id = %item.id,
            provider = ?item.request.provider,
            attempt,
            duration_ms,
            "Work item succeeded"
        ),
        Err(err) if attempt < item.max_retries => warn!(
            worker_id,
            item_id = %item.id,
            provider = ?item.request.provider,
            attempt,
            max_retries = item.max_retries,
            error = %err,
            "Work item attempt failed, re-queuing"
        ),
        Err(err) => error!(
            worker_id,
            item_id = %item.id,
            provider = ?item.request.provider,
            attempt,
            error = %err,
            "Work item failed permanently"
        ),
    }

    let (progress, checkpoint) = shared.finish(item, outcome);
    shared.emit(&progress);
    if let (Some(store), Some(checkpoint)) = (&shared.checkpoint, checkpoint) {
        persist(Arc::clone(store), checkpoint).await;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Write a checkpoint off the async workers. Failures are logged, never fatal.
async fn persist(store: Arc<CheckpointStore>, checkpoint: Checkpoint) {
    let revision = checkpoint.revision;
    let result = tokio::task::spawn_blocking(move || store.save(&checkpoint)).await;
    match result {
        Ok(Ok(_)) => {}
        Ok(Err(e)) => warn!(revision, error = %e, "Failed to write checkpoint"),
        Err(e) => warn!(revision, error = %e, "Checkpoint task aborted"),
    }
}
