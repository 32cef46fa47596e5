//! The worker control core.
//!
//! One worker process runs three kinds of tasks:
//!
//! - a single lease-acquisition loop that polls the repository for
//!   partitions whose lease window has lapsed and spawns a watcher for each
//!   one it picks up;
//! - one watcher per leased partition, which polls for ready items, decides
//!   gate advancement and terminal status, renews the lease via an OCC save,
//!   and feeds items into a bounded queue;
//! - a fixed pool of dispatchers draining that queue into the processor.
//!
//! Workers on different machines coordinate only through the database.
//! Correctness rests on the version column, not on clocks: a worker that
//! sleeps past its lease and then writes simply loses the save and
//! relinquishes the partition.
//!
//! Shutdown is a drain, not an abort. Cancelling the token stops lease
//! acquisition, watchers finish their current poll, the queue closes once
//! the last watcher exits, and dispatchers complete every item still
//! buffered (including its final save) before the worker returns.

use std::collections::HashSet;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::model::{Item, Partition, Status};
use crate::processor::Processor;
use crate::repo::Repo;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_MAX_RETRIES: i64 = 5;

/// Floor applied to the lease duration unless explicitly overridden. A lease
/// shorter than ordinary polling jitter makes partitions flap between
/// owners.
pub const MIN_LEASE_DURATION: Duration = Duration::from_secs(30);

/// Worker tuning. Zero durations and empty strings mean "unset" and are
/// filled in by [`Worker::new`]: the lease interval defaults to twice the
/// poll interval, and the lease duration to twice the lease interval.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Identity stamped onto leased partitions. A fresh UUID when empty.
    pub owner_id: String,
    /// Dispatcher pool size and item queue capacity.
    pub batch_size: usize,
    /// How often each leased partition is polled for ready items.
    pub poll_interval: Duration,
    /// How often the repository is queried for acquirable partitions.
    pub lease_interval: Duration,
    /// Lease TTL written into `until` on every watcher save.
    pub lease_duration: Duration,
    pub min_lease_duration: Duration,
    pub override_min_lease_duration: bool,
    /// Never advance gates automatically. Useful when items are added to a
    /// partition continuously and checkpoints are driven externally.
    pub manual_checkpoint: bool,
    /// Mark a partition `Complete` once no items remain.
    pub auto_close: bool,
    /// Dispatch failures tolerated per item before it is marked `Failed`;
    /// -1 retries indefinitely.
    pub max_retries: i64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            owner_id: String::new(),
            batch_size: 0,
            poll_interval: Duration::ZERO,
            lease_interval: Duration::ZERO,
            lease_duration: Duration::ZERO,
            min_lease_duration: MIN_LEASE_DURATION,
            override_min_lease_duration: false,
            manual_checkpoint: false,
            auto_close: false,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl WorkerConfig {
    fn normalized(mut self) -> Self {
        if self.poll_interval.is_zero() {
            self.poll_interval = DEFAULT_POLL_INTERVAL;
        }
        if self.batch_size == 0 {
            self.batch_size = DEFAULT_BATCH_SIZE;
        }
        if self.owner_id.is_empty() {
            self.owner_id = Uuid::new_v4().to_string();
        }
        if self.lease_interval.is_zero() {
            self.lease_interval = self.poll_interval * 2;
        }
        if self.lease_duration.is_zero() {
            self.lease_duration = self.lease_interval * 2;
        }
        if self.lease_duration < self.min_lease_duration && !self.override_min_lease_duration {
            warn!(
                floor_secs = self.min_lease_duration.as_secs(),
                "lease duration below the recommended minimum; raising it"
            );
            self.lease_duration = self.min_lease_duration;
        }
        self
    }
}

/// A peer in the scheduler: leases partitions, watches them, and dispatches
/// their items to the processor.
pub struct Worker {
    repo: Arc<dyn Repo>,
    processor: Arc<dyn Processor>,
    config: WorkerConfig,
    leases: Arc<StdMutex<HashSet<String>>>,
}

impl Worker {
    pub fn new(repo: Arc<dyn Repo>, processor: Arc<dyn Processor>, config: WorkerConfig) -> Self {
        Self {
            repo,
            processor,
            config: config.normalized(),
            leases: Arc::new(StdMutex::new(HashSet::new())),
        }
    }

    /// The normalized configuration this worker runs with.
    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Run until the token is cancelled, then drain gracefully.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!(owner_id = %self.config.owner_id, "starting worker");

        let (item_tx, item_rx) = mpsc::channel::<Item>(self.config.batch_size);
        let item_rx = Arc::new(Mutex::new(item_rx));

        let mut dispatchers = Vec::with_capacity(self.config.batch_size);
        for _ in 0..self.config.batch_size {
            let repo = Arc::clone(&self.repo);
            let processor = Arc::clone(&self.processor);
            let rx = Arc::clone(&item_rx);
            let max_retries = self.config.max_retries;
            dispatchers.push(tokio::spawn(async move {
                dispatch_loop(repo, processor, rx, max_retries).await;
            }));
        }

        self.acquire_leases(&shutdown, item_tx).await;

        // The queue sender is gone; dispatchers finish whatever is buffered
        // and exit on the closed channel.
        for dispatcher in dispatchers {
            if let Err(err) = dispatcher.await {
                error!(error = %err, "dispatcher task panicked");
            }
        }
        info!(owner_id = %self.config.owner_id, "worker shut down");
    }

    /// Poll for acquirable partitions and spawn a watcher per new lease.
    /// Consumes the queue sender so the channel closes exactly when the last
    /// watcher has exited.
    async fn acquire_leases(&self, shutdown: &CancellationToken, item_tx: mpsc::Sender<Item>) {
        let mut ticker = interval(self.config.lease_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut watchers = JoinSet::new();

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.repo.potential_leases().await {
                        Ok(partitions) => {
                            for partition in partitions {
                                self.track_lease(partition, &mut watchers, &item_tx, shutdown);
                            }
                        }
                        // Not fatal: stay in the loop so the worker is
                        // eligible again the moment the database recovers.
                        Err(err) => error!(error = %err, "failed to query potential leases"),
                    }
                }
                _ = shutdown.cancelled() => break,
            }
        }

        while watchers.join_next().await.is_some() {}
        drop(item_tx);
    }

    fn track_lease(
        &self,
        partition: Partition,
        watchers: &mut JoinSet<()>,
        item_tx: &mpsc::Sender<Item>,
        shutdown: &CancellationToken,
    ) {
        let mut leases = self.leases.lock().expect("lease set mutex poisoned");
        if leases.contains(&partition.id) {
            // Our watcher is still running but the stored lease lapsed; the
            // watcher will either renew it or lose the OCC save.
            warn!(
                partition_id = %partition.id,
                "leased partition expired; consider raising the lease interval"
            );
            return;
        }
        leases.insert(partition.id.clone());
        drop(leases);

        debug!(partition_id = %partition.id, "acquired partition lease");
        let watcher = PartitionWatcher {
            repo: Arc::clone(&self.repo),
            config: self.config.clone(),
            leases: Arc::clone(&self.leases),
            item_tx: item_tx.clone(),
            shutdown: shutdown.clone(),
        };
        watchers.spawn(watcher.run(partition));
    }

    /// Probe the repository and the processor concurrently. Both failing
    /// yields one error wrapping the other.
    pub async fn healthcheck(&self) -> anyhow::Result<()> {
        let (repo_result, processor_result) =
            tokio::join!(self.repo.healthcheck(), self.processor.healthcheck());
        match (repo_result, processor_result) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(repo_err), Err(processor_err)) => {
                Err(anyhow::Error::new(repo_err).context(processor_err.to_string()))
            }
            (Err(repo_err), Ok(())) => Err(repo_err.into()),
            (Ok(()), Err(processor_err)) => Err(processor_err),
        }
    }
}

/// Per-partition control loop. Owns the in-memory partition while the lease
/// holds; every persisted change goes through the OCC save.
struct PartitionWatcher {
    repo: Arc<dyn Repo>,
    config: WorkerConfig,
    leases: Arc<StdMutex<HashSet<String>>>,
    item_tx: mpsc::Sender<Item>,
    shutdown: CancellationToken,
}

impl PartitionWatcher {
    async fn run(self, mut partition: Partition) {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !self.poll(&mut partition).await {
                        break;
                    }
                }
                _ = self.shutdown.cancelled() => break,
            }
        }

        self.leases
            .lock()
            .expect("lease set mutex poisoned")
            .remove(&partition.id);
        debug!(partition_id = %partition.id, "partition watcher stopped");
    }

    /// One poll cycle. Returns false when the watcher should relinquish the
    /// partition.
    async fn poll(&self, partition: &mut Partition) -> bool {
        // Free queue capacity is the fetch budget; a full queue fetches
        // nothing and backpressure falls through to the database.
        let budget = self.item_tx.capacity() as i64;
        let items = match self.repo.available_items(partition, budget).await {
            Ok(items) => items,
            Err(err) => {
                error!(partition_id = %partition.id, error = %err, "failed to query available items");
                return false;
            }
        };
        let counts = match self.repo.count_by_status(&partition.id).await {
            Ok(counts) => counts,
            Err(err) => {
                error!(partition_id = %partition.id, error = %err, "failed to count items by status");
                return false;
            }
        };

        let failed = counts.get(&Status::Failed).copied().unwrap_or(0);
        let available = counts.get(&Status::Available).copied().unwrap_or(0);

        if failed > 0 {
            warn!(
                partition_id = %partition.id,
                failed,
                "failures detected within partition; moving it to failed"
            );
            partition.status = Status::Failed;
        } else if available > 0 {
            partition.status = Status::Available;
            if items.is_empty() && !self.config.manual_checkpoint {
                self.maybe_advance_gate(partition).await;
            }
        } else if items.is_empty() && self.config.auto_close {
            info!(partition_id = %partition.id, "all items done; closing out partition");
            partition.status = Status::Complete;
        }

        partition.owner = self.config.owner_id.clone();
        partition.until = Utc::now() + self.config.lease_duration;
        if !self.repo.save_partition(partition).await {
            // Another worker took the lease, or the write was refused.
            warn!(partition_id = %partition.id, "lost partition lease on save; relinquishing");
            return false;
        }
        if !partition.active() {
            info!(
                partition_id = %partition.id,
                status = %partition.status,
                "partition no longer active"
            );
            return false;
        }

        for item in items {
            tokio::select! {
                sent = self.item_tx.send(item) => {
                    if sent.is_err() {
                        return false;
                    }
                }
                _ = self.shutdown.cancelled() => return false,
            }
        }
        true
    }

    /// Advance the gate only when the remaining available items all sit
    /// above it. The empty fetch alone cannot distinguish a drained gate
    /// from a zero budget or from items stranded below the barrier.
    async fn maybe_advance_gate(&self, partition: &mut Partition) {
        match self.repo.min_available_gate(&partition.id).await {
            Ok(Some(min_gate)) if min_gate > partition.gate => {
                info!(
                    partition_id = %partition.id,
                    gate = partition.gate,
                    next_gate = partition.gate + 1,
                    "gate drained; advancing checkpoint"
                );
                partition.gate += 1;
            }
            Ok(Some(min_gate)) if min_gate < partition.gate => {
                error!(
                    partition_id = %partition.id,
                    gate = partition.gate,
                    min_gate,
                    "available items stranded below the current gate; refusing to advance"
                );
            }
            Ok(_) => {}
            Err(err) => {
                warn!(
                    partition_id = %partition.id,
                    error = %err,
                    "failed to query minimum available gate"
                );
            }
        }
    }
}

/// Dispatcher body: drain the queue until it closes. Items already buffered
/// are processed to completion even during shutdown.
async fn dispatch_loop(
    repo: Arc<dyn Repo>,
    processor: Arc<dyn Processor>,
    item_rx: Arc<Mutex<mpsc::Receiver<Item>>>,
    max_retries: i64,
) {
    loop {
        let item = { item_rx.lock().await.recv().await };
        let Some(mut item) = item else { break };
        process_item(repo.as_ref(), processor.as_ref(), &mut item, max_retries).await;
    }
}

async fn process_item(
    repo: &dyn Repo,
    processor: &dyn Processor,
    item: &mut Item,
    max_retries: i64,
) {
    debug!(
        item_id = %item.id,
        partition_id = %item.partition_id,
        "dispatching item"
    );
    match processor.process(&item.data).await {
        Ok(response) => {
            if response.complete {
                item.status = Status::Complete;
            }
            item.gate = response.next_gate;
            item.data = response.data;
        }
        Err(err) => item.record_failure(&err, max_retries),
    }
    // A stale save here is fine: the item stays available and a later poll
    // redispatches it.
    if !repo.save_item(item).await {
        warn!(
            item_id = %item.id,
            partition_id = %item.partition_id,
            "failed to save item; it will be picked up again"
        );
    }
}
