//! Elastic worker pool
//!
//! The live worker count is the single source of truth for pool size. Every
//! change to it happens under one lock, and a worker may only retire when
//! doing so cannot strand a task that has already been handed to the queue.

use crate::{ProbeMetrics, ProbeWorker, WorkerContext};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

/// Snapshot of pool bookkeeping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub live: usize,
    pub peak: usize,
    pub spawned: usize,
    pub max: usize,
}

pub struct PoolState {
    live: Mutex<usize>,
    max: usize,
    peak: AtomicUsize,
    spawned: AtomicUsize,
    metrics: Arc<ProbeMetrics>,
}

impl PoolState {
    pub fn new(max: usize, metrics: Arc<ProbeMetrics>) -> Self {
        Self {
            live: Mutex::new(0),
            max,
            peak: AtomicUsize::new(0),
            spawned: AtomicUsize::new(0),
            metrics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        self.live.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claims a slot if the pool is below its maximum.
    pub fn try_acquire(self: &Arc<Self>) -> Option<WorkerSlot> {
        let mut live = self.lock();
        if *live >= self.max {
            return None;
        }
        Some(self.claim(&mut live))
    }

    /// Claims a slot only if no worker is alive at all.
    pub fn acquire_if_empty(self: &Arc<Self>) -> Option<WorkerSlot> {
        let mut live = self.lock();
        if *live > 0 {
            return None;
        }
        Some(self.claim(&mut live))
    }

    fn claim(self: &Arc<Self>, live: &mut usize) -> WorkerSlot {
        *live += 1;
        self.peak.fetch_max(*live, Ordering::Relaxed);
        let id = self.spawned.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_worker_spawned(*live);

        WorkerSlot {
            id,
            state: self.clone(),
            released: false,
        }
    }

    fn release(&self, idle_retired: bool) -> usize {
        let mut live = self.lock();
        *live = live.saturating_sub(1);
        self.metrics.record_worker_exit(*live, idle_retired);
        *live
    }

    pub fn live(&self) -> usize {
        *self.lock()
    }

    pub fn max(&self) -> usize {
        self.max
    }

    pub fn stats(&self) -> PoolStats {
        let live = self.lock();
        PoolStats {
            live: *live,
            peak: self.peak.load(Ordering::Relaxed),
            spawned: self.spawned.load(Ordering::Relaxed),
            max: self.max,
        }
    }
}

/// One unit of the live count, held by a running worker.
///
/// Dropping the slot gives the unit back, so a worker that ends for any
/// reason, panics included, is removed from the count exactly once.
pub struct WorkerSlot {
    id: usize,
    state: Arc<PoolState>,
    released: bool,
}

impl WorkerSlot {
    pub fn id(&self) -> usize {
        self.id
    }

    /// Gives the slot back if `can_leave` holds, checked under the pool lock.
    pub fn retire_if(&mut self, can_leave: impl FnOnce() -> bool) -> bool {
        if self.released {
            return true;
        }

        let mut live = self.state.lock();
        if !can_leave() {
            return false;
        }
        *live = live.saturating_sub(1);
        self.state.metrics.record_worker_exit(*live, true);
        drop(live);

        self.released = true;
        debug!("Worker {} retired after idle timeout", self.id);
        true
    }
}

impl Drop for WorkerSlot {
    fn drop(&mut self) {
        if !self.released {
            self.released = true;
            self.state.release(false);
        }
    }
}

/// Spawns workers on demand and waits for them at the end of a run.
pub struct PoolController {
    state: Arc<PoolState>,
    context: WorkerContext,
    tracker: TaskTracker,
}

impl PoolController {
    pub fn new(max_workers: usize, context: WorkerContext, metrics: Arc<ProbeMetrics>) -> Self {
        Self {
            state: Arc::new(PoolState::new(max_workers, metrics)),
            context,
            tracker: TaskTracker::new(),
        }
    }

    pub fn state(&self) -> Arc<PoolState> {
        self.state.clone()
    }

    /// Starts one more worker if the pool has room. Returns whether it did.
    pub fn admit(&self) -> bool {
        match self.state.try_acquire() {
            Some(slot) => {
                self.spawn(slot);
                true
            }
            None => false,
        }
    }

    /// Makes sure at least one worker is listening on the task queue.
    pub fn ensure_listener(&self) -> bool {
        match self.state.acquire_if_empty() {
            Some(slot) => {
                debug!("No live workers, starting a listener");
                self.spawn(slot);
                true
            }
            None => false,
        }
    }

    fn spawn(&self, slot: WorkerSlot) {
        let worker = ProbeWorker::new(slot, self.context.clone());
        self.tracker.spawn(worker.run());
    }

    pub fn stats(&self) -> PoolStats {
        self.state.stats()
    }

    /// Waits for every spawned worker to finish, then releases the shared
    /// context so the outcome channel can close behind them.
    pub async fn close(self) -> PoolStats {
        let Self {
            state,
            context,
            tracker,
        } = self;

        tracker.close();
        tracker.wait().await;
        drop(context);

        let stats = state.stats();
        info!(
            "Worker pool closed: {} spawned, peak {} of {}",
            stats.spawned, stats.peak, stats.max
        );
        stats
    }
}
