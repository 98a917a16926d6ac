//! Probe workers
//!
//! Each worker pulls tasks from the shared queue, probes them and reports the
//! outcome. The loop ends in one of three ways: the queue closes and is
//! drained, no task arrives within the idle timeout and the pool lets the
//! worker retire, or the exit signal fires while the worker is waiting. A task
//! already received is always probed and reported first.

use crate::diagnostics::{self, DiagnosticSink};
use crate::{ProbeOutcome, ProbeTask, Prober, WorkerSlot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

/// Everything a worker shares with its siblings.
#[derive(Clone)]
pub struct WorkerContext {
    pub tasks: Arc<Mutex<mpsc::Receiver<ProbeTask>>>,
    pub outcomes: mpsc::Sender<ProbeOutcome>,
    pub prober: Arc<dyn Prober>,
    pub sink: Arc<dyn DiagnosticSink>,
    pub exit: CancellationToken,
    pub idle_timeout: Duration,
}

impl WorkerContext {
    /// True when no task is buffered, or another worker is already waiting for one.
    pub fn queue_is_idle(&self) -> bool {
        match self.tasks.try_lock() {
            Ok(receiver) => receiver.is_empty(),
            Err(_) => true,
        }
    }
}

/// Why a worker loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Task channel closed and drained.
    Drained,
    /// No task arrived within the idle timeout.
    Retired,
    /// The exit signal fired while waiting.
    Stopped,
}

pub struct ProbeWorker {
    slot: WorkerSlot,
    context: WorkerContext,
    processed: usize,
}

impl ProbeWorker {
    pub fn new(slot: WorkerSlot, context: WorkerContext) -> Self {
        Self {
            slot,
            context,
            processed: 0,
        }
    }

    pub fn id(&self) -> usize {
        self.slot.id()
    }

    pub async fn run(mut self) -> WorkerExit {
        debug!("Starting probe worker {}", self.id());

        let exit = loop {
            let next = tokio::select! {
                biased;
                _ = self.context.exit.cancelled() => break WorkerExit::Stopped,
                next = self.next_task() => next,
            };

            match next {
                Some(Some(task)) => self.handle(task).await,
                Some(None) => break WorkerExit::Drained,
                None => {
                    let context = &self.context;
                    if self.slot.retire_if(|| context.queue_is_idle()) {
                        break WorkerExit::Retired;
                    }
                }
            }
        };

        debug!(
            "Probe worker {} stopped ({:?}) after {} tasks",
            self.id(),
            exit,
            self.processed
        );
        exit
    }

    /// `None` when the idle timeout elapsed, `Some(None)` when the channel closed.
    async fn next_task(&self) -> Option<Option<ProbeTask>> {
        let tasks = &self.context.tasks;
        timeout(self.context.idle_timeout, async move {
            let mut receiver = tasks.lock().await;
            receiver.recv().await
        })
        .await
        .ok()
    }

    async fn handle(&mut self, task: ProbeTask) {
        debug!("Worker {} probing {}", self.id(), task.as_str());
        let outcome = self.context.prober.probe(&task).await;
        self.processed += 1;

        diagnostics::emit(self.context.sink.as_ref(), &outcome.diagnostic_line());

        if let Err(e) = self.context.outcomes.send(outcome).await {
            error!("Worker {} failed to report outcome: {}", self.id(), e);
        }
    }
}
