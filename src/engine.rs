//! Dispatcher and run lifecycle
//!
//! [`ProbeEngine::start`] reads the input line by line, turns each line into a
//! task or a parse error, and feeds tasks to the elastic pool through a
//! channel of capacity one. Shutdown is ordered: the task channel closes,
//! the pool is joined, and only then can the outcome channel close and the
//! aggregator hand back the tally.

use crate::diagnostics::{self, DiagnosticSink};
use crate::{
    format_duration, Aggregator, Config, HttpProber, NullSink, PoolController, PoolState,
    PoolStats, ProbeError, ProbeMetrics, ProbeOutcome, ProbeTask, Prober, Tally, WorkerContext,
};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Outcomes buffered between workers and the aggregator.
const OUTCOME_CHANNEL_CAPACITY: usize = 256;

/// Cloneable trigger for [`ProbeEngine::stop`], safe to move into signal handlers.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    token: CancellationToken,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a stop. Calling it again has no further effect.
    pub fn stop(&self) {
        if !self.token.is_cancelled() {
            info!("Stop requested");
        }
        self.token.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.token.is_cancelled()
    }

    fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

pub struct ProbeEngine {
    config: Config,
    prober: Arc<dyn Prober>,
    sink: Arc<dyn DiagnosticSink>,
    metrics: Arc<ProbeMetrics>,
    stop: StopHandle,
    pool: Mutex<Option<Arc<PoolState>>>,
    tally: Mutex<Option<Tally>>,
}

impl ProbeEngine {
    /// Engine backed by a real HTTP client built from `config`.
    pub fn new(config: Config) -> Result<Self, ProbeError> {
        config.validate()?;
        let metrics = Arc::new(ProbeMetrics::new());
        let prober = HttpProber::with_metrics(&config, metrics.clone())?;
        Ok(Self::assemble(config, Arc::new(prober), metrics))
    }

    /// Engine that probes through any [`Prober`].
    pub fn with_prober(config: Config, prober: Arc<dyn Prober>) -> Result<Self, ProbeError> {
        config.validate()?;
        Ok(Self::assemble(config, prober, Arc::new(ProbeMetrics::new())))
    }

    fn assemble(config: Config, prober: Arc<dyn Prober>, metrics: Arc<ProbeMetrics>) -> Self {
        Self {
            config,
            prober,
            sink: Arc::new(NullSink),
            metrics,
            stop: StopHandle::new(),
            pool: Mutex::new(None),
            tally: Mutex::new(None),
        }
    }

    /// Per-URL diagnostic lines go to `sink` instead of being discarded.
    pub fn with_sink(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs until the input ends or a stop is requested, and returns the tally.
    pub async fn start<R>(&self, input: R) -> Tally
    where
        R: AsyncBufRead + Unpin,
    {
        let started = Instant::now();
        info!(
            "Starting probe run with up to {} workers",
            self.config.max_workers
        );

        let (task_tx, task_rx) = mpsc::channel::<ProbeTask>(1);
        let (outcome_tx, outcome_rx) = mpsc::channel(OUTCOME_CHANNEL_CAPACITY);
        let aggregator = Aggregator::new(outcome_rx, self.metrics.clone()).spawn();

        let tasks = Arc::new(tokio::sync::Mutex::new(task_rx));
        let context = WorkerContext {
            tasks: tasks.clone(),
            outcomes: outcome_tx.clone(),
            prober: self.prober.clone(),
            sink: self.sink.clone(),
            exit: self.stop.token(),
            idle_timeout: self.config.worker_idle_timeout,
        };
        let pool = PoolController::new(self.config.max_workers, context, self.metrics.clone());
        *lock(&self.pool) = Some(pool.state());

        let lines = self.dispatch(input, &pool, &task_tx, &outcome_tx).await;
        debug!("Dispatcher consumed {} lines", lines);

        drop(task_tx);
        let stats = pool.close().await;
        self.drain_leftovers(&tasks, &outcome_tx).await;
        drop(outcome_tx);

        let tally = match aggregator.await {
            Ok(tally) => tally,
            Err(e) => {
                error!("Aggregator task failed: {}", e);
                Tally::new()
            }
        };

        info!(
            "Probe run finished in {}: {} outcomes, {} workers spawned (peak {})",
            format_duration(started.elapsed()),
            tally.total(),
            stats.spawned,
            stats.peak
        );

        *lock(&self.tally) = Some(tally.clone());
        tally
    }

    async fn dispatch<R>(
        &self,
        mut input: R,
        pool: &PoolController,
        tasks: &mpsc::Sender<ProbeTask>,
        outcomes: &mpsc::Sender<ProbeOutcome>,
    ) -> usize
    where
        R: AsyncBufRead + Unpin,
    {
        let stop = self.stop.token();
        let mut buf = Vec::new();
        let mut lines = 0;

        loop {
            buf.clear();
            let read = tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    debug!("Stopped while reading input");
                    break;
                }
                read = input.read_until(b'\n', &mut buf) => read,
            };

            match read {
                Ok(0) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("Failed to read input, treating as end of input: {}", e);
                    break;
                }
            }
            lines += 1;

            let text = String::from_utf8_lossy(&buf);
            let line = text.trim_end_matches(|c| c == '\n' || c == '\r');

            let task = match ProbeTask::parse(line) {
                Ok(task) => task,
                Err(e) => {
                    let outcome = ProbeOutcome::parse_error(line, e);
                    diagnostics::emit(self.sink.as_ref(), &outcome.diagnostic_line());
                    if let Err(e) = outcomes.send(outcome).await {
                        error!("Failed to record parse error: {}", e);
                    }
                    continue;
                }
            };

            pool.admit();

            let url = task.as_str().to_owned();
            tokio::select! {
                biased;
                _ = stop.cancelled() => {
                    debug!("Stopped before {} was handed off", url);
                    break;
                }
                sent = tasks.send(task) => {
                    if let Err(e) = sent {
                        error!("Task queue closed unexpectedly: {}", e);
                        break;
                    }
                }
            }

            pool.ensure_listener();
        }

        lines
    }

    /// Empties the task queue once every worker has been joined.
    ///
    /// After a stop, a task still buffered was never received by a worker and
    /// is dropped unprobed. Without a stop the queue is already empty here,
    /// since workers only leave on a closed channel or an empty queue.
    async fn drain_leftovers(
        &self,
        tasks: &tokio::sync::Mutex<mpsc::Receiver<ProbeTask>>,
        outcomes: &mpsc::Sender<ProbeOutcome>,
    ) {
        let mut receiver = tasks.lock().await;
        receiver.close();
        while let Ok(task) = receiver.try_recv() {
            if self.stop.is_stopped() {
                debug!("Dropping {} queued before stop", task.as_str());
                continue;
            }
            let outcome = self.prober.probe(&task).await;
            diagnostics::emit(self.sink.as_ref(), &outcome.diagnostic_line());
            if let Err(e) = outcomes.send(outcome).await {
                error!("Failed to report outcome: {}", e);
            }
        }
    }

    /// Requests a cooperative stop. Idempotent and non-blocking.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Final tally, available once `start` has returned.
    pub fn tally(&self) -> Option<Tally> {
        lock(&self.tally).clone()
    }

    pub fn pool_stats(&self) -> PoolStats {
        lock(&self.pool)
            .as_ref()
            .map(|state| state.stats())
            .unwrap_or_default()
    }
}

impl fmt::Display for ProbeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.tally() {
            Some(tally) => write!(f, "{tally}"),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
