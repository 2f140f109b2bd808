//! Worker pool and the shard ledger that resolves the lowest match.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};

use crate::search::{Progress, SearchOutcome, SearchParams, SearchResult, MIN_REPORT_INTERVAL};

use super::cpu::{CpuWorker, ShardQueue, ShardReport, WorkerStats};

/// Iterations per shard.
pub const SHARD_SIZE: u64 = 4096;

/// Upper bound on how long the coordinator sleeps between cancellation checks.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Collects shard reports in any order and decides the outcome once the
/// reported shards form a contiguous run from shard 0.
#[derive(Debug)]
pub struct ShardLedger {
    total: u64,
    /// First shard not yet covered by the contiguous run of reports.
    frontier: u64,
    pending: BTreeMap<u64, Option<SearchResult>>,
    resolved: Option<Option<SearchResult>>,
}

impl ShardLedger {
    pub fn new(total_shards: u64) -> Self {
        Self {
            total: total_shards,
            frontier: 0,
            pending: BTreeMap::new(),
            resolved: (total_shards == 0).then_some(None),
        }
    }

    pub fn record(&mut self, report: ShardReport) {
        if self.resolved.is_some() || report.shard < self.frontier {
            return;
        }
        self.pending.insert(report.shard, report.hit);
        while let Some(hit) = self.pending.remove(&self.frontier) {
            self.frontier += 1;
            if hit.is_some() {
                self.resolved = Some(hit);
                self.pending.clear();
                return;
            }
        }
        if self.frontier == self.total {
            self.resolved = Some(None);
        }
    }

    /// `Some(Some(_))` once the lowest match is certain, `Some(None)` once
    /// every shard came back empty, `None` while undecided.
    pub fn resolution(&self) -> Option<Option<SearchResult>> {
        self.resolved
    }

    /// Shards settled so far.
    pub fn frontier(&self) -> u64 {
        self.frontier
    }
}

pub struct WorkerPool {
    num_workers: usize,
    params: Arc<SearchParams>,
    handles: Option<Vec<JoinHandle<()>>>,
    report_rx: Receiver<ShardReport>,
    ledger: ShardLedger,
    stop_flag: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    stats: Arc<WorkerStats>,
    start_time: Instant,
}

impl WorkerPool {
    pub fn new(num_workers: usize, params: SearchParams) -> Self {
        Self::with_cancel(num_workers, params, Arc::new(AtomicBool::new(false)))
    }

    /// Spawns workers for a search that is abandoned once `cancel` is raised
    /// externally (e.g. from a Ctrl-C handler).
    pub fn with_cancel(num_workers: usize, params: SearchParams, cancel: Arc<AtomicBool>) -> Self {
        let num_workers = num_workers.max(1);
        let range = params.range_len();
        let total_shards = range / SHARD_SIZE + u64::from(range % SHARD_SIZE != 0);

        // Unbounded so that no worker can block on send while the pool joins.
        let (report_tx, report_rx) = unbounded();
        let params = Arc::new(params);
        let queue = Arc::new(ShardQueue::new(total_shards, SHARD_SIZE));
        let stats = Arc::new(WorkerStats::new());
        let stop_flag = Arc::new(AtomicBool::new(false));

        let handles = (0..num_workers)
            .map(|id| {
                let params = params.clone();
                let queue = queue.clone();
                let report_tx = report_tx.clone();
                let stop_flag = stop_flag.clone();
                let stats = stats.clone();

                thread::Builder::new()
                    .name(format!("create2-worker-{}", id))
                    .spawn(move || {
                        let worker =
                            CpuWorker::new(id, params, queue, report_tx, stop_flag, stats);
                        worker.run();
                    })
                    .expect("spawn worker")
            })
            .collect();

        drop(report_tx);

        Self {
            num_workers,
            params,
            handles: Some(handles),
            report_rx,
            ledger: ShardLedger::new(total_shards),
            stop_flag,
            cancel,
            stats,
            start_time: Instant::now(),
        }
    }

    /// Collects shard reports until the outcome is decided, the cancel flag
    /// is raised, or the timeout passes. Calls `on_progress` every
    /// `report_interval` while waiting.
    pub fn resolve(
        mut self,
        report_interval: Duration,
        on_progress: &mut dyn FnMut(Progress),
    ) -> SearchOutcome {
        let report_interval = report_interval.max(MIN_REPORT_INTERVAL);
        let deadline = self.params.timeout.map(|t| self.start_time + t);
        let mut last_report = Instant::now();

        let outcome = loop {
            if let Some(resolution) = self.ledger.resolution() {
                break self.outcome_of(resolution);
            }
            if self.is_cancelled() {
                break self.cancelled();
            }

            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                log::debug!("search deadline reached at shard {}", self.ledger.frontier());
                break self.cancelled();
            }
            let mut wait = report_interval
                .saturating_sub(now.duration_since(last_report))
                .min(POLL_INTERVAL);
            if let Some(d) = deadline {
                wait = wait.min(d.saturating_duration_since(now));
            }
            let wait = wait.max(Duration::from_millis(1));

            match self.report_rx.recv_timeout(wait) {
                Ok(report) => self.ledger.record(report),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    // Every worker has exited; an undecided ledger means some
                    // shard was abandoned.
                    break match self.ledger.resolution() {
                        Some(resolution) => self.outcome_of(resolution),
                        None => self.cancelled(),
                    };
                }
            }

            if last_report.elapsed() >= report_interval {
                last_report = Instant::now();
                on_progress(self.progress());
            }
        };

        self.join();
        outcome
    }

    /// First iteration not covered by the settled run of shards.
    pub fn resume_point(&self) -> u64 {
        let settled = self.ledger.frontier().saturating_mul(SHARD_SIZE);
        self.params.starting_iteration + settled.min(self.params.range_len())
    }

    fn cancelled(&self) -> SearchOutcome {
        SearchOutcome::Cancelled {
            searched: self.total_iterations(),
            resume_at: self.resume_point(),
        }
    }

    fn outcome_of(&self, resolution: Option<SearchResult>) -> SearchOutcome {
        match resolution {
            Some(result) => SearchOutcome::Found(result),
            None => SearchOutcome::Exhausted {
                searched: self.total_iterations(),
            },
        }
    }

    pub fn stop(&self) {
        self.stop_flag.store(true, Ordering::Relaxed);
    }

    pub fn join(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop();
        if let Some(h) = self.handles.take() {
            for handle in h {
                let _ = handle.join();
            }
        }
    }

    pub fn num_workers(&self) -> usize {
        self.num_workers
    }
    pub fn total_iterations(&self) -> u64 {
        self.stats.total_iterations()
    }
    pub fn total_matches(&self) -> u64 {
        self.stats.total_matches()
    }
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }
    pub fn progress(&self) -> Progress {
        Progress {
            iterations: self.total_iterations(),
            elapsed: self.elapsed(),
        }
    }
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
