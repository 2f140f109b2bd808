//! CPU worker scanning shards of the iteration range.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::search::{SearchParams, SearchResult, CHECK_INTERVAL};

#[derive(Debug, Default)]
pub struct WorkerStats {
    pub iterations_tried: AtomicU64,
    pub matches_found: AtomicU64,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn total_iterations(&self) -> u64 {
        self.iterations_tried.load(Ordering::Relaxed)
    }
    pub fn total_matches(&self) -> u64 {
        self.matches_found.load(Ordering::Relaxed)
    }
}

/// A fully scanned shard and its lowest match, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardReport {
    pub shard: u64,
    pub hit: Option<SearchResult>,
}

/// Shard assignment state shared by all workers of one pool.
#[derive(Debug)]
pub(crate) struct ShardQueue {
    pub next: AtomicU64,
    pub total: u64,
    pub size: u64,
    /// Lowest shard known to hold a match; shards above it are not claimed.
    pub ceiling: AtomicU64,
}

impl ShardQueue {
    pub fn new(total: u64, size: u64) -> Self {
        Self {
            next: AtomicU64::new(0),
            total,
            size,
            ceiling: AtomicU64::new(u64::MAX),
        }
    }

    fn claim(&self) -> Option<u64> {
        let shard = self.next.fetch_add(1, Ordering::Relaxed);
        (shard < self.total && shard <= self.ceiling.load(Ordering::Acquire)).then_some(shard)
    }
}

pub struct CpuWorker {
    id: usize,
    params: Arc<SearchParams>,
    queue: Arc<ShardQueue>,
    report_tx: Sender<ShardReport>,
    stop_flag: Arc<AtomicBool>,
    stats: Arc<WorkerStats>,
}

impl CpuWorker {
    pub(crate) fn new(
        id: usize,
        params: Arc<SearchParams>,
        queue: Arc<ShardQueue>,
        report_tx: Sender<ShardReport>,
        stop_flag: Arc<AtomicBool>,
        stats: Arc<WorkerStats>,
    ) -> Self {
        Self {
            id,
            params,
            queue,
            report_tx,
            stop_flag,
            stats,
        }
    }

    /// Claims and scans shards until the range is exhausted, a lower shard
    /// has matched, or the stop flag is raised.
    pub fn run(&self) {
        while !self.stop_flag.load(Ordering::Relaxed) {
            let Some(shard) = self.queue.claim() else {
                break;
            };
            let Some(hit) = self.scan(shard) else {
                // Interrupted mid-shard; an incomplete shard is never reported.
                break;
            };
            if hit.is_some() {
                self.stats.matches_found.fetch_add(1, Ordering::Relaxed);
                self.queue.ceiling.fetch_min(shard, Ordering::AcqRel);
            }
            log::trace!("worker {} finished shard {} (hit: {})", self.id, shard, hit.is_some());
            if self.report_tx.send(ShardReport { shard, hit }).is_err() {
                break;
            }
        }
    }

    /// Scans one shard in order. Returns `None` if stopped before finishing.
    fn scan(&self, shard: u64) -> Option<Option<SearchResult>> {
        let start = self.params.starting_iteration + shard * self.queue.size;
        let end = start.saturating_add(self.queue.size).min(self.params.end());

        let mut batch = 0u64;
        for iteration in start..end {
            if let Some(result) = self.params.evaluate(iteration) {
                self.stats
                    .iterations_tried
                    .fetch_add(batch + 1, Ordering::Relaxed);
                return Some(Some(result));
            }
            batch += 1;
            if batch == CHECK_INTERVAL {
                self.stats.iterations_tried.fetch_add(batch, Ordering::Relaxed);
                batch = 0;
                if self.stop_flag.load(Ordering::Relaxed) {
                    return None;
                }
            }
        }
        self.stats.iterations_tried.fetch_add(batch, Ordering::Relaxed);
        Some(None)
    }
}
