//! Parallel salt search.
//!
//! The iteration range is cut into fixed-size shards handed out in
//! increasing order. Workers report every completed shard; the pool only
//! accepts a match once every lower shard has reported, so the lowest
//! matching iteration always wins.

mod cpu;
mod pool;

pub use cpu::{CpuWorker, ShardReport, WorkerStats};
pub use pool::{ShardLedger, WorkerPool};
