//! Benchmark workloads and utilities for the sspool allocator.
//!
//! Provides pre-built pool profiles and a deterministic churn workload:
//!
//! - [`reference_pool`]: 1 MiB pool, the allocator's default size
//! - [`stress_pool`]: 16 MiB pool for long-running churn
//! - [`churn_ops`]: seeded sequence of allocate/release operations
//! - [`run_churn`]: replays a workload against a pool and reports totals

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use sspool::{BlockHandle, Pool, PoolConfig, PoolError};
use tracing::debug;

/// Build a reference pool: 1 MiB, default alignment.
pub fn reference_pool() -> Pool {
    Pool::new(PoolConfig::default()).expect("default config is valid")
}

/// Build a stress pool: 16 MiB, default alignment.
pub fn stress_pool() -> Pool {
    Pool::with_capacity(16 << 20).expect("16 MiB config is valid")
}

/// One step of a churn workload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Op {
    /// Allocate this many bytes.
    Alloc(usize),
    /// Release the live allocation chosen by this value modulo the number
    /// of live allocations at replay time.
    Free(usize),
}

/// Generate a deterministic churn workload.
///
/// Sizes are drawn uniformly from `1..=max_size`. `free_ratio` is the
/// probability that a step releases instead of allocating.
pub fn churn_ops(seed: u64, len: usize, max_size: usize, free_ratio: f64) -> Vec<Op> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..len)
        .map(|_| {
            if rng.random_bool(free_ratio) {
                Op::Free(rng.random::<u32>() as usize)
            } else {
                Op::Alloc(rng.random_range(1..=max_size))
            }
        })
        .collect()
}

/// Outcome of [`run_churn`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChurnReport {
    /// Successful allocations.
    pub allocs: usize,
    /// Successful releases.
    pub frees: usize,
    /// Allocations rejected with [`PoolError::OutOfMemory`].
    pub out_of_memory: usize,
    /// Most allocations live at once.
    pub peak_live: usize,
}

/// Replay `ops` against `pool`, keeping live handles in `live`.
///
/// `Free` steps with no live allocation are skipped. Any error other than
/// out-of-memory is returned immediately.
pub fn run_churn(
    pool: &mut Pool,
    ops: &[Op],
    live: &mut Vec<BlockHandle>,
) -> Result<ChurnReport, PoolError> {
    let mut report = ChurnReport::default();
    for &op in ops {
        match op {
            Op::Alloc(size) => match pool.allocate(size) {
                Ok(Some(handle)) => {
                    live.push(handle);
                    report.allocs += 1;
                    report.peak_live = report.peak_live.max(live.len());
                }
                Ok(None) => {}
                Err(PoolError::OutOfMemory { .. }) => report.out_of_memory += 1,
                Err(other) => return Err(other),
            },
            Op::Free(pick) => {
                if live.is_empty() {
                    continue;
                }
                let handle = live.swap_remove(pick % live.len());
                pool.deallocate(handle)?;
                report.frees += 1;
            }
        }
    }
    debug!(?report, "churn finished");
    Ok(report)
}

/// Release every handle in `live`, oldest first.
pub fn drain(pool: &mut Pool, live: &mut Vec<BlockHandle>) -> Result<(), PoolError> {
    for handle in live.drain(..) {
        pool.deallocate(handle)?;
    }
    Ok(())
}
