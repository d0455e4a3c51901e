//! sspool quickstart: one pool, a handful of allocations.
//!
//! Demonstrates:
//!   1. Creating a pool from a `PoolConfig`
//!   2. Allocating a 4-byte block and storing an `i32` in it
//!   3. Reading the value back through the handle
//!   4. Releasing the block and inspecting the pool's counters
//!   5. Fragmenting the pool and watching coalescing merge it back
//!
//! Run with:
//!   RUST_LOG=sspool=trace cargo run --example quickstart

use sspool::{Pool, PoolConfig};
use tracing_subscriber::EnvFilter;

// ─── Pool parameters ────────────────────────────────────────────

const CAPACITY: usize = 1024;
const VALUE: i32 = 34;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut pool = Pool::new(PoolConfig::new(CAPACITY))?;
    println!("created: {pool:?}");

    // ── Store and read back one value ───────────────────────────

    let Some(handle) = pool.allocate(size_of::<i32>())? else {
        return Err("zero-byte request".into());
    };
    pool.payload_mut(handle)?.copy_from_slice(&VALUE.to_ne_bytes());
    let stored = i32::from_ne_bytes(pool.payload(handle)?.try_into()?);
    println!("{handle} holds {stored}");

    pool.deallocate(handle)?;
    println!(
        "allocated {} bytes, released {} bytes",
        pool.allocated_total(),
        pool.deallocated_total()
    );

    // ── Fragment, then release everything ───────────────────────

    let mut handles = Vec::new();
    for size in [32, 64, 16, 128, 8] {
        if let Some(h) = pool.allocate(size)? {
            handles.push(h);
        }
    }
    // Free every other block first so the holes are not adjacent.
    for h in handles.iter().step_by(2) {
        pool.deallocate(*h)?;
    }
    println!("fragmented: {}", pool.stats());
    for block in pool.blocks() {
        println!(
            "  @{:>4} {:?} size={} extent={}",
            block.offset, block.state, block.size, block.extent
        );
    }

    for h in handles.iter().skip(1).step_by(2) {
        pool.deallocate(*h)?;
    }
    println!("coalesced: {}", pool.stats());

    Ok(())
}
