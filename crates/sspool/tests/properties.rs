//! Integration test: allocator contract.
//!
//! Covers alignment, counters, non-overlap, rejection of bad handles,
//! full coalescing after any release order, partial-release sizing, and the
//! fixed-capacity exhaustion scenario.

use sspool::{BlockHandle, BlockState, Pool, PoolConfig, PoolError, HEADER_SIZE};
use sspool_test_utils::{assert_chain, assert_single_free_block, fill, stamp, stamp_intact};

/// Header size for the default alignment.
const H: usize = HEADER_SIZE;

fn snapshot(pool: &Pool) -> Vec<sspool::BlockInfo> {
    pool.blocks().collect()
}

fn allocate_all(pool: &mut Pool, sizes: &[usize]) -> Vec<BlockHandle> {
    sizes
        .iter()
        .map(|&n| pool.allocate(n).unwrap().unwrap())
        .collect()
}

// ── Allocation ──────────────────────────────────────────────────────

#[test]
fn allocations_are_aligned_counted_and_disjoint() {
    let mut pool = Pool::new(PoolConfig::new(16 * 1024).with_alignment(16)).unwrap();
    let sizes = [1, 7, 16, 33, 100, 250, 512, 3, 64, 1000];
    let mut handles = Vec::new();
    let mut expected_total = 0;

    for (tag, &n) in sizes.iter().enumerate() {
        let h = pool.allocate(n).unwrap().unwrap();
        expected_total += n;
        assert!(h.is_aligned_to(16), "{h} not aligned");
        assert_eq!(pool.allocated_total(), expected_total);
        assert!(h.addr() >= pool.base_addr());
        assert!(h.addr() + n <= pool.base_addr() + pool.capacity());
        stamp(&mut pool, h, tag);
        handles.push((h, n));
    }

    // Every payload still holds its own stamp, so no two regions overlap.
    for (tag, &(h, _)) in handles.iter().enumerate() {
        assert!(stamp_intact(&pool, h, tag), "payload {tag} was overwritten");
    }
    let mut ranges: Vec<_> = handles.iter().map(|&(h, n)| (h.addr(), h.addr() + n)).collect();
    ranges.sort_unstable();
    for pair in ranges.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "overlap between {pair:?}");
    }
    assert_chain(&pool);
}

#[test]
fn zero_sized_request_changes_nothing() {
    let mut pool = Pool::with_capacity(1024).unwrap();
    let _keep = pool.allocate(64).unwrap().unwrap();
    let before = snapshot(&pool);
    assert_eq!(pool.allocate(0), Ok(None));
    assert_eq!(snapshot(&pool), before);
    assert_eq!(pool.allocated_total(), 64);
}

#[test]
fn oversized_request_fails_and_leaves_chain() {
    let mut pool = Pool::with_capacity(1024).unwrap();
    let _keep = pool.allocate(64).unwrap().unwrap();
    let before = snapshot(&pool);
    for n in [1024, 1024 - H + 1, 4096, usize::MAX / 2] {
        assert!(matches!(
            pool.allocate(n),
            Err(PoolError::RequestTooLarge { .. })
        ));
    }
    assert_eq!(snapshot(&pool), before);
}

// ── Bad handles ─────────────────────────────────────────────────────

#[test]
fn foreign_handles_fail_and_leave_chain() {
    let mut pool = Pool::with_capacity(1024).unwrap();
    let mut other = Pool::with_capacity(1024).unwrap();
    let a = pool.allocate(64).unwrap().unwrap();
    let _b = pool.allocate(64).unwrap().unwrap();
    let foreign = other.allocate(64).unwrap().unwrap();
    let before = snapshot(&pool);

    assert!(matches!(
        pool.deallocate(foreign),
        Err(PoolError::PointerOutOfRange { .. })
    ));
    for addr in [a.addr() + 1, a.addr() + 8, a.addr() + 64 + H + 8] {
        assert!(matches!(
            pool.deallocate(BlockHandle::from_addr(addr)),
            Err(PoolError::DoubleFreeOrInvalidPointer { .. })
        ));
    }
    // The free tail block's payload address was never handed out.
    let tail = pool.blocks().last().unwrap();
    let tail_addr = pool.base_addr() + tail.offset + H;
    assert!(matches!(
        pool.deallocate(BlockHandle::from_addr(tail_addr)),
        Err(PoolError::DoubleFreeOrInvalidPointer { .. })
    ));

    assert_eq!(snapshot(&pool), before);
    assert_eq!(pool.deallocated_total(), 0);
    other.deallocate(foreign).unwrap();
}

#[test]
fn second_release_is_double_free() {
    let mut pool = Pool::with_capacity(1024).unwrap();
    let handles = allocate_all(&mut pool, &[32, 32, 32]);
    pool.deallocate(handles[1]).unwrap();
    let before = snapshot(&pool);
    assert_eq!(
        pool.deallocate(handles[1]),
        Err(PoolError::DoubleFreeOrInvalidPointer {
            addr: handles[1].addr()
        })
    );
    assert_eq!(snapshot(&pool), before);
}

// ── Coalescing ──────────────────────────────────────────────────────

fn round_trip(order: impl FnOnce(Vec<BlockHandle>) -> Vec<BlockHandle>) {
    let mut pool = Pool::with_capacity(8 * 1024).unwrap();
    let sizes: Vec<usize> = (1..=24).map(|i| i * 11).collect();
    let handles = allocate_all(&mut pool, &sizes);
    for handle in order(handles) {
        pool.deallocate(handle).unwrap();
        assert_chain(&pool);
    }
    assert_single_free_block(&pool);
    assert_eq!(pool.deallocated_total(), pool.allocated_total());
    assert_eq!(pool.allocated_total(), sizes.iter().sum::<usize>());
}

#[test]
fn round_trip_ascending() {
    round_trip(|handles| handles);
}

#[test]
fn round_trip_descending() {
    round_trip(|mut handles| {
        handles.reverse();
        handles
    });
}

#[test]
fn round_trip_interleaved() {
    round_trip(|handles| {
        // Every other block first, then the gaps between them back to front.
        let evens = handles.iter().step_by(2);
        let odds = handles.iter().skip(1).step_by(2).rev();
        let order: Vec<BlockHandle> = evens.chain(odds).copied().collect();
        order
    });
}

#[test]
fn round_trip_outside_in() {
    round_trip(|mut handles| {
        let mut order = Vec::with_capacity(handles.len());
        while !handles.is_empty() {
            order.push(handles.remove(0));
            if let Some(last) = handles.pop() {
                order.push(last);
            }
        }
        order
    });
}

#[test]
fn releasing_first_half_coalesces_into_one_block() {
    const N: usize = 10;
    const SIZE: usize = 48;
    let mut pool = Pool::with_capacity(4096).unwrap();
    let handles = allocate_all(&mut pool, &[SIZE; N]);
    for &h in &handles[..N / 2] {
        pool.deallocate(h).unwrap();
    }

    let blocks = snapshot(&pool);
    assert_eq!(blocks[0].state, BlockState::Free);
    assert_eq!(blocks[0].size, (N / 2 - 1) * H + (N / 2) * SIZE);
    assert_eq!(blocks[1].state, BlockState::Allocated);
    assert_eq!(pool.base_addr() + blocks[1].offset + H, handles[N / 2].addr());
    assert_chain(&pool);
}

#[test]
fn multi_hop_merge_spans_every_free_neighbour() {
    let mut pool = Pool::with_capacity(4096).unwrap();
    let handles = allocate_all(&mut pool, &[32; 7]);
    // Leave 0 and 6 allocated; free 1..=5 so the last release touches free
    // blocks on both sides.
    for &i in &[1, 3, 5, 2] {
        pool.deallocate(handles[i]).unwrap();
    }
    pool.deallocate(handles[4]).unwrap();

    let blocks = snapshot(&pool);
    assert_eq!(blocks.len(), 4);
    assert_eq!(blocks[1].state, BlockState::Free);
    assert_eq!(blocks[1].size, 5 * 32 + 4 * H);
    assert_eq!(blocks[1].prev, Some(blocks[0].offset));
    assert_eq!(blocks[1].next, Some(blocks[2].offset));
    assert_eq!(blocks[2].prev, Some(blocks[1].offset));
    assert_chain(&pool);
}

// ── Exhaustion scenario ─────────────────────────────────────────────

#[test]
fn eight_object_pool_exhausts_and_merges_neighbours() {
    const OBJECT: usize = 32;
    // Exactly eight 32-byte objects with their headers.
    let mut pool = Pool::with_capacity(8 * (OBJECT + H)).unwrap();
    let handles: Vec<_> = (0..8)
        .map(|_| pool.allocate(OBJECT).unwrap().unwrap())
        .collect();

    assert_eq!(
        pool.allocate(OBJECT),
        Err(PoolError::OutOfMemory {
            requested: OBJECT,
            largest_free: 0,
        })
    );

    pool.deallocate(handles[2]).unwrap();
    pool.deallocate(handles[3]).unwrap();

    let free: Vec<_> = pool.blocks().filter(|b| b.is_free()).collect();
    assert_eq!(free.len(), 1);
    assert_eq!(free[0].size, 2 * OBJECT + H);
    assert_eq!(pool.base_addr() + free[0].offset + H, handles[2].addr());

    // The merged hole takes a request that needs both slots.
    let wide = pool.allocate(2 * OBJECT + H).unwrap().unwrap();
    assert_eq!(wide, handles[2]);
    assert_chain(&pool);
}

#[test]
fn fill_then_reset_is_reusable() {
    let mut pool = Pool::with_capacity(2048).unwrap();
    let first = fill(&mut pool, 40);
    pool.reset();
    assert_single_free_block(&pool);
    let second = fill(&mut pool, 40);
    assert_eq!(first, second);
    assert_eq!(pool.allocated_total(), 40 * second.len());
}
