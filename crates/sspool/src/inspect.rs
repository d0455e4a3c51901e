//! Read-only views of the block chain.
//!
//! [`Blocks`] walks the chain in address order and yields a [`BlockInfo`]
//! per block. [`PoolStats`] condenses one walk into counters suitable for
//! logging. Neither touches the pool's state.

use std::fmt;

use crate::header::BlockState;
use crate::pool::Pool;

/// One block of the chain, as seen by [`Pool::blocks`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    /// Buffer offset of the block header.
    pub offset: usize,
    /// Stored size: the requested length for an allocated block, the whole
    /// payload extent for a free block.
    pub size: usize,
    /// Payload bytes between the end of the header and the next block.
    pub extent: usize,
    /// Buffer offset one past the block's last byte.
    pub end: usize,
    /// Free or allocated.
    pub state: BlockState,
    /// Header offset of the next block, if any.
    pub next: Option<usize>,
    /// Header offset of the previous block, if any.
    pub prev: Option<usize>,
}

impl BlockInfo {
    /// Whether the block is available for allocation.
    pub fn is_free(&self) -> bool {
        self.state == BlockState::Free
    }
}

/// Iterator over the chain returned by [`Pool::blocks`].
///
/// Stops early rather than looping if a `next` link fails to move forward,
/// which can only happen after a caller has written past its payload.
pub struct Blocks<'a> {
    pool: &'a Pool,
    cursor: Option<usize>,
}

impl<'a> Blocks<'a> {
    pub(crate) fn new(pool: &'a Pool) -> Self {
        Self {
            pool,
            cursor: Some(0),
        }
    }
}

impl Iterator for Blocks<'_> {
    type Item = BlockInfo;

    fn next(&mut self) -> Option<BlockInfo> {
        let offset = self.cursor.take()?;
        let header = self.pool.read_header(offset)?;
        if header.next.is_some_and(|next| next > self.pool.capacity()) {
            return None;
        }
        self.cursor = header.next.filter(|&next| next > offset);
        let extent = self.pool.extent_of(offset, &header);
        Some(BlockInfo {
            offset,
            size: header.size,
            extent,
            end: offset + self.pool.aligned_header_size() + extent,
            state: header.state,
            next: header.next,
            prev: header.prev,
        })
    }
}

/// Point-in-time summary of a pool.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Total buffer size in bytes.
    pub capacity: usize,
    /// Blocks in the chain.
    pub blocks: usize,
    /// Free blocks in the chain.
    pub free_blocks: usize,
    /// Sum of free payload extents.
    pub free_bytes: usize,
    /// Largest free payload extent.
    pub largest_free: usize,
    /// Payload bytes ever allocated.
    pub allocated_total: usize,
    /// Payload bytes ever released.
    pub deallocated_total: usize,
}

impl PoolStats {
    pub(crate) fn collect(pool: &Pool) -> Self {
        let mut stats = Self {
            capacity: pool.capacity(),
            allocated_total: pool.allocated_total(),
            deallocated_total: pool.deallocated_total(),
            ..Self::default()
        };
        for block in pool.blocks() {
            stats.blocks += 1;
            if block.is_free() {
                stats.free_blocks += 1;
                stats.free_bytes += block.extent;
                stats.largest_free = stats.largest_free.max(block.extent);
            }
        }
        stats
    }

    /// Payload bytes currently held by callers.
    pub fn live_bytes(&self) -> usize {
        self.allocated_total - self.deallocated_total
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} blocks ({} free), {}/{} bytes free, largest {}, live {}",
            self.blocks,
            self.free_blocks,
            self.free_bytes,
            self.capacity,
            self.largest_free,
            self.live_bytes()
        )
    }
}
