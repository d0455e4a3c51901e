//! Chain invariant checks and fixtures for sspool development.
//!
//! [`check_chain`] walks a pool's block chain and verifies every structural
//! invariant the allocator promises; the `assert_*` helpers wrap it for use
//! in tests. [`fill`] and the payload stamping helpers build common
//! scenarios.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::fmt;

use sspool::{BlockHandle, BlockInfo, Pool, PoolError};

/// A broken chain invariant, reported by [`check_chain`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainViolation {
    /// The chain yielded no blocks at all.
    Empty,
    /// The head block does not sit at offset 0 or has a predecessor.
    BadHead { offset: usize, prev: Option<usize> },
    /// A block does not start where the previous one ended.
    Gap { expected: usize, found: usize },
    /// A block start is not a multiple of the pool alignment.
    Misaligned { offset: usize, alignment: usize },
    /// A block's `prev` link does not name its predecessor.
    BrokenBackLink {
        offset: usize,
        expected: Option<usize>,
        found: Option<usize>,
    },
    /// An allocated block claims more payload than its extent.
    Oversized {
        offset: usize,
        size: usize,
        extent: usize,
    },
    /// A free block's stored size disagrees with its extent.
    FreeSizeMismatch {
        offset: usize,
        size: usize,
        extent: usize,
    },
    /// Two free blocks sit next to each other; coalescing missed them.
    AdjacentFree { first: usize, second: usize },
    /// The last block does not end at the buffer's end.
    WrongEnd { end: usize, capacity: usize },
}

impl fmt::Display for ChainViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "chain is empty"),
            Self::BadHead { offset, prev } => {
                write!(f, "head at offset {offset} with prev {prev:?}")
            }
            Self::Gap { expected, found } => {
                write!(f, "expected block at {expected}, found {found}")
            }
            Self::Misaligned { offset, alignment } => {
                write!(f, "block at {offset} not aligned to {alignment}")
            }
            Self::BrokenBackLink {
                offset,
                expected,
                found,
            } => write!(
                f,
                "block at {offset} has prev {found:?}, expected {expected:?}"
            ),
            Self::Oversized {
                offset,
                size,
                extent,
            } => write!(
                f,
                "allocated block at {offset} holds {size} bytes in a {extent} byte extent"
            ),
            Self::FreeSizeMismatch {
                offset,
                size,
                extent,
            } => write!(
                f,
                "free block at {offset} records {size} bytes but spans {extent}"
            ),
            Self::AdjacentFree { first, second } => {
                write!(f, "free blocks at {first} and {second} were not merged")
            }
            Self::WrongEnd { end, capacity } => {
                write!(f, "chain ends at {end}, buffer ends at {capacity}")
            }
        }
    }
}

/// Counts gathered by a successful [`check_chain`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChainSummary {
    pub blocks: usize,
    pub free_blocks: usize,
    pub allocated_blocks: usize,
    pub free_bytes: usize,
    /// Sum of stored sizes of allocated blocks (bytes held by callers).
    pub live_bytes: usize,
}

/// Walk the chain and verify every structural invariant.
pub fn check_chain(pool: &Pool) -> Result<ChainSummary, ChainViolation> {
    let mut summary = ChainSummary::default();
    let mut previous: Option<BlockInfo> = None;

    for block in pool.blocks() {
        match previous {
            None => {
                if block.offset != 0 || block.prev.is_some() {
                    return Err(ChainViolation::BadHead {
                        offset: block.offset,
                        prev: block.prev,
                    });
                }
            }
            Some(prev) => {
                if block.offset != prev.end {
                    return Err(ChainViolation::Gap {
                        expected: prev.end,
                        found: block.offset,
                    });
                }
                if block.prev != Some(prev.offset) {
                    return Err(ChainViolation::BrokenBackLink {
                        offset: block.offset,
                        expected: Some(prev.offset),
                        found: block.prev,
                    });
                }
                if prev.is_free() && block.is_free() {
                    return Err(ChainViolation::AdjacentFree {
                        first: prev.offset,
                        second: block.offset,
                    });
                }
            }
        }

        if block.offset % pool.alignment() != 0 {
            return Err(ChainViolation::Misaligned {
                offset: block.offset,
                alignment: pool.alignment(),
            });
        }
        if block.is_free() {
            if block.size != block.extent {
                return Err(ChainViolation::FreeSizeMismatch {
                    offset: block.offset,
                    size: block.size,
                    extent: block.extent,
                });
            }
            summary.free_blocks += 1;
            summary.free_bytes += block.extent;
        } else {
            if block.size > block.extent {
                return Err(ChainViolation::Oversized {
                    offset: block.offset,
                    size: block.size,
                    extent: block.extent,
                });
            }
            summary.allocated_blocks += 1;
            summary.live_bytes += block.size;
        }
        summary.blocks += 1;
        previous = Some(block);
    }

    let last = previous.ok_or(ChainViolation::Empty)?;
    if last.end != pool.capacity() || last.next.is_some() {
        return Err(ChainViolation::WrongEnd {
            end: last.end,
            capacity: pool.capacity(),
        });
    }
    Ok(summary)
}

/// [`check_chain`], panicking with the violation.
pub fn assert_chain(pool: &Pool) -> ChainSummary {
    match check_chain(pool) {
        Ok(summary) => summary,
        Err(violation) => panic!("chain invariant violated: {violation}"),
    }
}

/// Assert the pool is back to one free block spanning the whole buffer.
pub fn assert_single_free_block(pool: &Pool) {
    let blocks: Vec<BlockInfo> = pool.blocks().collect();
    assert_eq!(blocks.len(), 1, "expected one block, got {blocks:?}");
    let block = blocks[0];
    assert!(block.is_free(), "sole block is allocated: {block:?}");
    assert_eq!(block.size, pool.capacity() - pool.aligned_header_size());
    assert_eq!(block.next, None);
    assert_eq!(block.prev, None);
}

/// Allocate `size`-byte blocks until the pool reports out of memory.
///
/// Panics on any error other than [`PoolError::OutOfMemory`].
pub fn fill(pool: &mut Pool, size: usize) -> Vec<BlockHandle> {
    let mut handles = Vec::new();
    loop {
        match pool.allocate(size) {
            Ok(Some(handle)) => handles.push(handle),
            Ok(None) => panic!("fill called with a zero size"),
            Err(PoolError::OutOfMemory { .. }) => return handles,
            Err(other) => panic!("unexpected error while filling: {other}"),
        }
    }
}

/// Fill a block's payload with a byte derived from `tag`.
pub fn stamp(pool: &mut Pool, handle: BlockHandle, tag: usize) {
    let byte = tag_byte(tag);
    pool.payload_mut(handle)
        .expect("stamp on a live handle")
        .fill(byte);
}

/// Whether a block's payload still holds the byte written by [`stamp`].
pub fn stamp_intact(pool: &Pool, handle: BlockHandle, tag: usize) -> bool {
    let byte = tag_byte(tag);
    pool.payload(handle)
        .map(|bytes| bytes.iter().all(|&b| b == byte))
        .unwrap_or(false)
}

fn tag_byte(tag: usize) -> u8 {
    (tag % 251) as u8 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_pool_passes() {
        let pool = Pool::with_capacity(1024).unwrap();
        let summary = assert_chain(&pool);
        assert_eq!(summary.blocks, 1);
        assert_eq!(summary.free_blocks, 1);
        assert_single_free_block(&pool);
    }

    #[test]
    fn fill_stops_at_out_of_memory() {
        let mut pool = Pool::with_capacity(1024).unwrap();
        let handles = fill(&mut pool, 64);
        assert!(!handles.is_empty());
        let summary = assert_chain(&pool);
        assert_eq!(summary.allocated_blocks, handles.len());
        assert_eq!(summary.live_bytes, 64 * handles.len());
    }

    #[test]
    fn stamps_are_independent() {
        let mut pool = Pool::with_capacity(1024).unwrap();
        let a = pool.allocate(16).unwrap().unwrap();
        let b = pool.allocate(16).unwrap().unwrap();
        stamp(&mut pool, a, 1);
        stamp(&mut pool, b, 2);
        assert!(stamp_intact(&pool, a, 1));
        assert!(stamp_intact(&pool, b, 2));
        assert!(!stamp_intact(&pool, a, 2));
    }
}
