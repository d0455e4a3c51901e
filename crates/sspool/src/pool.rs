//! The fixed-capacity pool: first-fit allocation, splitting, and
//! bidirectional coalescing over an intrusive header chain.

use tracing::{debug, trace, warn};

use crate::config::{ConfigError, PoolConfig};
use crate::error::PoolError;
use crate::handle::BlockHandle;
use crate::header::{align_up, BlockState, Header};
use crate::inspect::{Blocks, PoolStats};

/// A memory pool that serves every request out of one fixed buffer.
///
/// The buffer is allocated once in [`Pool::new`] and never grows, shrinks,
/// or moves, so handle addresses stay valid for the pool's lifetime. Blocks
/// are tracked by headers living inside the buffer itself; the pool keeps no
/// side tables.
///
/// # Example
///
/// ```
/// use sspool::Pool;
///
/// let mut pool = Pool::with_capacity(1024)?;
/// let handle = pool.allocate(4)?.expect("non-zero request");
/// pool.payload_mut(handle)?.copy_from_slice(&34i32.to_ne_bytes());
/// assert_eq!(pool.payload(handle)?, &34i32.to_ne_bytes());
/// pool.deallocate(handle)?;
/// assert_eq!(pool.deallocated_total(), 4);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Pool {
    /// Backing storage, over-allocated by `alignment - 1` bytes so an
    /// aligned window of `capacity` bytes always exists inside it.
    storage: Box<[u8]>,
    /// Start of the aligned window within `storage`.
    base: usize,
    capacity: usize,
    alignment: usize,
    /// Header size padded to `alignment`.
    header_size: usize,
    allocated_total: usize,
    deallocated_total: usize,
}

impl Pool {
    /// Create a pool from a validated configuration.
    ///
    /// The pool starts out as a single free block spanning
    /// `capacity - aligned_header_size` payload bytes.
    pub fn new(config: PoolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let header_size = config.aligned_header_size();
        let PoolConfig {
            capacity,
            alignment,
        } = config;

        // `capacity <= max_capacity()` keeps this addition in range.
        let storage = vec![0u8; capacity + alignment - 1].into_boxed_slice();
        let start = storage.as_ptr() as usize;
        let base = align_up(start, alignment).map_or(0, |aligned| aligned - start);

        let mut pool = Self {
            storage,
            base,
            capacity,
            alignment,
            header_size,
            allocated_total: 0,
            deallocated_total: 0,
        };
        pool.reset();
        debug!(
            capacity,
            alignment,
            header_size,
            base_addr = pool.base_addr(),
            "pool created"
        );
        Ok(pool)
    }

    /// Create a pool of `capacity` bytes with the default alignment.
    pub fn with_capacity(capacity: usize) -> Result<Self, ConfigError> {
        Self::new(PoolConfig::new(capacity))
    }

    /// Return the pool to its freshly constructed state.
    ///
    /// Rewrites the head header as one free block covering the whole buffer
    /// and zeroes both counters. Every outstanding handle becomes invalid.
    /// Calling `reset` repeatedly has the same effect as calling it once.
    pub fn reset(&mut self) {
        let size = self.capacity - self.header_size;
        Header::free(size, None, None).write(self.buf_mut(), 0);
        self.allocated_total = 0;
        self.deallocated_total = 0;
        debug!(free = size, "pool reset");
    }

    /// Allocate `requested` payload bytes.
    ///
    /// Walks the chain in address order and takes the first free block whose
    /// payload can hold the request. The block is split when the remainder
    /// can host another header plus at least `alignment` payload bytes;
    /// otherwise the whole block is handed out.
    ///
    /// Returns `Ok(None)` for a zero-byte request without touching the pool.
    /// The returned handle's address is aligned to the pool's alignment.
    pub fn allocate(&mut self, requested: usize) -> Result<Option<BlockHandle>, PoolError> {
        if requested == 0 {
            trace!("zero-byte allocation ignored");
            return Ok(None);
        }
        let too_large = requested
            .checked_add(self.header_size)
            .is_none_or(|total| total > self.capacity);
        if too_large {
            warn!(requested, capacity = self.capacity, "request exceeds pool capacity");
            return Err(PoolError::RequestTooLarge {
                requested,
                capacity: self.capacity,
            });
        }

        let mut cursor = Some(0);
        while let Some(offset) = cursor {
            let Some(header) = self.read_header(offset) else {
                break;
            };
            if !header.is_allocated() && header.size >= requested {
                return self.grant(offset, header, requested).map(Some);
            }
            cursor = header.next.filter(|&next| next > offset);
        }

        let largest_free = self.largest_free();
        warn!(requested, largest_free, "pool out of memory");
        Err(PoolError::OutOfMemory {
            requested,
            largest_free,
        })
    }

    /// Hand the free block at `offset` to the caller, splitting off the tail
    /// when it is large enough to stand alone.
    fn grant(
        &mut self,
        offset: usize,
        header: Header,
        requested: usize,
    ) -> Result<BlockHandle, PoolError> {
        let header_size = self.header_size;
        let alignment = self.alignment;
        let payload = offset + header_size;
        // `requested <= header.size`, and free sizes are multiples of the
        // alignment, so the footprint never exceeds the block.
        let footprint = align_up(requested, alignment).unwrap_or(header.size);
        let remainder = header.size - footprint;

        let split = if remainder >= header_size + alignment {
            let split_at = payload + footprint;
            let fits = split_at
                .checked_add(header_size)
                .is_some_and(|end| end <= self.capacity);
            if !fits {
                let largest_free = self.largest_free();
                warn!(offset, split_at, "split point beyond pool bounds");
                return Err(PoolError::OutOfMemory {
                    requested,
                    largest_free,
                });
            }
            Some(split_at)
        } else {
            None
        };

        let buf = self.buf_mut();
        match split {
            Some(split_at) => {
                Header::free(remainder - header_size, Some(offset), header.next)
                    .write(buf, split_at);
                if let Some(next) = header.next {
                    Header::write_prev(buf, next, Some(split_at));
                }
                Header {
                    size: requested,
                    state: BlockState::Allocated,
                    next: Some(split_at),
                    prev: header.prev,
                }
                .write(buf, offset);
            }
            None => {
                Header {
                    size: requested,
                    state: BlockState::Allocated,
                    ..header
                }
                .write(buf, offset);
            }
        }

        self.allocated_total += requested;
        let handle = BlockHandle::new(self.base_addr() + payload);
        trace!(
            offset,
            requested,
            split = split.is_some(),
            addr = handle.addr(),
            "allocated"
        );
        Ok(handle)
    }

    /// Release the allocation behind `handle`.
    ///
    /// The released block is merged with every free block adjacent to it,
    /// walking forward and backward until an allocated block or the end of
    /// the buffer, so the chain never holds two neighbouring free blocks.
    ///
    /// Fails with [`PoolError::PointerOutOfRange`] if the address lies
    /// outside this pool's payload region and with
    /// [`PoolError::DoubleFreeOrInvalidPointer`] if it does not name a live
    /// allocation. The chain is unchanged on failure.
    pub fn deallocate(&mut self, handle: BlockHandle) -> Result<(), PoolError> {
        let (offset, header) = self.resolve(handle)?;
        let released = header.size;

        // Backward: the surviving block starts at the lowest free neighbour.
        let mut start = offset;
        let mut prev = header.prev;
        let mut merged = 0usize;
        while let Some(p) = prev {
            let Some(ph) = self.read_header(p).filter(|_| p < start) else {
                break;
            };
            if ph.is_allocated() {
                break;
            }
            start = p;
            prev = ph.prev;
            merged += 1;
        }

        // Forward: it ends where the first allocated block (or the buffer)
        // begins.
        let mut next = header.next;
        while let Some(n) = next {
            let Some(nh) = self.read_header(n) else {
                break;
            };
            if nh.is_allocated() {
                break;
            }
            next = nh.next.filter(|&after| after > n);
            merged += 1;
        }

        let end = next.unwrap_or(self.capacity);
        let size = end - start - self.header_size;
        let buf_end = self.capacity;
        let buf = self.buf_mut();

        // Zero every header swallowed by the merged block.
        let mut cursor = Header::read(buf, start).and_then(|h| h.next);
        while let Some(c) = cursor.filter(|&c| c < end && c < buf_end) {
            cursor = Header::read(buf, c)
                .and_then(|h| h.next)
                .filter(|&after| after > c);
            Header::clear(buf, c);
        }

        Header::free(size, prev, next).write(buf, start);
        if let Some(p) = prev {
            Header::write_next(buf, p, Some(start));
        }
        if let Some(n) = next {
            Header::write_prev(buf, n, Some(start));
        }

        self.deallocated_total += released;
        trace!(
            offset,
            released,
            merged,
            free_start = start,
            free_size = size,
            "deallocated"
        );
        Ok(())
    }

    /// The payload bytes handed out for `handle`.
    pub fn payload(&self, handle: BlockHandle) -> Result<&[u8], PoolError> {
        let (offset, header) = self.resolve(handle)?;
        let start = offset + self.header_size;
        Ok(&self.buf()[start..start + header.size])
    }

    /// Mutable access to the payload bytes handed out for `handle`.
    pub fn payload_mut(&mut self, handle: BlockHandle) -> Result<&mut [u8], PoolError> {
        let (offset, header) = self.resolve(handle)?;
        let start = offset + self.header_size;
        Ok(&mut self.buf_mut()[start..start + header.size])
    }

    // ── Diagnostics ────────────────────────────────────────────────

    /// Total payload bytes ever allocated since construction or the last
    /// reset. Counts requested bytes, not header or padding overhead.
    pub fn allocated_total(&self) -> usize {
        self.allocated_total
    }

    /// Total payload bytes ever released since construction or the last
    /// reset.
    pub fn deallocated_total(&self) -> usize {
        self.deallocated_total
    }

    /// Total buffer size in bytes, headers included.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Alignment of every block start and payload address.
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Size of one header padded to the alignment.
    pub fn aligned_header_size(&self) -> usize {
        self.header_size
    }

    /// Address of the first byte of the buffer.
    pub fn base_addr(&self) -> usize {
        self.storage.as_ptr() as usize + self.base
    }

    /// Whether `handle` points into this pool's payload region. Says nothing
    /// about whether the handle is currently live.
    pub fn contains(&self, handle: BlockHandle) -> bool {
        self.payload_offset(handle).is_some()
    }

    /// Address-order traversal of every block in the chain.
    pub fn blocks(&self) -> Blocks<'_> {
        Blocks::new(self)
    }

    /// Number of blocks currently in the chain.
    pub fn block_count(&self) -> usize {
        self.blocks().count()
    }

    /// Sum of all free payload bytes.
    pub fn free_bytes(&self) -> usize {
        self.blocks().filter(|b| b.is_free()).map(|b| b.extent).sum()
    }

    /// Largest single free payload, i.e. the biggest request that can
    /// currently succeed.
    pub fn largest_free(&self) -> usize {
        self.blocks()
            .filter(|b| b.is_free())
            .map(|b| b.extent)
            .max()
            .unwrap_or(0)
    }

    /// Snapshot of the pool's counters and chain shape.
    pub fn stats(&self) -> PoolStats {
        PoolStats::collect(self)
    }

    // ── Internals ──────────────────────────────────────────────────

    fn buf(&self) -> &[u8] {
        &self.storage[self.base..self.base + self.capacity]
    }

    fn buf_mut(&mut self) -> &mut [u8] {
        &mut self.storage[self.base..self.base + self.capacity]
    }

    pub(crate) fn read_header(&self, offset: usize) -> Option<Header> {
        Header::read(self.buf(), offset)
    }

    /// Payload extent of the block at `offset`, derived from the chain.
    pub(crate) fn extent_of(&self, offset: usize, header: &Header) -> usize {
        header
            .next
            .unwrap_or(self.capacity)
            .saturating_sub(offset + self.header_size)
    }

    /// Buffer offset of the payload `handle` points at, if it lies inside the
    /// payload region.
    fn payload_offset(&self, handle: BlockHandle) -> Option<usize> {
        handle
            .addr()
            .checked_sub(self.base_addr())
            .filter(|&rel| rel >= self.header_size && rel < self.capacity)
    }

    /// Map `handle` to the live allocated block it names.
    ///
    /// The header is located by walking the chain from the head rather than
    /// trusting the bytes in front of the address, so interior pointers,
    /// stale handles, and handles from before a reset are all rejected.
    fn resolve(&self, handle: BlockHandle) -> Result<(usize, Header), PoolError> {
        let addr = handle.addr();
        let Some(payload) = self.payload_offset(handle) else {
            warn!(addr, "handle outside pool range");
            return Err(PoolError::PointerOutOfRange { addr });
        };
        let target = payload - self.header_size;

        let mut cursor = Some(0);
        while let Some(offset) = cursor.filter(|&offset| offset <= target) {
            let Some(header) = self.read_header(offset) else {
                break;
            };
            if offset == target {
                if header.is_allocated() {
                    return Ok((offset, header));
                }
                break;
            }
            cursor = header.next.filter(|&next| next > offset);
        }

        warn!(addr, "handle is not a live allocation");
        Err(PoolError::DoubleFreeOrInvalidPointer { addr })
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("capacity", &self.capacity)
            .field("alignment", &self.alignment)
            .field("header_size", &self.header_size)
            .field("allocated_total", &self.allocated_total)
            .field("deallocated_total", &self.deallocated_total)
            .finish_non_exhaustive()
    }
}
