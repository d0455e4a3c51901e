//! Allocation handles.
//!
//! A [`BlockHandle`] is the address of a block's payload, i.e. the byte just
//! past its header. It carries no borrow of the pool; every pool operation
//! that accepts a handle validates it first.

use std::fmt;

/// Address of an allocation's first payload byte.
///
/// Handles are plain addresses so that they behave like the pointers an
/// allocator hands out: they can be compared, hashed, and stored freely, and
/// an address issued by one pool lies outside every other pool's buffer.
/// Resolving a handle after its block has been released fails with
/// [`PoolError::DoubleFreeOrInvalidPointer`](crate::PoolError::DoubleFreeOrInvalidPointer).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[must_use]
pub struct BlockHandle {
    addr: usize,
}

impl BlockHandle {
    pub(crate) fn new(addr: usize) -> Self {
        Self { addr }
    }

    /// Rebuild a handle from a raw address, e.g. one round-tripped through
    /// foreign code. The pool validates it on use.
    pub fn from_addr(addr: usize) -> Self {
        Self { addr }
    }

    /// The payload address.
    pub fn addr(&self) -> usize {
        self.addr
    }

    /// Whether the payload address is a multiple of `alignment`.
    pub fn is_aligned_to(&self, alignment: usize) -> bool {
        alignment.is_power_of_two() && self.addr & (alignment - 1) == 0
    }
}

impl fmt::Display for BlockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHandle({:#x})", self.addr)
    }
}
