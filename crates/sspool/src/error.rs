//! Pool operation error types.

use std::error::Error;
use std::fmt;

/// Errors returned by [`Pool`](crate::Pool) allocation, deallocation, and
/// payload access.
///
/// Every variant is a routine, recoverable condition. The pool's chain is
/// left exactly as it was before the failing call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PoolError {
    /// The request plus one block header exceeds the pool's total capacity,
    /// so it could not be satisfied even by an empty pool.
    RequestTooLarge {
        /// Number of payload bytes requested.
        requested: usize,
        /// Total capacity of the pool in bytes.
        capacity: usize,
    },
    /// No free block is currently large enough for the request.
    OutOfMemory {
        /// Number of payload bytes requested.
        requested: usize,
        /// Largest free payload available at the time of the request.
        largest_free: usize,
    },
    /// The handle's address lies outside this pool's payload region.
    PointerOutOfRange {
        /// The rejected address.
        addr: usize,
    },
    /// The handle does not name a live allocated block: it was already
    /// released, it points into the middle of a block, or the pool was
    /// reset since it was issued.
    DoubleFreeOrInvalidPointer {
        /// The rejected address.
        addr: usize,
    },
}

impl fmt::Display for PoolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestTooLarge {
                requested,
                capacity,
            } => {
                write!(
                    f,
                    "request of {requested} bytes exceeds pool capacity of {capacity} bytes"
                )
            }
            Self::OutOfMemory {
                requested,
                largest_free,
            } => {
                write!(
                    f,
                    "out of memory: requested {requested} bytes, largest free block {largest_free} bytes"
                )
            }
            Self::PointerOutOfRange { addr } => {
                write!(f, "address {addr:#x} is outside the pool's payload range")
            }
            Self::DoubleFreeOrInvalidPointer { addr } => {
                write!(f, "address {addr:#x} is not a live allocation")
            }
        }
    }
}

impl Error for PoolError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = PoolError::OutOfMemory {
            requested: 64,
            largest_free: 32,
        };
        let msg = err.to_string();
        assert!(msg.contains("64"));
        assert!(msg.contains("32"));
    }

    #[test]
    fn pointer_errors_render_hex() {
        let err = PoolError::PointerOutOfRange { addr: 0x1000 };
        assert!(err.to_string().contains("0x1000"));
        let err = PoolError::DoubleFreeOrInvalidPointer { addr: 0x20 };
        assert!(err.to_string().contains("0x20"));
    }
}
