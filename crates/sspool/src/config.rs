//! Pool configuration parameters and validation.

use std::error::Error;
use std::fmt;

use crate::header::{align_up, ALLOCATED_FLAG, HEADER_SIZE};

/// Configuration for a [`Pool`](crate::Pool).
///
/// Controls the buffer size and the alignment of every block. Validated at
/// construction; all values are immutable once the pool exists.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    /// Total size of the pool buffer in bytes, headers included.
    ///
    /// Default: 1 MiB. Must be a multiple of `alignment` and large enough to
    /// hold one header plus `alignment` payload bytes.
    pub capacity: usize,

    /// Alignment of every block header and payload address.
    ///
    /// Default: `align_of::<usize>()`. Must be a power of two.
    pub alignment: usize,
}

impl PoolConfig {
    /// Default pool size: 1 MiB.
    pub const DEFAULT_CAPACITY: usize = 1 << 20;

    /// Default alignment: native pointer alignment.
    pub const DEFAULT_ALIGNMENT: usize = std::mem::align_of::<usize>();

    /// Create a config for the given capacity with the default alignment.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            alignment: Self::DEFAULT_ALIGNMENT,
        }
    }

    /// Replace the alignment.
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    /// Size of one block header once padded to `alignment`.
    ///
    /// Only meaningful for a config whose alignment is a power of two.
    pub fn aligned_header_size(&self) -> usize {
        align_up(HEADER_SIZE, self.alignment).unwrap_or(usize::MAX)
    }

    /// Largest capacity any pool may have.
    ///
    /// Block sizes share a machine word with the allocated flag, so no size
    /// may reach the flag bit.
    pub fn max_capacity(&self) -> usize {
        ALLOCATED_FLAG - self.alignment
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.alignment.is_power_of_two() {
            return Err(ConfigError::AlignmentNotPowerOfTwo {
                alignment: self.alignment,
            });
        }
        if self.capacity > self.max_capacity() {
            return Err(ConfigError::CapacityTooLarge {
                capacity: self.capacity,
                maximum: self.max_capacity(),
            });
        }
        if self.capacity % self.alignment != 0 {
            return Err(ConfigError::CapacityNotAligned {
                capacity: self.capacity,
                alignment: self.alignment,
            });
        }
        let minimum = self.aligned_header_size().saturating_add(self.alignment);
        if self.capacity < minimum {
            return Err(ConfigError::CapacityTooSmall {
                capacity: self.capacity,
                minimum,
            });
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`PoolConfig::validate()`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// Alignment is zero or not a power of two.
    AlignmentNotPowerOfTwo {
        /// The configured alignment.
        alignment: usize,
    },
    /// Capacity is not a multiple of the alignment.
    CapacityNotAligned {
        /// The configured capacity.
        capacity: usize,
        /// The configured alignment.
        alignment: usize,
    },
    /// Capacity cannot hold a single header plus any payload.
    CapacityTooSmall {
        /// The configured capacity.
        capacity: usize,
        /// The smallest usable capacity for this alignment.
        minimum: usize,
    },
    /// Capacity would collide with the allocated flag bit.
    CapacityTooLarge {
        /// The configured capacity.
        capacity: usize,
        /// The largest usable capacity for this alignment.
        maximum: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlignmentNotPowerOfTwo { alignment } => {
                write!(f, "alignment {alignment} is not a power of two")
            }
            Self::CapacityNotAligned {
                capacity,
                alignment,
            } => {
                write!(
                    f,
                    "capacity {capacity} is not a multiple of alignment {alignment}"
                )
            }
            Self::CapacityTooSmall { capacity, minimum } => {
                write!(f, "capacity {capacity} is below the minimum of {minimum}")
            }
            Self::CapacityTooLarge { capacity, maximum } => {
                write!(f, "capacity {capacity} exceeds the maximum of {maximum}")
            }
        }
    }
}

impl Error for ConfigError {}
