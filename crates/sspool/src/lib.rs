//! Fixed-capacity memory pool with first-fit allocation and coalescing.
//!
//! A [`Pool`] owns one byte buffer, sized once at construction, and services
//! every allocation and deallocation out of it. No allocation request ever
//! reaches the global heap after the buffer has been created.
//!
//! # Architecture
//!
//! The buffer is partitioned into a chain of adjacent blocks. Each block
//! starts with an in-place header that records its size, its state, and the
//! offsets of its address-order neighbours:
//!
//! ```text
//! offset 0                                                     capacity
//! ├─ hdr ─┬─ payload ─┬─ hdr ─┬─ payload ─┬─ hdr ─┬─ payload ───┤
//! │ alloc │  32 bytes │ free  │  88 bytes │ alloc │  16 bytes   │
//! └───────┴───────────┴───────┴───────────┴───────┴─────────────┘
//!    next ──────────────▶ next ─────────────▶ next = none
//! ```
//!
//! - **allocate:** first-fit walk over the chain, splitting the chosen free
//!   block when the remainder can hold another header plus payload.
//! - **deallocate:** validate the handle against the chain, then merge with
//!   every free neighbour in both directions so that releasing every live
//!   allocation always restores one free block spanning the whole buffer.
//!
//! # Handles
//!
//! Callers receive a [`BlockHandle`], the address just past a block header.
//! Handles are validated against the buffer and the chain before any access,
//! so a foreign, stale, or double-freed handle is reported as a
//! [`PoolError`] instead of corrupting memory.
//!
//! # Threading
//!
//! The pool is single-threaded: every mutating call takes `&mut self`.
//! Callers sharing a pool across threads serialise access themselves.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod handle;
mod header;
pub mod inspect;
pub mod pool;

// Public re-exports for the primary API surface.
pub use config::{ConfigError, PoolConfig};
pub use error::PoolError;
pub use handle::BlockHandle;
pub use header::{BlockState, HEADER_SIZE};
pub use inspect::{BlockInfo, Blocks, PoolStats};
pub use pool::Pool;
