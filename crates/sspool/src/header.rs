//! In-place block header encoding.
//!
//! Every block in the pool buffer starts with a header of three
//! native-endian machine words:
//!
//! ```text
//! ┌──────────────────────────┬───────────────┬───────────────┐
//! │ size | ALLOCATED_FLAG    │ next offset   │ prev offset   │
//! └──────────────────────────┴───────────────┴───────────────┘
//! ```
//!
//! The most-significant bit of the size word is the allocated flag. Link
//! words hold buffer offsets, with `usize::MAX` meaning "no neighbour".
//! Headers are read and written through byte slices only; nothing in this
//! module reinterprets memory.

const WORD: usize = std::mem::size_of::<usize>();

/// Unpadded size of one block header in bytes.
pub const HEADER_SIZE: usize = 3 * WORD;

/// Bit of the size word that marks a block as allocated.
pub(crate) const ALLOCATED_FLAG: usize = !(usize::MAX >> 1);

/// Link word value for "no neighbour".
const NO_LINK: usize = usize::MAX;

/// Whether a block is handed out to a caller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BlockState {
    /// Available for allocation.
    Free,
    /// Owned by a caller until deallocated.
    Allocated,
}

/// Decoded view of an in-buffer header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Header {
    /// Payload bytes (requested length for allocated blocks, full extent for
    /// free blocks).
    pub(crate) size: usize,
    pub(crate) state: BlockState,
    /// Offset of the next header in address order.
    pub(crate) next: Option<usize>,
    /// Offset of the previous header in address order.
    pub(crate) prev: Option<usize>,
}

impl Header {
    /// A free header.
    pub(crate) fn free(size: usize, prev: Option<usize>, next: Option<usize>) -> Self {
        Self {
            size,
            state: BlockState::Free,
            next,
            prev,
        }
    }

    pub(crate) fn is_allocated(&self) -> bool {
        self.state == BlockState::Allocated
    }

    /// Decode the header stored at `offset`.
    ///
    /// Returns `None` if the header would extend past the end of `buf`.
    pub(crate) fn read(buf: &[u8], offset: usize) -> Option<Self> {
        let bytes = buf.get(offset..offset.checked_add(HEADER_SIZE)?)?;
        let size_word = read_word(bytes, 0);
        let state = if size_word & ALLOCATED_FLAG != 0 {
            BlockState::Allocated
        } else {
            BlockState::Free
        };
        Some(Self {
            size: size_word & !ALLOCATED_FLAG,
            state,
            next: decode_link(read_word(bytes, 1)),
            prev: decode_link(read_word(bytes, 2)),
        })
    }

    /// Encode this header at `offset`.
    ///
    /// # Panics
    ///
    /// Panics if `offset + HEADER_SIZE` exceeds `buf.len()`. Callers only
    /// write at offsets taken from a consistent chain.
    pub(crate) fn write(&self, buf: &mut [u8], offset: usize) {
        let bytes = &mut buf[offset..offset + HEADER_SIZE];
        write_word(bytes, 0, self.packed_size());
        write_word(bytes, 1, encode_link(self.next));
        write_word(bytes, 2, encode_link(self.prev));
    }

    /// Overwrite only the `prev` link of the header at `offset`.
    pub(crate) fn write_prev(buf: &mut [u8], offset: usize, prev: Option<usize>) {
        write_word(&mut buf[offset..offset + HEADER_SIZE], 2, encode_link(prev));
    }

    /// Overwrite only the `next` link of the header at `offset`.
    pub(crate) fn write_next(buf: &mut [u8], offset: usize, next: Option<usize>) {
        write_word(&mut buf[offset..offset + HEADER_SIZE], 1, encode_link(next));
    }

    /// Zero the header at `offset` once it has been absorbed by a merge.
    pub(crate) fn clear(buf: &mut [u8], offset: usize) {
        buf[offset..offset + HEADER_SIZE].fill(0);
    }

    fn packed_size(&self) -> usize {
        match self.state {
            BlockState::Free => self.size & !ALLOCATED_FLAG,
            BlockState::Allocated => self.size | ALLOCATED_FLAG,
        }
    }
}

/// Round `value` up to the next multiple of `align` (a power of two).
pub(crate) fn align_up(value: usize, align: usize) -> Option<usize> {
    let mask = align - 1;
    value.checked_add(mask).map(|v| v & !mask)
}

fn read_word(bytes: &[u8], index: usize) -> usize {
    let mut word = [0u8; WORD];
    word.copy_from_slice(&bytes[index * WORD..(index + 1) * WORD]);
    usize::from_ne_bytes(word)
}

fn write_word(bytes: &mut [u8], index: usize, value: usize) {
    bytes[index * WORD..(index + 1) * WORD].copy_from_slice(&value.to_ne_bytes());
}

fn decode_link(word: usize) -> Option<usize> {
    (word != NO_LINK).then_some(word)
}

fn encode_link(link: Option<usize>) -> usize {
    link.unwrap_or(NO_LINK)
}
