//! Boundary-tag block model.
//!
//! Every block carries the same `(size, allocated)` pair in a header word in
//! front of its payload and in a footer word at its end:
//!
//! ```text
//!            bp (payload offset)
//!            ▼
//!   ┌────────┬──────────────────────────────────────┬────────┐
//!   │ header │ payload                              │ footer │
//!   │ size|a │ (free: pred offset, succ offset ...) │ size|a │
//!   └────────┴──────────────────────────────────────┴────────┘
//!     4 bytes                                         4 bytes
//! ```
//!
//! Sizes are multiples of 8, so the low three bits of a tag word are free and
//! bit 0 holds the allocation flag.

use crate::align;

/// Header/footer word size.
pub const WSIZE: usize = 4;

/// Double word. Size of a free-list link slot and of the header+footer overhead.
pub const DSIZE: usize = 8;

/// Smallest block that can hold a header, a footer and both free-list links.
pub const MIN_BLOCK_SIZE: usize = 2 * WSIZE + 2 * DSIZE;

/// Default heap extension, in bytes.
pub const CHUNK_SIZE: usize = 1 << 12;

/// Largest size a tag word can encode.
pub const MAX_BLOCK_SIZE: usize = (u32::MAX & !0x7) as usize;

/// Stored link value meaning "no block".
pub(crate) const NIL: u64 = 0;

/// The `(size, allocated)` pair stored at both ends of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
  pub size: usize,
  pub allocated: bool,
}

impl Tag {
  pub const fn new(
    size: usize,
    allocated: bool,
  ) -> Self {
    Self { size, allocated }
  }

  pub const fn free(size: usize) -> Self {
    Self::new(size, false)
  }

  pub const fn used(size: usize) -> Self {
    Self::new(size, true)
  }

  pub fn pack(self) -> u32 {
    debug_assert!(self.size <= MAX_BLOCK_SIZE && self.size % DSIZE == 0);
    self.size as u32 | self.allocated as u32
  }

  pub fn unpack(word: u32) -> Self {
    Self {
      size: (word & !0x7) as usize,
      allocated: word & 0x1 == 1,
    }
  }
}

/// Block size needed to serve a `size`-byte request: payload plus header and
/// footer, rounded to the alignment and never below [`MIN_BLOCK_SIZE`].
///
/// Returns `None` when the result cannot be encoded in a tag.
pub fn adjusted_size(size: usize) -> Option<usize> {
  let with_overhead = size
    .checked_add(DSIZE)
    .filter(|&n| n <= MAX_BLOCK_SIZE)?;

  Some(align!(with_overhead).max(MIN_BLOCK_SIZE))
}

pub(crate) fn read_word(
  heap: &[u8],
  offset: usize,
) -> u32 {
  let mut word = [0u8; WSIZE];
  word.copy_from_slice(&heap[offset..offset + WSIZE]);
  u32::from_ne_bytes(word)
}

pub(crate) fn read_link(
  heap: &[u8],
  offset: usize,
) -> Option<usize> {
  let mut link = [0u8; DSIZE];
  link.copy_from_slice(&heap[offset..offset + DSIZE]);

  match u64::from_ne_bytes(link) {
    NIL => None,
    bp => Some(bp as usize),
  }
}

/// Header tag of the block whose payload starts at `bp`.
pub fn header(
  heap: &[u8],
  bp: usize,
) -> Tag {
  Tag::unpack(read_word(heap, bp - WSIZE))
}

/// Footer tag of the block whose payload starts at `bp`.
pub fn footer(
  heap: &[u8],
  bp: usize,
) -> Tag {
  let size = header(heap, bp).size;
  Tag::unpack(read_word(heap, bp + size - DSIZE))
}

/// Payload offset of the block physically after `bp`.
pub fn next_block(
  heap: &[u8],
  bp: usize,
) -> usize {
  bp + header(heap, bp).size
}

/// Payload offset of the block physically before `bp`, found through its footer.
pub fn prev_block(
  heap: &[u8],
  bp: usize,
) -> usize {
  bp - Tag::unpack(read_word(heap, bp - DSIZE)).size
}

/// Free-list predecessor of the free block at `bp`.
pub fn pred(
  heap: &[u8],
  bp: usize,
) -> Option<usize> {
  read_link(heap, bp)
}

/// Free-list successor of the free block at `bp`.
pub fn succ(
  heap: &[u8],
  bp: usize,
) -> Option<usize> {
  read_link(heap, bp + DSIZE)
}
