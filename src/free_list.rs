//! Explicit free list.
//!
//! The list is threaded through the payloads of the free blocks themselves:
//!
//! ```text
//!   head ──► ┌──────┬──────┬──────┐    ┌──────┬──────┬──────┐
//!            │ hdr  │ pred │ succ ├──► │ hdr  │ pred │ succ ├──► None
//!            └──────┴──────┴──────┘    └──────┴──▲───┴──────┘
//!                ▲                               │
//!                └───────────────────────────────┘
//! ```
//!
//! Insertion is always at the head (LIFO). The list also carries the next-fit
//! search cursor, which must either be `None` or name a listed free block.

use crate::{arena::Arena, block, grow::Grower};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FreeList {
  head: Option<usize>,
  cursor: Option<usize>,
}

impl FreeList {
  pub const fn new() -> Self {
    Self {
      head: None,
      cursor: None,
    }
  }

  pub fn head(&self) -> Option<usize> {
    self.head
  }

  /// Free block where the next next-fit search resumes.
  pub fn cursor(&self) -> Option<usize> {
    self.cursor
  }

  pub(crate) fn set_cursor(
    &mut self,
    cursor: Option<usize>,
  ) {
    self.cursor = cursor;
  }

  /// Pushes `bp` at the head of the list. Leaves the cursor alone.
  pub fn add<G: Grower>(
    &mut self,
    arena: &mut Arena<G>,
    bp: usize,
  ) {
    log::trace!("free list add {}", bp);

    arena.set_succ(bp, self.head);
    arena.set_pred(bp, None);

    if let Some(head) = self.head {
      arena.set_pred(head, Some(bp));
    }

    self.head = Some(bp);
  }

  /// Unlinks `bp` from the list, first moving the cursor off it if needed.
  pub fn splice<G: Grower>(
    &mut self,
    arena: &mut Arena<G>,
    bp: usize,
  ) {
    log::trace!("free list splice {}", bp);

    let pred = arena.pred(bp);
    let succ = arena.succ(bp);

    if self.cursor == Some(bp) {
      self.cursor = succ;
    }

    match pred {
      None => {
        self.head = succ;
        if let Some(succ) = succ {
          arena.set_pred(succ, None);
        }
      }
      Some(pred) => {
        arena.set_succ(pred, succ);
        if let Some(succ) = succ {
          arena.set_pred(succ, Some(pred));
        }
      }
    }
  }

  /// Walks the list from the head.
  pub fn iter<'h>(
    &self,
    heap: &'h [u8],
  ) -> FreeBlocks<'h> {
    self.iter_from(heap, self.head)
  }

  /// Walks the list from `start` to its end.
  pub fn iter_from<'h>(
    &self,
    heap: &'h [u8],
    start: Option<usize>,
  ) -> FreeBlocks<'h> {
    FreeBlocks { heap, next: start }
  }
}

/// A listed free block as seen by a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreeBlock {
  pub bp: usize,
  pub size: usize,
}

/// Iterator over free blocks in list order.
pub struct FreeBlocks<'h> {
  heap: &'h [u8],
  next: Option<usize>,
}

impl Iterator for FreeBlocks<'_> {
  type Item = FreeBlock;

  fn next(&mut self) -> Option<FreeBlock> {
    let bp = self.next?;
    self.next = block::succ(self.heap, bp);

    Some(FreeBlock {
      bp,
      size: block::header(self.heap, bp).size,
    })
  }
}
