//! Heap consistency checking.

use std::collections::BTreeSet;

use crate::{
  allocator::Allocator,
  block::{self, DSIZE, MIN_BLOCK_SIZE, Tag, WSIZE},
  error::HeapError,
  fit::FitFinder,
  grow::Grower,
};

/// A block found by walking the heap in address order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
  pub bp: usize,
  pub size: usize,
  pub allocated: bool,
}

/// Physical walk from the first block after the prologue up to the epilogue.
pub struct Blocks<'h> {
  heap: &'h [u8],
  bp: usize,
}

impl Iterator for Blocks<'_> {
  type Item = BlockInfo;

  fn next(&mut self) -> Option<BlockInfo> {
    if self.bp > self.heap.len() {
      return None;
    }

    let Tag { size, allocated } = block::header(self.heap, self.bp);
    if size == 0 {
      return None;
    }

    let info = BlockInfo {
      bp: self.bp,
      size,
      allocated,
    };
    self.bp += size;

    Some(info)
  }
}

/// Summary of a heap that passed [`Allocator::check`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HeapStats {
  pub heap_size: usize,
  pub blocks: usize,
  pub free_blocks: usize,
  pub free_bytes: usize,
  pub allocated_bytes: usize,
  pub largest_free: usize,
}

/// Payload offset of the prologue block.
const PROLOGUE: usize = 2 * WSIZE;

impl<G: Grower, F: FitFinder> Allocator<G, F> {
  /// Walks every block in address order, prologue and epilogue excluded.
  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      heap: self.heap(),
      bp: PROLOGUE + DSIZE,
    }
  }

  /// Verifies the boundary tags, coalescing, the free list and the search cursor.
  pub fn check(&self) -> Result<HeapStats, HeapError> {
    let heap = self.heap();
    let heap_size = heap.len();

    if heap_size < 4 * WSIZE
      || block::header(heap, PROLOGUE) != Tag::used(DSIZE)
      || block::footer(heap, PROLOGUE) != Tag::used(DSIZE)
    {
      return Err(HeapError::BadPrologue { bp: PROLOGUE });
    }

    let mut stats = HeapStats {
      heap_size,
      ..HeapStats::default()
    };
    let mut free = BTreeSet::new();
    let mut prev_free: Option<usize> = None;
    let mut bp = PROLOGUE + DSIZE;

    loop {
      if bp > heap_size {
        return Err(HeapError::OutOfBounds { bp });
      }

      let tag = block::header(heap, bp);
      if tag.size == 0 {
        if !tag.allocated || bp != heap_size {
          return Err(HeapError::BadEpilogue {
            offset: bp - WSIZE,
            heap_size,
          });
        }
        break;
      }

      if bp % DSIZE != 0 {
        return Err(HeapError::Misaligned { bp });
      }
      if tag.size % DSIZE != 0 || tag.size < MIN_BLOCK_SIZE {
        return Err(HeapError::BadSize { bp, size: tag.size });
      }
      if bp + tag.size > heap_size {
        return Err(HeapError::OutOfBounds { bp });
      }
      if block::footer(heap, bp) != tag {
        return Err(HeapError::TagMismatch { bp });
      }

      stats.blocks += 1;
      if tag.allocated {
        stats.allocated_bytes += tag.size;
        prev_free = None;
      } else {
        if let Some(prev) = prev_free {
          return Err(HeapError::Uncoalesced { bp: prev, next: bp });
        }
        stats.free_blocks += 1;
        stats.free_bytes += tag.size;
        stats.largest_free = stats.largest_free.max(tag.size);
        free.insert(bp);
        prev_free = Some(bp);
      }

      bp += tag.size;
    }

    self.check_free_list(heap, &free)?;

    if let Some(cursor) = self.cursor() {
      if !free.contains(&cursor) {
        return Err(HeapError::DanglingCursor { bp: cursor });
      }
    }

    Ok(stats)
  }

  fn check_free_list(
    &self,
    heap: &[u8],
    free: &BTreeSet<usize>,
  ) -> Result<(), HeapError> {
    let mut listed = BTreeSet::new();
    let mut pred = None;
    let mut next = self.free_list().head();

    while let Some(bp) = next {
      if listed.len() > free.len() || listed.contains(&bp) {
        return Err(HeapError::Cycle);
      }
      if bp + 2 * DSIZE > heap.len() || bp < PROLOGUE + DSIZE {
        return Err(HeapError::StrayLink { bp });
      }
      if !free.contains(&bp) {
        return if block::header(heap, bp).allocated {
          Err(HeapError::AllocatedInList { bp })
        } else {
          Err(HeapError::StrayLink { bp })
        };
      }
      if block::pred(heap, bp) != pred {
        return Err(HeapError::BrokenLinks { bp });
      }

      listed.insert(bp);
      pred = Some(bp);
      next = block::succ(heap, bp);
    }

    match free.difference(&listed).next() {
      Some(&bp) => Err(HeapError::NotListed { bp }),
      None => Ok(()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    block::CHUNK_SIZE,
    fit::{BestFit, NextFit},
    grow::VecGrower,
  };

  #[test]
  fn test_fresh_heap_stats() {
    let allocator = Allocator::new(VecGrower::default(), NextFit).unwrap();

    assert_eq!(
      allocator.check(),
      Ok(HeapStats {
        heap_size: 4 * WSIZE + CHUNK_SIZE,
        blocks: 1,
        free_blocks: 1,
        free_bytes: CHUNK_SIZE,
        allocated_bytes: 0,
        largest_free: CHUNK_SIZE,
      })
    );
  }

  #[test]
  fn test_blocks_walk_in_address_order() {
    let mut allocator = Allocator::new(VecGrower::default(), BestFit).unwrap();
    let a = allocator.allocate(10).unwrap();
    let b = allocator.allocate(100).unwrap();

    let blocks: Vec<_> = allocator.blocks().collect();

    assert_eq!(
      blocks,
      vec![
        BlockInfo { bp: a, size: 24, allocated: true },
        BlockInfo { bp: b, size: 112, allocated: true },
        BlockInfo {
          bp: b + 112,
          size: CHUNK_SIZE - 136,
          allocated: false,
        },
      ]
    );
  }

  #[test]
  fn test_detects_tag_mismatch() {
    let mut allocator = Allocator::new(VecGrower::default(), BestFit).unwrap();
    let a = allocator.allocate(40).unwrap();

    allocator.arena.put(a + 48 - DSIZE, Tag::free(48).pack());

    assert_eq!(allocator.check(), Err(HeapError::TagMismatch { bp: a }));
  }

  #[test]
  fn test_detects_uncoalesced_neighbours() {
    let mut allocator = Allocator::new(VecGrower::default(), BestFit).unwrap();
    let a = allocator.allocate(40).unwrap();
    let b = allocator.allocate(40).unwrap();
    allocator.release(a);

    // mark b free without merging or listing it
    allocator.arena.set_tags(b, Tag::free(48));

    assert!(matches!(
      allocator.check(),
      Err(HeapError::Uncoalesced { .. })
    ));
  }

  #[test]
  fn test_detects_unlisted_free_block() {
    let mut allocator = Allocator::new(VecGrower::default(), BestFit).unwrap();
    let a = allocator.allocate(40).unwrap();
    let _b = allocator.allocate(40).unwrap();

    allocator.arena.set_tags(a, Tag::free(48));

    assert_eq!(allocator.check(), Err(HeapError::NotListed { bp: a }));
  }

  #[test]
  fn test_detects_allocated_block_in_list() {
    let mut allocator = Allocator::new(VecGrower::default(), BestFit).unwrap();
    let a = allocator.allocate(40).unwrap();
    let _b = allocator.allocate(40).unwrap();
    allocator.release(a);

    allocator.arena.set_tags(a, Tag::used(48));

    assert_eq!(allocator.check(), Err(HeapError::AllocatedInList { bp: a }));
  }

  #[test]
  fn test_detects_dangling_cursor() {
    let mut allocator = Allocator::new(VecGrower::default(), NextFit).unwrap();
    let a = allocator.allocate(40).unwrap();

    allocator.free.set_cursor(Some(a));

    assert_eq!(allocator.check(), Err(HeapError::DanglingCursor { bp: a }));
  }
}
