use crate::{
  align,
  arena::Arena,
  block::{self, CHUNK_SIZE, DSIZE, MIN_BLOCK_SIZE, Tag, WSIZE},
  error::AllocError,
  fit::FitFinder,
  free_list::FreeList,
  grow::Grower,
};

/// Boundary-tag allocator with an explicit free list over a growable region.
///
/// Payload "addresses" are offsets into the region; the null address is
/// `None`. Every returned offset is a multiple of 8.
#[derive(Debug)]
pub struct Allocator<G: Grower, F: FitFinder> {
  pub(crate) arena: Arena<G>,
  pub(crate) free: FreeList,
  finder: F,
  chunk_size: usize,
}

impl<G: Grower, F: FitFinder> Allocator<G, F> {
  /// Lays out the prologue and epilogue on a fresh region (break at 0) and seeds it with
  /// one [`CHUNK_SIZE`] extension.
  pub fn new(
    grower: G,
    finder: F,
  ) -> Result<Self, AllocError> {
    Self::with_chunk_size(grower, finder, CHUNK_SIZE)
  }

  /// Like [`Allocator::new`], with a different seed and minimum extension size.
  pub fn with_chunk_size(
    grower: G,
    finder: F,
    chunk_size: usize,
  ) -> Result<Self, AllocError> {
    let mut arena = Arena::new(grower);

    let base = arena
      .grow(4 * WSIZE)
      .ok_or(AllocError::OutOfMemory { requested: 4 * WSIZE })?;
    if base != 0 {
      return Err(AllocError::UsedRegion { base });
    }

    arena.put(base, 0);
    arena.put(base + WSIZE, Tag::used(DSIZE).pack());
    arena.put(base + 2 * WSIZE, Tag::used(DSIZE).pack());
    arena.put(base + 3 * WSIZE, Tag::used(0).pack());

    let mut allocator = Self {
      arena,
      free: FreeList::new(),
      finder,
      chunk_size: align!(chunk_size.max(MIN_BLOCK_SIZE)),
    };

    allocator
      .extend_heap(allocator.chunk_size)
      .ok_or(AllocError::OutOfMemory {
        requested: allocator.chunk_size,
      })?;

    let head = allocator.free.head();
    allocator.free.set_cursor(head);

    log::debug!("Heap initialized with {} bytes", allocator.heap_size());

    Ok(allocator)
  }

  /// Grows the region by `size` bytes (rounded to the alignment), turns the
  /// new space into a free block and merges it with a free block that ended
  /// at the old epilogue.
  fn extend_heap(
    &mut self,
    size: usize,
  ) -> Option<usize> {
    let size = align!(size);

    let Some(bp) = self.arena.grow(size) else {
      log::warn!(
        "Heap extension of {} bytes failed at heap size {}",
        size,
        self.heap_size()
      );
      return None;
    };

    log::debug!("Extended heap by {} bytes at {}", size, bp);

    self.arena.set_tags(bp, Tag::free(size));
    let epilogue = self.arena.next_block(bp);
    self.arena.put(epilogue - WSIZE, Tag::used(0).pack());

    Some(self.coalesce(bp))
  }

  /// Merges the just-freed block `bp` with free physical neighbours and lists
  /// the result. Returns the payload offset of the merged block.
  fn coalesce(
    &mut self,
    bp: usize,
  ) -> usize {
    let prev = self.arena.prev_block(bp);
    let next = self.arena.next_block(bp);
    let prev_free = !self.arena.prev_allocated(bp);
    let next_free = !self.arena.tag(next).allocated;
    let mut size = self.arena.size(bp);

    let cursor = self.free.cursor();
    let cursor_merged =
      (next_free && cursor == Some(next)) || (prev_free && cursor == Some(prev));

    let bp = match (prev_free, next_free) {
      (false, false) => bp,
      (false, true) => {
        self.free.splice(&mut self.arena, next);
        size += self.arena.size(next);
        bp
      }
      (true, false) => {
        self.free.splice(&mut self.arena, prev);
        size += self.arena.size(prev);
        prev
      }
      (true, true) => {
        self.free.splice(&mut self.arena, prev);
        self.free.splice(&mut self.arena, next);
        size += self.arena.size(prev) + self.arena.size(next);
        prev
      }
    };

    log::trace!("coalesced into {} ({} bytes)", bp, size);

    self.arena.set_tags(bp, Tag::free(size));
    self.free.add(&mut self.arena, bp);

    if cursor_merged {
      self.free.set_cursor(Some(bp));
    }

    bp
  }

  /// Carves an `asize` block out of the free block `bp`, splitting off the
  /// remainder when it can stand as a block of its own.
  fn place(
    &mut self,
    bp: usize,
    asize: usize,
  ) {
    let csize = self.arena.size(bp);
    let next_listed = self.arena.succ(bp);

    self.free.splice(&mut self.arena, bp);

    if csize - asize >= MIN_BLOCK_SIZE {
      self.arena.set_tags(bp, Tag::used(asize));

      let remainder = self.arena.next_block(bp);
      self.arena.set_tags(remainder, Tag::free(csize - asize));
      self.free.add(&mut self.arena, remainder);
      self.free.set_cursor(Some(remainder));

      log::trace!("placed {} bytes at {}, split {} at {}", asize, bp, csize - asize, remainder);
    } else {
      self.arena.set_tags(bp, Tag::used(csize));
      self.free.set_cursor(next_listed);

      log::trace!("placed {} bytes at {} without split", csize, bp);
    }
  }

  /// Allocates a block with at least `size` usable bytes.
  ///
  /// Returns `None` for a zero-sized request or when the region cannot grow.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Option<usize> {
    if size == 0 {
      return None;
    }

    let asize = block::adjusted_size(size)?;

    let bp = match self.finder.find(&self.free, self.arena.bytes(), asize) {
      Some(bp) => bp,
      None => self.extend_heap(asize.max(self.chunk_size))?,
    };

    self.place(bp, asize);

    Some(bp)
  }

  /// Returns the block at `ptr` to the free list. `None` is a no-op.
  pub fn release(
    &mut self,
    ptr: impl Into<Option<usize>>,
  ) {
    let Some(bp) = ptr.into() else {
      return;
    };

    let size = self.arena.size(bp);
    self.arena.set_tags(bp, Tag::free(size));
    self.coalesce(bp);
  }

  /// Resizes the block at `ptr` to hold at least `size` bytes, keeping its
  /// contents up to the smaller of the two sizes.
  ///
  /// A `None` pointer allocates; a zero size releases and returns `None`.
  /// Shrinking never splits the block. When a new block cannot be obtained,
  /// `None` is returned and the original block stays valid.
  pub fn reallocate(
    &mut self,
    ptr: impl Into<Option<usize>>,
    size: usize,
  ) -> Option<usize> {
    let Some(bp) = ptr.into() else {
      return self.allocate(size);
    };

    if size == 0 {
      self.release(bp);
      return None;
    }

    let required = block::adjusted_size(size)?;
    let current = self.arena.size(bp);

    if current >= required {
      return Some(bp);
    }

    let next = self.arena.next_block(bp);
    let next_tag = self.arena.tag(next);
    if !next_tag.allocated && current + next_tag.size >= required {
      self.free.splice(&mut self.arena, next);
      self.arena.set_tags(bp, Tag::used(current + next_tag.size));

      log::trace!("grew {} in place to {} bytes", bp, current + next_tag.size);

      return Some(bp);
    }

    let new_bp = self.allocate(size)?;
    self.arena.copy_payload(bp, new_bp, (current - DSIZE).min(size));
    self.release(bp);

    Some(new_bp)
  }

  /// Usable payload bytes of the allocated block at `bp`.
  pub fn usable_size(
    &self,
    bp: usize,
  ) -> usize {
    self.arena.size(bp) - DSIZE
  }

  pub fn payload(
    &self,
    bp: usize,
  ) -> &[u8] {
    self.arena.payload(bp)
  }

  pub fn payload_mut(
    &mut self,
    bp: usize,
  ) -> &mut [u8] {
    self.arena.payload_mut(bp)
  }

  /// Bytes grown so far, prologue and epilogue included.
  pub fn heap_size(&self) -> usize {
    self.arena.len()
  }

  pub fn free_list(&self) -> &FreeList {
    &self.free
  }

  pub fn cursor(&self) -> Option<usize> {
    self.free.cursor()
  }

  /// The whole managed region.
  pub fn heap(&self) -> &[u8] {
    self.arena.bytes()
  }
}
