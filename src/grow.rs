//! Heap-growth primitives.
//!
//! A [`Grower`] owns a contiguous byte region and extends it on request, the
//! way `sbrk(2)` moves the program break. Extensions never relocate what was
//! handed out before, so offsets stay valid for the lifetime of the grower.

use std::{io, ptr, slice};

use crate::error::AllocError;

/// Default ceiling for a grower's region.
pub const MAX_HEAP: usize = 20 * (1 << 20);

pub trait Grower {
  /// Extends the region by `incr` bytes and returns the offset where the
  /// extension starts (the old break), or `None` if the region is exhausted.
  fn grow(
    &mut self,
    incr: usize,
  ) -> Option<usize>;

  /// The region grown so far.
  fn bytes(&self) -> &[u8];

  fn bytes_mut(&mut self) -> &mut [u8];
}

/// Region backed by a `Vec<u8>` that refuses to grow past a fixed maximum.
#[derive(Debug, Clone)]
pub struct VecGrower {
  heap: Vec<u8>,
  max: usize,
}

impl VecGrower {
  pub fn new(max: usize) -> Self {
    Self {
      heap: Vec::new(),
      max,
    }
  }
}

impl Default for VecGrower {
  fn default() -> Self {
    Self::new(MAX_HEAP)
  }
}

impl Grower for VecGrower {
  fn grow(
    &mut self,
    incr: usize,
  ) -> Option<usize> {
    let old_brk = self.heap.len();
    let new_brk = old_brk.checked_add(incr).filter(|&brk| brk <= self.max)?;

    self.heap.resize(new_brk, 0);

    Some(old_brk)
  }

  fn bytes(&self) -> &[u8] {
    &self.heap
  }

  fn bytes_mut(&mut self) -> &mut [u8] {
    &mut self.heap
  }
}

/// Region reserved up front with an anonymous `mmap`, with a break that moves
/// inside the reservation. Pages are only committed once touched.
#[cfg(unix)]
#[derive(Debug)]
pub struct MmapGrower {
  base: *mut u8,
  brk: usize,
  max: usize,
}

#[cfg(unix)]
impl MmapGrower {
  pub fn new(max: usize) -> Result<Self, AllocError> {
    // SAFETY: a fresh anonymous private mapping aliases nothing, and the
    // result is checked against MAP_FAILED before use.
    let base = unsafe {
      libc::mmap(
        ptr::null_mut(),
        max.max(1),
        libc::PROT_READ | libc::PROT_WRITE,
        libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if base == libc::MAP_FAILED {
      return Err(AllocError::Map(io::Error::last_os_error()));
    }

    log::debug!("Reserved {} bytes for heap at {:p}", max, base);

    Ok(Self {
      base: base as *mut u8,
      brk: 0,
      max,
    })
  }
}

#[cfg(unix)]
impl Grower for MmapGrower {
  fn grow(
    &mut self,
    incr: usize,
  ) -> Option<usize> {
    let old_brk = self.brk;
    self.brk = old_brk.checked_add(incr).filter(|&brk| brk <= self.max)?;

    Some(old_brk)
  }

  fn bytes(&self) -> &[u8] {
    // SAFETY: `[base, base + brk)` lies inside the live mapping and is only
    // reachable through `&self`.
    unsafe { slice::from_raw_parts(self.base, self.brk) }
  }

  fn bytes_mut(&mut self) -> &mut [u8] {
    // SAFETY: as above, with unique access through `&mut self`.
    unsafe { slice::from_raw_parts_mut(self.base, self.brk) }
  }
}

#[cfg(unix)]
impl Drop for MmapGrower {
  fn drop(&mut self) {
    // SAFETY: `base` and `max.max(1)` are exactly the mapping made in `new`,
    // and no slice borrowed from it can outlive `self`.
    unsafe {
      libc::munmap(self.base as *mut libc::c_void, self.max.max(1));
    }
  }
}

// SAFETY: the grower owns its mapping outright and only exposes it through
// borrows of `self`, so moving it to another thread moves all access with it.
#[cfg(unix)]
unsafe impl Send for MmapGrower {}
