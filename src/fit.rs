//! Fit strategies.
//!
//! A [`FitFinder`] only reads the free list; the placer mutates it afterwards.

use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};

use crate::{
  block,
  free_list::{FreeBlock, FreeList},
};

pub trait FitFinder {
  /// Picks a listed free block of at least `asize` bytes, if there is one.
  fn find(
    &mut self,
    list: &FreeList,
    heap: &[u8],
    asize: usize,
  ) -> Option<usize>;
}

impl<F: FitFinder + ?Sized> FitFinder for Box<F> {
  fn find(
    &mut self,
    list: &FreeList,
    heap: &[u8],
    asize: usize,
  ) -> Option<usize> {
    (**self).find(list, heap, asize)
  }
}

/// First fit starting at the search cursor, wrapping around to the head.
#[derive(Debug, Default, Clone, Copy)]
pub struct NextFit;

impl FitFinder for NextFit {
  fn find(
    &mut self,
    list: &FreeList,
    heap: &[u8],
    asize: usize,
  ) -> Option<usize> {
    let start = list
      .cursor()
      .filter(|&bp| !block::header(heap, bp).allocated)
      .or(list.head())?;

    let fits = |block: &FreeBlock| block.size >= asize;

    list
      .iter_from(heap, Some(start))
      .find(fits)
      .or_else(|| list.iter(heap).take_while(|block| block.bp != start).find(fits))
      .map(|block| block.bp)
  }
}

/// Smallest qualifying block over the whole list.
///
/// A scanned block whose size equals `asize` ends the scan at once, whatever
/// the best candidate so far.
#[derive(Debug, Default, Clone, Copy)]
pub struct BestFit;

impl FitFinder for BestFit {
  fn find(
    &mut self,
    list: &FreeList,
    heap: &[u8],
    asize: usize,
  ) -> Option<usize> {
    let mut best: Option<FreeBlock> = None;

    for block in list.iter(heap).filter(|block| block.size >= asize) {
      if block.size == asize {
        return Some(block.bp);
      }

      if best.is_none_or(|best| block.size < best.size) {
        best = Some(block);
      }
    }

    best.map(|block| block.bp)
  }
}

/// Uniformly random choice among all qualifying blocks.
#[derive(Debug, Clone)]
pub struct RandomFit<R = StdRng> {
  rng: R,
}

impl<R: RngCore> RandomFit<R> {
  pub fn new(rng: R) -> Self {
    Self { rng }
  }
}

impl RandomFit {
  pub fn seeded(seed: u64) -> Self {
    Self::new(StdRng::seed_from_u64(seed))
  }
}

impl<R: RngCore> FitFinder for RandomFit<R> {
  fn find(
    &mut self,
    list: &FreeList,
    heap: &[u8],
    asize: usize,
  ) -> Option<usize> {
    let count = list.iter(heap).filter(|block| block.size >= asize).count();
    if count == 0 {
      return None;
    }

    let index = self.rng.gen_range(0..count);

    list
      .iter(heap)
      .filter(|block| block.size >= asize)
      .nth(index)
      .map(|block| block.bp)
  }
}

/// Single pass accepting each qualifying block with a probability that drops
/// as its slack grows. Falls back to the last qualifying block seen.
#[derive(Debug, Clone)]
pub struct WeightedFit<R = StdRng> {
  rng: R,
}

impl<R: RngCore> WeightedFit<R> {
  pub fn new(rng: R) -> Self {
    Self { rng }
  }
}

impl WeightedFit {
  pub fn seeded(seed: u64) -> Self {
    Self::new(StdRng::seed_from_u64(seed))
  }
}

/// Acceptance weight, out of ten, for a block with `slack` spare bytes.
pub fn weight(slack: usize) -> u32 {
  match slack {
    0 => 10,
    1..=32 => 7,
    33..=64 => 4,
    _ => 1,
  }
}

impl<R: RngCore> FitFinder for WeightedFit<R> {
  fn find(
    &mut self,
    list: &FreeList,
    heap: &[u8],
    asize: usize,
  ) -> Option<usize> {
    let mut fallback = None;

    for block in list.iter(heap).filter(|block| block.size >= asize) {
      if self.rng.next_u32() % 10 < weight(block.size - asize) {
        return Some(block.bp);
      }

      fallback = Some(block.bp);
    }

    fallback
  }
}
