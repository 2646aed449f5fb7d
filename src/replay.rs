//! Trace replay with a reference model of byte ownership.
//!
//! Every live id owns `[bp, bp + requested)`. The model rejects payloads that
//! are misaligned, poke outside the heap or their block, or overlap another
//! live range, and stamps each payload with an id-derived pattern so that
//! later operations can tell whether anyone else wrote over it.

use std::collections::BTreeMap;

use crate::{
  allocator::Allocator,
  align::ALIGNMENT,
  error::ReplayError,
  fit::FitFinder,
  grow::Grower,
  trace::{Trace, TraceOp},
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplayOptions {
  /// Run the heap checker after every operation.
  pub check_heap: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ReplayStats {
  pub ops: usize,
  pub peak_live_bytes: usize,
  pub heap_size: usize,
  /// Peak live payload over final heap size.
  pub utilization: f64,
}

#[derive(Debug, Clone, Copy)]
struct Live {
  bp: usize,
  size: usize,
}

fn pattern(
  id: usize,
  index: usize,
) -> u8 {
  (id.wrapping_mul(0x9E37) ^ index) as u8
}

/// Live ranges keyed by start offset, plus the owner of each.
#[derive(Debug, Default)]
pub struct OwnershipModel {
  live: BTreeMap<usize, Live>,
  ranges: BTreeMap<usize, (usize, usize)>,
  live_bytes: usize,
}

impl OwnershipModel {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn live_bytes(&self) -> usize {
    self.live_bytes
  }

  fn owner_overlapping(
    &self,
    bp: usize,
    size: usize,
  ) -> Option<usize> {
    self
      .ranges
      .range(..bp + size)
      .next_back()
      .filter(|(_, (end, _))| *end > bp)
      .map(|(_, (_, id))| *id)
  }

  fn claim<G: Grower, F: FitFinder>(
    &mut self,
    allocator: &mut Allocator<G, F>,
    op: usize,
    id: usize,
    bp: usize,
    size: usize,
  ) -> Result<(), ReplayError> {
    if bp % ALIGNMENT != 0 {
      return Err(ReplayError::Misaligned { op, bp });
    }
    if bp + size > allocator.heap_size() {
      return Err(ReplayError::OutOfBounds { op, bp, size });
    }
    if let Some(other) = self.owner_overlapping(bp, size) {
      return Err(ReplayError::Overlap { op, bp, other });
    }
    if allocator.usable_size(bp) < size {
      return Err(ReplayError::OutOfBounds { op, bp, size });
    }

    for (index, byte) in allocator.payload_mut(bp)[..size].iter_mut().enumerate() {
      *byte = pattern(id, index);
    }

    self.ranges.insert(bp, (bp + size, id));
    self.live.insert(id, Live { bp, size });
    self.live_bytes += size;

    Ok(())
  }

  fn surrender(
    &mut self,
    id: usize,
  ) -> Option<Live> {
    let live = self.live.remove(&id)?;

    self.ranges.remove(&live.bp);
    self.live_bytes -= live.size;

    Some(live)
  }

  fn verify<G: Grower, F: FitFinder>(
    allocator: &Allocator<G, F>,
    op: usize,
    id: usize,
    bp: usize,
    len: usize,
  ) -> Result<(), ReplayError> {
    let intact = allocator.payload(bp)[..len]
      .iter()
      .enumerate()
      .all(|(index, &byte)| byte == pattern(id, index));

    if intact {
      Ok(())
    } else {
      Err(ReplayError::Corrupted { op, id })
    }
  }

  /// Issues one trace operation and checks the result against the model.
  pub fn apply<G: Grower, F: FitFinder>(
    &mut self,
    allocator: &mut Allocator<G, F>,
    op: usize,
    trace_op: TraceOp,
  ) -> Result<(), ReplayError> {
    log::trace!("op {}: {:?}", op, trace_op);

    match trace_op {
      TraceOp::Alloc { id, size } => {
        if self.live.contains_key(&id) {
          return Err(ReplayError::AlreadyLive { op, id });
        }
        if size == 0 {
          return Ok(());
        }

        let bp = allocator
          .allocate(size)
          .ok_or(ReplayError::OutOfMemory { op })?;
        self.claim(allocator, op, id, bp, size)
      }
      TraceOp::Realloc { id, size } => {
        let old = self.surrender(id);

        if let Some(old) = old {
          Self::verify(allocator, op, id, old.bp, old.size)?;
        }

        let new_bp = allocator.reallocate(old.map(|old| old.bp), size);
        if size == 0 {
          return Ok(());
        }

        let bp = new_bp.ok_or(ReplayError::OutOfMemory { op })?;
        if let Some(old) = old {
          Self::verify(allocator, op, id, bp, old.size.min(size))?;
        }

        self.claim(allocator, op, id, bp, size)
      }
      TraceOp::Free { id } => {
        let live = self.surrender(id).ok_or(ReplayError::NotLive { op, id })?;

        Self::verify(allocator, op, id, live.bp, live.size)?;
        allocator.release(live.bp);

        Ok(())
      }
    }
  }
}

/// Replays `trace` against `allocator`, validating every operation.
pub fn replay<G: Grower, F: FitFinder>(
  allocator: &mut Allocator<G, F>,
  trace: &Trace,
  options: ReplayOptions,
) -> Result<ReplayStats, ReplayError> {
  let mut model = OwnershipModel::new();
  let mut peak_live_bytes = 0;

  for (op, &trace_op) in trace.ops.iter().enumerate() {
    model.apply(allocator, op, trace_op)?;
    peak_live_bytes = peak_live_bytes.max(model.live_bytes());

    if options.check_heap {
      allocator
        .check()
        .map_err(|source| ReplayError::Heap { op, source })?;
    }
  }

  let heap_size = allocator.heap_size();

  Ok(ReplayStats {
    ops: trace.ops.len(),
    peak_live_bytes,
    heap_size,
    utilization: peak_live_bytes as f64 / heap_size as f64,
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    config::{Config, FitStrategy},
    fit::BestFit,
    grow::VecGrower,
  };

  const SHORT: &str = "20000\n3\n8\n1\n\
    a 0 512\na 1 128\nr 0 640\na 2 40\nr 2 8\nf 1\nr 2 0\nf 0\n";

  #[test]
  fn test_replay_short_trace_with_every_strategy() {
    let trace: Trace = SHORT.parse().unwrap();

    for strategy in FitStrategy::ALL {
      let mut allocator = Config {
        strategy,
        ..Config::default()
      }
      .build()
      .unwrap();

      let stats = replay(&mut allocator, &trace, ReplayOptions { check_heap: true }).unwrap();

      assert_eq!(stats.ops, 8);
      assert_eq!(stats.peak_live_bytes, 640 + 128 + 40);
      assert!(stats.utilization > 0.0 && stats.utilization <= 1.0);
      assert_eq!(allocator.check().unwrap().allocated_bytes, 0);
    }
  }

  #[test]
  fn test_replay_reports_exhaustion() {
    let trace: Trace = "0\n1\n1\n1\na 0 100000\n".parse().unwrap();
    let mut allocator = Allocator::new(VecGrower::new(1 << 16), BestFit).unwrap();

    assert!(matches!(
      replay(&mut allocator, &trace, ReplayOptions::default()),
      Err(ReplayError::OutOfMemory { op: 0 })
    ));
  }

  #[test]
  fn test_replay_rejects_free_of_dead_id() {
    let trace: Trace = "0\n1\n2\n1\na 0 10\nf 0\n".parse().unwrap();
    let mut allocator = Allocator::new(VecGrower::default(), BestFit).unwrap();
    let mut model = OwnershipModel::new();

    for (op, &trace_op) in trace.ops.iter().enumerate() {
      model.apply(&mut allocator, op, trace_op).unwrap();
    }

    assert!(matches!(
      model.apply(&mut allocator, 2, TraceOp::Free { id: 0 }),
      Err(ReplayError::NotLive { op: 2, id: 0 })
    ));
  }

  #[test]
  fn test_model_detects_overlap_and_corruption() {
    let mut allocator = Allocator::new(VecGrower::default(), BestFit).unwrap();
    let mut model = OwnershipModel::new();
    model
      .apply(&mut allocator, 0, TraceOp::Alloc { id: 0, size: 32 })
      .unwrap();
    let bp = model.live[&0].bp;

    assert!(matches!(
      model.claim(&mut allocator, 1, 1, bp + 8, 8),
      Err(ReplayError::Overlap { op: 1, other: 0, .. })
    ));

    allocator.payload_mut(bp)[3] ^= 0xFF;
    assert!(matches!(
      model.apply(&mut allocator, 2, TraceOp::Free { id: 0 }),
      Err(ReplayError::Corrupted { op: 2, id: 0 })
    ));
  }

  #[test]
  fn test_replay_rejects_alloc_of_live_id() {
    let trace: Trace = "0\n1\n3\n1\na 0 100\na 0 100\nf 0\n".parse().unwrap();
    let mut allocator = Allocator::new(VecGrower::default(), BestFit).unwrap();

    assert!(matches!(
      replay(&mut allocator, &trace, ReplayOptions::default()),
      Err(ReplayError::AlreadyLive { op: 1, id: 0 })
    ));
    assert_eq!(allocator.check().unwrap().allocated_bytes, 112);
  }

  #[test]
  fn test_replay_with_huge_id_space() {
    let trace: Trace = "0\n18446744073709551615\n2\n1\na 4000000000 24\nf 4000000000\n"
      .parse()
      .unwrap();
    let mut allocator = Allocator::new(VecGrower::default(), BestFit).unwrap();

    let stats = replay(&mut allocator, &trace, ReplayOptions { check_heap: true }).unwrap();

    assert_eq!(stats.peak_live_bytes, 24);
    assert_eq!(allocator.check().unwrap().allocated_bytes, 0);
  }
}
