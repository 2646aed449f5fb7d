use rand::{Rng, SeedableRng, rngs::StdRng};
use tagalloc::{Allocator, BestFit, FitFinder, Grower, NextFit, RandomFit, VecGrower, WeightedFit};

fn fill(
  allocator: &mut Allocator<impl Grower, impl FitFinder>,
  bp: usize,
  len: usize,
) {
  for (i, byte) in allocator.payload_mut(bp)[..len].iter_mut().enumerate() {
    *byte = (i * 13 + 7) as u8;
  }
}

fn intact(
  allocator: &Allocator<impl Grower, impl FitFinder>,
  bp: usize,
  len: usize,
) -> bool {
  allocator.payload(bp)[..len]
    .iter()
    .enumerate()
    .all(|(i, &byte)| byte == (i * 13 + 7) as u8)
}

fn chained_reallocs_preserve_prefix<F: FitFinder>(mut allocator: Allocator<VecGrower, F>) {
  let mut rng = StdRng::seed_from_u64(42);
  // neighbours so reallocs exercise every path
  let mut others = Vec::new();

  for _ in 0..200 {
    let n0 = rng.gen_range(1..2000);
    let n1 = rng.gen_range(1..2000);
    let n2 = rng.gen_range(1..2000);

    let p = allocator.allocate(n0).unwrap();
    fill(&mut allocator, p, n0);
    others.push(allocator.allocate(rng.gen_range(1..200)).unwrap());

    let p = allocator.reallocate(p, n1).unwrap();
    let p = allocator.reallocate(p, n2).unwrap();

    assert_eq!(p % 8, 0);
    assert!(allocator.usable_size(p) >= n2);
    assert!(intact(&allocator, p, n0.min(n1).min(n2)));

    allocator.release(p);
    if rng.gen_bool(0.5) {
      let index = rng.gen_range(0..others.len());
      allocator.release(others.swap_remove(index));
    }
    allocator.check().unwrap();
  }
}

#[test]
fn test_chained_reallocs_preserve_prefix() {
  chained_reallocs_preserve_prefix(Allocator::new(VecGrower::default(), NextFit).unwrap());
  chained_reallocs_preserve_prefix(Allocator::new(VecGrower::default(), BestFit).unwrap());
  chained_reallocs_preserve_prefix(Allocator::new(VecGrower::default(), RandomFit::seeded(8)).unwrap());
  chained_reallocs_preserve_prefix(Allocator::new(VecGrower::default(), WeightedFit::seeded(8)).unwrap());
}

#[test]
fn test_realloc_growth_at_heap_end_merges_extension() {
  let mut allocator = Allocator::new(VecGrower::default(), BestFit).unwrap();
  let p = allocator.allocate(4000).unwrap();
  fill(&mut allocator, p, 4000);

  let q = allocator.reallocate(p, 20000).unwrap();

  assert!(intact(&allocator, q, 4000));
  assert!(allocator.usable_size(q) >= 20000);
  allocator.check().unwrap();
}

#[cfg(unix)]
#[test]
fn test_mmap_backed_allocator() {
  let grower = tagalloc::MmapGrower::new(1 << 20).unwrap();
  let mut allocator = Allocator::new(grower, NextFit).unwrap();

  let p = allocator.allocate(1000).unwrap();
  fill(&mut allocator, p, 1000);
  let q = allocator.reallocate(p, 3000).unwrap();

  assert!(intact(&allocator, q, 1000));
  assert_eq!(allocator.allocate(1 << 20), None);
  allocator.check().unwrap();
}
