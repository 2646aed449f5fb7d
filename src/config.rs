use std::{fmt, str::FromStr};

use crate::{
  allocator::Allocator,
  block::CHUNK_SIZE,
  error::{AllocError, ConfigError},
  fit::{BestFit, FitFinder, NextFit, RandomFit, WeightedFit},
  grow::{Grower, MAX_HEAP, VecGrower},
};

/// Which fit strategy an allocator searches its free list with.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum FitStrategy {
  NextFit,
  #[default]
  BestFit,
  RandomFit,
  WeightedFit,
}

impl FitStrategy {
  pub const ALL: [FitStrategy; 4] = [
    FitStrategy::NextFit,
    FitStrategy::BestFit,
    FitStrategy::RandomFit,
    FitStrategy::WeightedFit,
  ];

  /// Builds the finder; `seed` only matters to the randomized strategies.
  pub fn finder(
    self,
    seed: u64,
  ) -> Box<dyn FitFinder> {
    match self {
      FitStrategy::NextFit => Box::new(NextFit),
      FitStrategy::BestFit => Box::new(BestFit),
      FitStrategy::RandomFit => Box::new(RandomFit::seeded(seed)),
      FitStrategy::WeightedFit => Box::new(WeightedFit::seeded(seed)),
    }
  }
}

impl FromStr for FitStrategy {
  type Err = ConfigError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "next" | "next-fit" => Ok(FitStrategy::NextFit),
      "best" | "best-fit" => Ok(FitStrategy::BestFit),
      "random" | "random-fit" => Ok(FitStrategy::RandomFit),
      "weighted" | "weighted-fit" => Ok(FitStrategy::WeightedFit),
      _ => Err(ConfigError::UnknownStrategy(s.to_string())),
    }
  }
}

impl fmt::Display for FitStrategy {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    let name = match self {
      FitStrategy::NextFit => "next",
      FitStrategy::BestFit => "best",
      FitStrategy::RandomFit => "random",
      FitStrategy::WeightedFit => "weighted",
    };

    f.write_str(name)
  }
}

/// Settings for building an allocator at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
  pub strategy: FitStrategy,
  pub seed: u64,
  pub chunk_size: usize,
  pub max_heap: usize,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      strategy: FitStrategy::default(),
      seed: 0,
      chunk_size: CHUNK_SIZE,
      max_heap: MAX_HEAP,
    }
  }
}

impl Config {
  /// Allocator over a `Vec`-backed region of at most `max_heap` bytes.
  pub fn build(&self) -> Result<Allocator<VecGrower, Box<dyn FitFinder>>, AllocError> {
    self.build_with(VecGrower::new(self.max_heap))
  }

  pub fn build_with<G: Grower>(
    &self,
    grower: G,
  ) -> Result<Allocator<G, Box<dyn FitFinder>>, AllocError> {
    Allocator::with_chunk_size(grower, self.strategy.finder(self.seed), self.chunk_size)
  }
}
