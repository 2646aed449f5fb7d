use thiserror::Error;

/// Failures while setting up an allocator or its backing region.
#[derive(Debug, Error)]
pub enum AllocError {
  #[error("Heap exhausted while requesting {requested} bytes")]
  OutOfMemory { requested: usize },

  #[error("Heap region is not fresh, its break is already at {base}")]
  UsedRegion { base: usize },

  #[error("Failed to map heap region: {0}")]
  Map(#[from] std::io::Error),
}

/// Invalid runtime settings.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
  #[error("Unknown fit strategy `{0}`")]
  UnknownStrategy(String),
}

/// Consistency violations reported by the heap checker.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeapError {
  #[error("Bad prologue block at {bp}")]
  BadPrologue { bp: usize },

  #[error("Bad epilogue at {offset} (heap size {heap_size})")]
  BadEpilogue { offset: usize, heap_size: usize },

  #[error("Block {bp} is not 8-byte aligned")]
  Misaligned { bp: usize },

  #[error("Block {bp} has invalid size {size}")]
  BadSize { bp: usize, size: usize },

  #[error("Block {bp} runs past the end of the heap")]
  OutOfBounds { bp: usize },

  #[error("Header and footer of block {bp} disagree")]
  TagMismatch { bp: usize },

  #[error("Adjacent free blocks {bp} and {next} escaped coalescing")]
  Uncoalesced { bp: usize, next: usize },

  #[error("Allocated block {bp} is on the free list")]
  AllocatedInList { bp: usize },

  #[error("Free-list link {bp} points outside the block chain")]
  StrayLink { bp: usize },

  #[error("Free-list links around {bp} are inconsistent")]
  BrokenLinks { bp: usize },

  #[error("Free list is cyclic")]
  Cycle,

  #[error("Free block {bp} is missing from the free list")]
  NotListed { bp: usize },

  #[error("Search cursor {bp} does not reference a listed free block")]
  DanglingCursor { bp: usize },
}

/// Failures while reading an allocation trace.
#[derive(Debug, Error)]
pub enum TraceError {
  #[error("Io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Trace header is missing the {0} field")]
  MissingHeader(&'static str),

  #[error("Line {line}: cannot parse `{text}`")]
  Parse { line: usize, text: String },

  #[error("Line {line}: unknown operation `{op}`")]
  UnknownOp { line: usize, op: String },

  #[error("Line {line}: id {id} is outside the declared {num_ids} ids")]
  IdOutOfRange { line: usize, id: usize, num_ids: usize },

  #[error("Trace declares {declared} operations but contains {found}")]
  OpCountMismatch { declared: usize, found: usize },
}

/// Failures detected while replaying a trace against an allocator.
#[derive(Debug, Error)]
pub enum ReplayError {
  #[error("Operation {op}: allocator ran out of memory")]
  OutOfMemory { op: usize },

  #[error("Operation {op}: payload {bp} is not 8-byte aligned")]
  Misaligned { op: usize, bp: usize },

  #[error("Operation {op}: payload {bp}+{size} lies outside the heap or its block")]
  OutOfBounds { op: usize, bp: usize, size: usize },

  #[error("Operation {op}: payload {bp} overlaps the live allocation of id {other}")]
  Overlap { op: usize, bp: usize, other: usize },

  #[error("Operation {op}: payload of id {id} was corrupted")]
  Corrupted { op: usize, id: usize },

  #[error("Operation {op}: id {id} is not live")]
  NotLive { op: usize, id: usize },

  #[error("Operation {op}: id {id} is already live")]
  AlreadyLive { op: usize, id: usize },

  #[error("Operation {op}: {source}")]
  Heap {
    op: usize,
    #[source]
    source: HeapError,
  },
}
