//! # tagalloc - A Boundary-Tag Allocator with an Explicit Free List
//!
//! This crate provides a dynamic memory allocator that manages one growable,
//! contiguous byte region and services allocate / release / reallocate
//! requests against it.
//!
//! ## Overview
//!
//! The region is carved into blocks. Each block records its size and
//! allocation state twice, in a header and in a footer, so neighbours can be
//! found in both directions. Free blocks are threaded onto a doubly-linked
//! list whose links live inside their own (unused) payload:
//!
//! ```text
//!   Heap Layout:
//!
//!   ┌─────┬───────────┬──────────────┬─────────────┬──────────────┬─────┐
//!   │ pad │ prologue  │ block A      │ block B     │ block C      │ epi │
//!   │     │ 8 | alloc │ 112 | alloc  │ 64 | free   │ 3920 | free  │ 0|1 │
//!   └─────┴───────────┴──────────────┴──────▲──────┴──────▲───────┴─────┘
//!                                           │             │
//!                                 free list: head ──► B ──► C ──► None
//! ```
//!
//! The prologue and epilogue are permanently allocated sentinels, so the
//! coalescer never has to special-case the ends of the heap.
//!
//! ## Crate Structure
//!
//! ```text
//!   tagalloc
//!   ├── align      - Alignment macro (align!)
//!   ├── block      - Boundary tags, block constants, request sizing
//!   ├── grow       - Heap-growth primitives (VecGrower, MmapGrower)
//!   ├── arena      - Bounds-checked access to tags, links and payloads
//!   ├── free_list  - Explicit LIFO free list and next-fit cursor
//!   ├── fit        - Fit strategies (next, best, random, weighted)
//!   ├── allocator  - Allocator: init, allocate, release, reallocate
//!   ├── check      - Heap consistency checker
//!   ├── config     - Runtime strategy and sizing selection
//!   ├── trace      - Allocation trace format
//!   └── replay     - Trace replay against a byte-ownership model
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagalloc::{Allocator, BestFit, VecGrower};
//!
//! let mut allocator = Allocator::new(VecGrower::default(), BestFit).unwrap();
//!
//! let bp = allocator.allocate(100).unwrap();
//! allocator.payload_mut(bp)[..5].copy_from_slice(b"hello");
//!
//! let bp = allocator.reallocate(bp, 400).unwrap();
//! assert_eq!(&allocator.payload(bp)[..5], b"hello");
//!
//! allocator.release(bp);
//! allocator.check().unwrap();
//! ```
//!
//! ## How It Works
//!
//! ```text
//!   allocate(n)
//!     │
//!     ├─► fit finder searches the free list ──► found ──► place (split?)
//!     │                                                     │
//!     └─► nothing fits ──► extend heap ──► coalesce ────────┘
//!
//!   release(bp)
//!     └─► clear allocated bit ──► coalesce with neighbours ──► push on list
//!
//!   reallocate(bp, n)
//!     ├─► block already large enough      ──► same bp
//!     ├─► next block free and big enough  ──► absorb it, same bp
//!     └─► otherwise                       ──► allocate, copy, release
//! ```
//!
//! Addresses are offsets into the managed region. The null address is
//! `None`, and every payload offset handed out is 8-byte aligned.
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **No shrinking**: The region only grows, and reallocate never splits
//! - **Trusting**: Double frees and foreign offsets are not detected
//! - **4 GiB ceiling**: Tags are 32-bit words

pub mod align;
pub mod allocator;
pub mod arena;
pub mod block;
pub mod check;
pub mod config;
pub mod error;
pub mod fit;
pub mod free_list;
pub mod grow;
pub mod replay;
pub mod trace;

pub use allocator::Allocator;
pub use check::{BlockInfo, HeapStats};
pub use config::{Config, FitStrategy};
pub use error::{AllocError, ConfigError, HeapError, ReplayError, TraceError};
pub use fit::{BestFit, FitFinder, NextFit, RandomFit, WeightedFit};
pub use free_list::FreeList;
#[cfg(unix)]
pub use grow::MmapGrower;
pub use grow::{Grower, VecGrower};
pub use replay::{ReplayOptions, ReplayStats, replay};
pub use trace::{Trace, TraceOp};
