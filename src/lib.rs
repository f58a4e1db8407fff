//! emkit: external-memory computation primitives.
//!
//! Two engines share this crate:
//!
//! - [`cache`] — a set-associative LRU cache with a write-back contract,
//!   the eviction engine under block-device style abstractions;
//! - [`sort`] — a parallel in-place quicksort scheduled on the worker pool
//!   in [`runtime`], with monotone progress reporting.
//!
//! See `DESIGN.md` in the repository root for design notes and invariants.

pub mod cache;
pub mod error;
pub mod runtime;
pub mod sort;

#[cfg(feature = "metrics")]
pub mod metrics;

pub mod prelude;
pub mod traits;
