//! Parallel in-place sort with progress reporting.
//!
//! [`ParallelSorter`] owns a [`JobPool`] and sorts random-access ranges by
//! recursive partitioning: ranges at or above the cutoff are split and the
//! halves sorted concurrently, ranges below it fall back to the standard
//! library's sequential unstable sort. The sort is not stable, and the
//! caller's thread blocks until the range is fully sorted — the pool only
//! supplies the parallelism.
//!
//! For one-shot use the free functions [`parallel_sort`],
//! [`parallel_sort_by`] and [`parallel_sort_with_progress`] build a
//! default-configured sorter per call. Reuse a [`ParallelSorter`] when
//! sorting many ranges; worker threads are started once at build time.
//!
//! ```
//! use emkit::sort::parallel_sort;
//!
//! let mut v = vec![5, 2, 8, 1, 9, 3, 7, 4, 6, 0];
//! parallel_sort(&mut v);
//! assert_eq!(v, (0..10).collect::<Vec<_>>());
//! ```

use std::mem;
use std::sync::Arc;

use crate::error::BuildError;
use crate::runtime::JobPool;
use crate::traits::ProgressSink;

mod parallel;
mod progress;

use parallel::{cmp_from_less, sort_work, QsortJob, SortShared};
use progress::SortProgress;

/// Ranges smaller than this many bytes are sorted sequentially.
const SEQUENTIAL_CUTOFF_BYTES: usize = 8 * 1024 * 1024;

/// Default cutoff in elements for a given element type.
fn default_min_size<T>() -> usize {
    (SEQUENTIAL_CUTOFF_BYTES / mem::size_of::<T>().max(1)).max(2)
}

/// Configures and builds a [`ParallelSorter`].
///
/// # Example
///
/// ```
/// use emkit::sort::ParallelSorterBuilder;
///
/// let sorter = ParallelSorterBuilder::new()
///     .with_threads(2)
///     .with_min_size(1024)
///     .build()
///     .unwrap();
///
/// let mut v: Vec<u64> = (0..10_000).rev().collect();
/// sorter.sort(&mut v);
/// assert!(v.windows(2).all(|w| w[0] <= w[1]));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ParallelSorterBuilder {
    /// Number of worker threads; `None` selects the machine's available
    /// parallelism.
    threads: Option<usize>,
    /// Sequential cutoff in elements; `None` selects a per-type default of
    /// roughly 8 MiB worth of elements.
    min_size: Option<usize>,
}

impl ParallelSorterBuilder {
    /// Creates a builder with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of worker threads. Zero is rejected at build time.
    pub fn with_threads(mut self, threads: usize) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Sets the sequential cutoff in elements. Values below 2 are clamped
    /// to 2 (a sub-2 range cannot be partitioned).
    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = Some(min_size);
        self
    }

    /// Starts the worker pool and returns the sorter.
    pub fn build(self) -> Result<ParallelSorter, BuildError> {
        let threads = self.threads.unwrap_or_else(JobPool::default_threads);
        let pool = JobPool::new(threads)?;
        Ok(ParallelSorter {
            pool,
            min_size: self.min_size.map(|m| m.max(2)),
        })
    }
}

/// Reusable parallel sorter backed by an owned worker pool.
///
/// See the [module docs](self) for the sorting scheme. All `sort*` methods
/// block the calling thread until the range is sorted; the element type must
/// be `Send + 'static` because sub-ranges are handed to pool workers.
pub struct ParallelSorter {
    pool: JobPool,
    min_size: Option<usize>,
}

impl ParallelSorter {
    /// Builds a sorter with default configuration.
    pub fn new() -> Result<Self, BuildError> {
        ParallelSorterBuilder::new().build()
    }

    /// Returns a fresh builder.
    pub fn builder() -> ParallelSorterBuilder {
        ParallelSorterBuilder::new()
    }

    /// Returns the number of worker threads.
    #[inline]
    pub fn threads(&self) -> usize {
        self.pool.threads()
    }

    /// Sorts `data` in place under the natural `Ord` order.
    pub fn sort<T>(&self, data: &mut [T])
    where
        T: Ord + Send + 'static,
    {
        self.sort_by(data, |a: &T, b: &T| a < b);
    }

    /// Sorts `data` in place under the strict-weak-ordering predicate
    /// `is_less`. Equal elements may end up in any relative order.
    pub fn sort_by<T, F>(&self, data: &mut [T], is_less: F)
    where
        T: Send + 'static,
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        self.sort_impl(data, None, is_less);
    }

    /// Sorts `data` in place, reporting work-unit progress to `sink`.
    ///
    /// The sink sees exactly one `init`, then `step` deltas summing to the
    /// `init` total, then exactly one `done` — all on the calling thread.
    pub fn sort_with_progress<T, F, P>(&self, data: &mut [T], sink: &mut P, is_less: F)
    where
        T: Send + 'static,
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
        P: ProgressSink,
    {
        self.sort_impl(data, Some(sink), is_less);
    }

    fn sort_impl<T, F>(&self, data: &mut [T], mut sink: Option<&mut dyn ProgressSink>, is_less: F)
    where
        T: Send + 'static,
        F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    {
        let n = data.len();
        let total = sort_work(n as u64);
        if let Some(s) = sink.as_mut() {
            s.init(total);
        }

        let min_size = self.min_size.unwrap_or_else(default_min_size::<T>);
        if n < min_size {
            data.sort_unstable_by(|a, b| cmp_from_less(&is_less, a, b));
            if let Some(s) = sink.as_mut() {
                if total > 0 {
                    s.step(total);
                }
                s.done();
            }
            return;
        }

        let progress = Arc::new(SortProgress::new(total));
        let shared = Arc::new(SortShared::new(data, is_less, min_size, progress.clone()));
        let root = self.pool.enqueue(Box::new(QsortJob::root(shared)));

        if let Some(s) = sink.as_mut() {
            progress.wait_with(|delta| s.step(delta));
        }
        self.pool.join(root);
        if let Some(s) = sink {
            s.done();
        }
    }
}

/// Sorts `data` in place under the natural `Ord` order using a
/// default-configured sorter.
///
/// Falls back to a sequential sort (with a warning) in the unlikely event
/// that the worker pool cannot be started.
pub fn parallel_sort<T>(data: &mut [T])
where
    T: Ord + Send + 'static,
{
    parallel_sort_by(data, |a: &T, b: &T| a < b);
}

/// Sorts `data` in place under `is_less` using a default-configured sorter.
pub fn parallel_sort_by<T, F>(data: &mut [T], is_less: F)
where
    T: Send + 'static,
    F: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    match ParallelSorter::new() {
        Ok(sorter) => sorter.sort_by(data, is_less),
        Err(err) => {
            log::warn!("parallel sort unavailable ({err}); sorting sequentially");
            data.sort_unstable_by(|a, b| cmp_from_less(&is_less, a, b));
        }
    }
}

/// Sorts `data` in place under `is_less`, reporting progress to `sink`,
/// using a default-configured sorter.
pub fn parallel_sort_with_progress<T, F, P>(data: &mut [T], sink: &mut P, is_less: F)
where
    T: Send + 'static,
    F: Fn(&T, &T) -> bool + Send + Sync + 'static,
    P: ProgressSink,
{
    match ParallelSorter::new() {
        Ok(sorter) => sorter.sort_with_progress(data, sink, is_less),
        Err(err) => {
            log::warn!("parallel sort unavailable ({err}); sorting sequentially");
            let total = sort_work(data.len() as u64);
            sink.init(total);
            data.sort_unstable_by(|a, b| cmp_from_less(&is_less, a, b));
            if total > 0 {
                sink.step(total);
            }
            sink.done();
        }
    }
}
