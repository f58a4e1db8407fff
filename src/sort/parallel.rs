//! Quicksort internals: pivot selection, partitioning, and the job body.
//!
//! The scheme is the classic parallel quicksort recurrence: a job partitions
//! its range, hands the left half to a freshly spawned child, and keeps
//! iterating on the right half itself. Recursion depth in any one worker is
//! therefore logarithmic while the pool sees one job per cutoff-sized leaf.

use std::cmp::Ordering;
use std::slice;
use std::sync::Arc;

use crate::runtime::{JobBody, JobId, JobScheduler};

use super::progress::SortProgress;

/// Work-unit estimate for sorting `n` elements: `n · log2(n) · 1.8`, the
/// measured per-element constant of the sequential sort. Zero for `n < 2`.
pub(crate) fn sort_work(n: u64) -> u64 {
    if n < 2 {
        return 0;
    }
    let n = n as f64;
    (n * n.log2() * 1.8) as u64
}

/// Turns a strict-less predicate into a total `Ordering` for the sequential
/// leaf sort.
#[inline]
pub(crate) fn cmp_from_less<T, F>(is_less: &F, a: &T, b: &T) -> Ordering
where
    F: Fn(&T, &T) -> bool,
{
    if is_less(a, b) {
        Ordering::Less
    } else if is_less(b, a) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

/// Index of the median of `v[a]`, `v[b]`, `v[c]` in three comparisons.
fn median3<T, F>(v: &[T], a: usize, b: usize, c: usize, is_less: &F) -> usize
where
    F: Fn(&T, &T) -> bool,
{
    if is_less(&v[a], &v[b]) {
        if is_less(&v[b], &v[c]) {
            b
        } else if is_less(&v[a], &v[c]) {
            c
        } else {
            a
        }
    } else if is_less(&v[a], &v[c]) {
        a
    } else if is_less(&v[b], &v[c]) {
        c
    } else {
        b
    }
}

/// Deterministic pivot choice: nine positions sampled at 1/8 strides, three
/// median-of-three reductions, then the median of the three medians. The
/// even sampling keeps presorted and organ-pipe inputs from producing
/// degenerate splits, and determinism keeps runs reproducible.
fn pick_pivot<T, F>(v: &[T], is_less: &F) -> usize
where
    F: Fn(&T, &T) -> bool,
{
    debug_assert!(v.len() >= 2);
    let step = v.len() / 8;
    let a = median3(v, 0, step, step * 2, is_less);
    let b = median3(v, step * 3, step * 4, step * 5, is_less);
    let c = median3(v, step * 6, step * 7, v.len() - 1, is_less);
    median3(v, a, b, c, is_less)
}

/// Hoare crossing partition around the value at index 0.
///
/// Both pointers scan inclusively of equal elements; the pivot sitting at
/// index 0 guarantees the left scan a stopper, so the loop terminates for
/// any `v.len() >= 2`. Returns the pivot's final index.
fn partition_around_first<T, F>(v: &mut [T], is_less: &F) -> usize
where
    F: Fn(&T, &T) -> bool,
{
    let pivot = 0usize;
    let mut first = 0usize;
    let mut last = v.len();
    loop {
        loop {
            last -= 1;
            if !is_less(&v[pivot], &v[last]) {
                break;
            }
        }
        loop {
            if first == last {
                break;
            }
            first += 1;
            if !is_less(&v[first], &v[pivot]) {
                break;
            }
        }
        if first == last {
            break;
        }
        v.swap(first, last);
    }
    v.swap(last, pivot);
    last
}

/// Selects a pivot, moves it to the front, partitions, and returns the
/// pivot's final index. Requires `v.len() >= 2`.
pub(crate) fn partition<T, F>(v: &mut [T], is_less: &F) -> usize
where
    F: Fn(&T, &T) -> bool,
{
    let pivot = pick_pivot(v, is_less);
    v.swap(pivot, 0);
    partition_around_first(v, is_less)
}

/// Raw pointer and length of the full range being sorted.
///
/// Live jobs hold strictly disjoint index windows into this range (the
/// partition step is the only thing that splits a window, and a parent never
/// touches the half it handed to a child), and the sort call blocks until
/// the whole job tree has joined, keeping the referent alive and unaliased
/// by the caller for as long as any window exists.
struct RawRange<T> {
    ptr: *mut T,
    len: usize,
}

// SAFETY: RawRange is only a capability to *derive* disjoint windows; the
// disjointness and liveness argument above is what makes handing it across
// threads sound. T: Send because elements are mutated from worker threads.
unsafe impl<T: Send> Send for RawRange<T> {}
unsafe impl<T: Send> Sync for RawRange<T> {}

impl<T> RawRange<T> {
    /// Reborrows the window `[lo, hi)` as a mutable slice.
    ///
    /// # Safety
    ///
    /// `[lo, hi)` must be in bounds and not overlap any other live window.
    #[inline]
    unsafe fn window(&self, lo: usize, hi: usize) -> &mut [T] {
        debug_assert!(lo <= hi && hi <= self.len);
        slice::from_raw_parts_mut(self.ptr.add(lo), hi - lo)
    }
}

/// Immutable per-invocation state shared by every job of one sort call.
pub(crate) struct SortShared<T, F> {
    data: RawRange<T>,
    is_less: F,
    min_size: usize,
    progress: Arc<SortProgress>,
}

impl<T, F> SortShared<T, F>
where
    F: Fn(&T, &T) -> bool,
{
    pub(crate) fn new(
        data: &mut [T],
        is_less: F,
        min_size: usize,
        progress: Arc<SortProgress>,
    ) -> Self {
        debug_assert!(min_size >= 2);
        Self {
            data: RawRange {
                ptr: data.as_mut_ptr(),
                len: data.len(),
            },
            is_less,
            min_size,
            progress,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.data.len
    }
}

/// One quicksort job over the window `[lo, hi)`.
pub(crate) struct QsortJob<T, F> {
    shared: Arc<SortShared<T, F>>,
    lo: usize,
    hi: usize,
    root: bool,
}

impl<T, F> QsortJob<T, F>
where
    F: Fn(&T, &T) -> bool,
{
    /// The root job covering the whole range.
    pub(crate) fn root(shared: Arc<SortShared<T, F>>) -> Self {
        let hi = shared.len();
        Self {
            shared,
            lo: 0,
            hi,
            root: true,
        }
    }
}

impl<T, F> JobBody for QsortJob<T, F>
where
    T: Send + 'static,
    F: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    fn run(&mut self, sched: &JobScheduler, id: JobId) {
        while self.hi - self.lo >= self.shared.min_size {
            // SAFETY: [lo, hi) is this job's exclusive window; the child
            // spawned below receives [lo, p) and this job keeps [p+1, hi),
            // so no two live windows ever overlap.
            let v = unsafe { self.shared.data.window(self.lo, self.hi) };
            let p = self.lo + partition(v, &self.shared.is_less);
            self.shared.progress.add((self.hi - self.lo) as u64);
            sched.enqueue_child(
                id,
                Box::new(QsortJob {
                    shared: self.shared.clone(),
                    lo: self.lo,
                    hi: p,
                    root: false,
                }),
            );
            self.lo = p + 1;
        }

        // SAFETY: same exclusivity argument; the loop above has shrunk this
        // job's window to [lo, hi) below the cutoff.
        let v = unsafe { self.shared.data.window(self.lo, self.hi) };
        v.sort_unstable_by(|a, b| cmp_from_less(&self.shared.is_less, a, b));
        self.shared.progress.add(sort_work(v.len() as u64));
    }

    fn on_done(&mut self) {
        if self.root {
            self.shared.progress.finish();
        }
    }
}
