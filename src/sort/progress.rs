//! Shared progress state between sort jobs and the calling thread.
//!
//! Every partition pass adds its cost to one mutex-guarded counter and pokes
//! the condvar; the calling thread sits in [`SortProgress::wait_with`]
//! turning counter advances into sink deltas. The root job's completion hook
//! snaps the counter to the announced total, which is the caller's signal
//! that the estimate is final.

use parking_lot::{Condvar, Mutex};

pub(crate) struct SortProgress {
    /// Monotone work counter, finalized to exactly `total` by the root job.
    counter: Mutex<u64>,
    cond: Condvar,
    total: u64,
}

impl SortProgress {
    pub(crate) fn new(total: u64) -> Self {
        Self {
            counter: Mutex::new(0),
            cond: Condvar::new(),
            total,
        }
    }

    #[inline]
    pub(crate) fn total(&self) -> u64 {
        self.total
    }

    /// Adds partition work to the counter and wakes the caller.
    pub(crate) fn add(&self, amount: u64) {
        let mut counter = self.counter.lock();
        *counter += amount;
        self.cond.notify_one();
    }

    /// Snaps the counter to the total and wakes the caller. Called by the
    /// root job once the whole tree has finished.
    pub(crate) fn finish(&self) {
        let mut counter = self.counter.lock();
        *counter = self.total;
        self.cond.notify_one();
    }

    /// Blocks until the counter reaches the total, forwarding each advance
    /// to `emit` as a delta.
    ///
    /// Deltas are clamped against the total, and any shortfall is emitted
    /// after the counter settles, so the deltas always sum to exactly
    /// `total()` regardless of how the per-partition estimates land.
    pub(crate) fn wait_with<F: FnMut(u64)>(&self, mut emit: F) {
        let mut prev: u64 = 0;
        let mut counter = self.counter.lock();
        while *counter < self.total {
            let cur = (*counter).min(self.total);
            if cur > prev {
                emit(cur - prev);
                prev = cur;
            }
            self.cond.wait(&mut counter);
        }
        drop(counter);
        if self.total > prev {
            emit(self.total - prev);
        }
    }
}
