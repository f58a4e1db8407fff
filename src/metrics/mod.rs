//! Operation counters for the cache engine (feature `metrics`).
//!
//! Counters are plain `u64` fields bumped by `record_*` one-liners on the
//! cache's hot paths; [`CacheMetricsSnapshot`] is a `Copy` view produced on
//! demand with the length/capacity gauges captured at snapshot time.
//!
//! Counting is wired in behind `#[cfg(feature = "metrics")]` so the default
//! hot paths carry the cost only when the feature is enabled.

/// Mutable counter state owned by a cache instance.
#[derive(Debug, Default)]
pub struct CacheMetrics {
    pub(crate) read_calls: u64,
    pub(crate) read_hits: u64,
    pub(crate) read_misses: u64,

    pub(crate) write_calls: u64,
    pub(crate) evicted_entries: u64,
    pub(crate) passthrough_writes: u64,

    pub(crate) erase_calls: u64,
    pub(crate) erase_hits: u64,

    pub(crate) flush_calls: u64,
    pub(crate) flushed_entries: u64,
}

impl CacheMetrics {
    #[inline]
    pub(crate) fn record_read_hit(&mut self) {
        self.read_calls += 1;
        self.read_hits += 1;
    }

    #[inline]
    pub(crate) fn record_read_miss(&mut self) {
        self.read_calls += 1;
        self.read_misses += 1;
    }

    #[inline]
    pub(crate) fn record_write(&mut self) {
        self.write_calls += 1;
    }

    #[inline]
    pub(crate) fn record_eviction(&mut self) {
        self.evicted_entries += 1;
    }

    #[inline]
    pub(crate) fn record_passthrough_write(&mut self) {
        self.passthrough_writes += 1;
    }

    #[inline]
    pub(crate) fn record_erase(&mut self, hit: bool) {
        self.erase_calls += 1;
        if hit {
            self.erase_hits += 1;
        }
    }

    #[inline]
    pub(crate) fn record_flush(&mut self, entries: u64) {
        self.flush_calls += 1;
        self.flushed_entries += entries;
    }
}

/// Point-in-time copy of a cache's counters.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheMetricsSnapshot {
    pub read_calls: u64,
    pub read_hits: u64,
    pub read_misses: u64,

    pub write_calls: u64,
    pub evicted_entries: u64,
    /// Writes routed straight to the writer because capacity is zero.
    pub passthrough_writes: u64,

    pub erase_calls: u64,
    pub erase_hits: u64,

    pub flush_calls: u64,
    pub flushed_entries: u64,

    // gauges captured at snapshot time
    pub cache_len: usize,
    pub capacity: usize,
}
