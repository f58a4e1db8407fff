//! Set-associative write-back cache keyed by block identifiers.
//!
//! This is the eviction engine that sits under block-device style
//! abstractions: a fixed array of `capacity` slots partitioned into
//! `capacity / associativity` sets, where a key may only occupy a slot inside
//! the set selected by `key % sets`. LRU order within a set is represented by
//! physical slot order — slot 0 holds the most recent insertion, the last
//! slot the oldest — so a hit or an insertion is a short shift over a handful
//! of adjacent slots, which for the typical associativities (2–8) stays inside
//! one or two hardware cache lines.
//!
//! Values leaving the cache (eviction, [`erase`](SetAssocCache::erase),
//! [`flush`](SetAssocCache::flush), drop) are handed to the caller-supplied
//! [`Writeout`] implementation exactly once. A successful
//! [`read`](SetAssocCache::read) instead *removes* the entry and transfers
//! ownership to the caller without involving the writer: the caller is
//! expected to mutate the value and [`write`](SetAssocCache::write) it back.
//!
//! # Key 0 is reserved
//!
//! An empty slot is encoded as `key == 0`, which keeps the slot array a flat
//! `(key, value)` vector with no side table. Consequently **0 is never a
//! legitimate key**; `read`, `write` and `erase` assert this at entry.

use crate::traits::Writeout;

#[cfg(feature = "metrics")]
use crate::metrics::{CacheMetrics, CacheMetricsSnapshot};

/// One cache slot. `key == 0` marks the slot empty and implies
/// `value.is_none()`.
#[derive(Debug)]
struct Slot<V> {
    key: u64,
    value: Option<V>,
}

impl<V> Slot<V> {
    #[inline]
    fn empty() -> Self {
        Slot { key: 0, value: None }
    }
}

/// A set-associative cache with LRU replacement and write-back eviction.
///
/// # Geometry
///
/// `new(capacity, associativity, writer)` clamps mismatched numbers instead
/// of failing: an associativity above the capacity is reduced to the
/// capacity, and a capacity that is not a multiple of the associativity is
/// rounded down. Both adjustments emit a `log::warn!`. An associativity of 0
/// selects a fully associative cache (one set spanning every slot), and a
/// capacity of 0 turns the cache into a pass-through: every `write` goes
/// straight to the writer and every lookup misses.
///
/// # Example
///
/// ```
/// use emkit::cache::SetAssocCache;
///
/// let mut cache: SetAssocCache<&str, _> = SetAssocCache::new(4, 2, |_v| {});
///
/// cache.write(2, "a");
/// assert_eq!(cache.read(2), Some("a"));
/// // read removed the entry; the caller owns "a" until written back
/// assert_eq!(cache.read(2), None);
/// ```
pub struct SetAssocCache<V, W: Writeout<V>> {
    slots: Vec<Slot<V>>,
    /// Number of sets; `capacity / assoc`, 0 when capacity is 0.
    sets: usize,
    /// Slots per set.
    assoc: usize,
    capacity: usize,
    len: usize,
    writer: W,
    #[cfg(feature = "metrics")]
    metrics: CacheMetrics,
}

impl<V, W: Writeout<V>> SetAssocCache<V, W> {
    /// Creates a cache with `capacity` slots split into sets of
    /// `associativity` slots each.
    ///
    /// `associativity == 0` means fully associative. Mismatched numbers are
    /// clamped (see the type-level docs) rather than rejected.
    pub fn new(capacity: usize, associativity: usize, writer: W) -> Self {
        let mut capacity = capacity;
        let mut assoc = if associativity == 0 { capacity } else { associativity };
        let sets = if capacity == 0 {
            0
        } else {
            if assoc > capacity {
                log::warn!(
                    "cache associativity {} exceeds capacity {}; reducing to capacity",
                    assoc,
                    capacity
                );
                assoc = capacity;
            }
            if capacity % assoc != 0 {
                let rounded = (capacity / assoc) * assoc;
                log::warn!(
                    "cache capacity {} is not a multiple of associativity {}; rounding down to {}",
                    capacity,
                    assoc,
                    rounded
                );
                capacity = rounded;
            }
            capacity / assoc
        };

        let slots = (0..capacity).map(|_| Slot::empty()).collect();

        Self {
            slots,
            sets,
            assoc,
            capacity,
            len: 0,
            writer,
            #[cfg(feature = "metrics")]
            metrics: CacheMetrics::default(),
        }
    }

    /// Returns the effective slot capacity (after any construction clamping).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the effective associativity.
    #[inline]
    pub fn associativity(&self) -> usize {
        self.assoc
    }

    /// Returns the number of sets.
    #[inline]
    pub fn sets(&self) -> usize {
        self.sets
    }

    /// Returns the number of resident entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no entries are resident.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Index of the first slot of the set that `key` maps to.
    #[inline]
    fn set_start(&self, key: u64) -> usize {
        (key % self.sets as u64) as usize * self.assoc
    }

    /// Looks up `key` and, on a hit, removes the entry and returns its value.
    ///
    /// Ownership of the value transfers to the caller; the writer is **not**
    /// invoked. The remaining entries in the set shift forward so that the
    /// occupied slots stay a recency-ordered prefix.
    ///
    /// # Panics
    ///
    /// Panics if `key == 0` (reserved for empty slots).
    pub fn read(&mut self, key: u64) -> Option<V> {
        assert!(key != 0, "cache key 0 is reserved for empty slots");
        if self.capacity == 0 {
            #[cfg(feature = "metrics")]
            self.metrics.record_read_miss();
            return None;
        }

        let start = self.set_start(key);
        let set = &mut self.slots[start..start + self.assoc];
        let idx = match set.iter().position(|s| s.key == key) {
            Some(idx) => idx,
            None => {
                #[cfg(feature = "metrics")]
                self.metrics.record_read_miss();
                return None;
            }
        };

        let slot = &mut set[idx];
        slot.key = 0;
        let value = slot.value.take();
        debug_assert!(value.is_some(), "occupied slot held no value");

        // Close the gap; the emptied slot ends up at the tail.
        set[idx..].rotate_left(1);
        self.len -= 1;

        #[cfg(feature = "metrics")]
        self.metrics.record_read_hit();
        value
    }

    /// Inserts `(key, value)` at the most-recent slot of the key's set,
    /// writing out the set's least recent entry first if the set is full.
    ///
    /// `write` does not probe for an existing entry under `key`: writing a
    /// key that is already resident stacks a second entry in front of the
    /// stale one, which then ages out of the tail like any other entry.
    /// Callers that need load-or-create semantics should `read` (which
    /// removes) before they `write`.
    ///
    /// # Panics
    ///
    /// Panics if `key == 0` (reserved for empty slots).
    pub fn write(&mut self, key: u64, value: V) {
        assert!(key != 0, "cache key 0 is reserved for empty slots");
        #[cfg(feature = "metrics")]
        self.metrics.record_write();

        if self.capacity == 0 {
            #[cfg(feature = "metrics")]
            self.metrics.record_passthrough_write();
            self.writer.write_out(value);
            return;
        }

        let start = self.set_start(key);
        let tail = start + self.assoc - 1;

        let evicted = {
            let slot = &mut self.slots[tail];
            if slot.key != 0 {
                slot.key = 0;
                slot.value.take()
            } else {
                None
            }
        };
        if let Some(v) = evicted {
            self.len -= 1;
            #[cfg(feature = "metrics")]
            self.metrics.record_eviction();
            self.writer.write_out(v);
        }

        let set = &mut self.slots[start..start + self.assoc];
        // The tail slot is empty now; bring it to the front and fill it.
        if self.assoc > 1 {
            set.rotate_right(1);
        }
        set[0] = Slot {
            key,
            value: Some(value),
        };
        self.len += 1;
    }

    /// Removes `key` from the cache, writing its value out first.
    ///
    /// Returns `true` if the key was resident.
    ///
    /// # Panics
    ///
    /// Panics if `key == 0` (reserved for empty slots).
    pub fn erase(&mut self, key: u64) -> bool {
        assert!(key != 0, "cache key 0 is reserved for empty slots");
        if self.capacity == 0 {
            #[cfg(feature = "metrics")]
            self.metrics.record_erase(false);
            return false;
        }

        let start = self.set_start(key);
        let idx = self.slots[start..start + self.assoc]
            .iter()
            .position(|s| s.key == key);
        let idx = match idx {
            Some(idx) => idx,
            None => {
                #[cfg(feature = "metrics")]
                self.metrics.record_erase(false);
                return false;
            }
        };

        let value = {
            let slot = &mut self.slots[start + idx];
            slot.key = 0;
            slot.value.take()
        };
        if let Some(v) = value {
            self.writer.write_out(v);
        }

        self.slots[start + idx..start + self.assoc].rotate_left(1);
        self.len -= 1;

        #[cfg(feature = "metrics")]
        self.metrics.record_erase(true);
        true
    }

    /// Writes out every resident value and marks every slot empty.
    pub fn flush(&mut self) {
        let mut flushed: u64 = 0;
        for i in 0..self.slots.len() {
            if self.slots[i].key != 0 {
                self.slots[i].key = 0;
                if let Some(v) = self.slots[i].value.take() {
                    self.writer.write_out(v);
                    flushed += 1;
                }
            }
        }
        self.len = 0;
        #[cfg(feature = "metrics")]
        self.metrics.record_flush(flushed);
        #[cfg(not(feature = "metrics"))]
        let _ = flushed;
    }

    /// Copies the current counter values (feature `metrics`).
    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> CacheMetricsSnapshot {
        CacheMetricsSnapshot {
            read_calls: self.metrics.read_calls,
            read_hits: self.metrics.read_hits,
            read_misses: self.metrics.read_misses,
            write_calls: self.metrics.write_calls,
            evicted_entries: self.metrics.evicted_entries,
            passthrough_writes: self.metrics.passthrough_writes,
            erase_calls: self.metrics.erase_calls,
            erase_hits: self.metrics.erase_hits,
            flush_calls: self.metrics.flush_calls,
            flushed_entries: self.metrics.flushed_entries,
            cache_len: self.len,
            capacity: self.capacity,
        }
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        if self.capacity == 0 {
            assert_eq!(self.len, 0);
            assert!(self.slots.is_empty());
            return;
        }
        let mut occupied = 0;
        for set in self.slots.chunks(self.assoc) {
            let mut saw_empty = false;
            for slot in set {
                if slot.key == 0 {
                    saw_empty = true;
                    assert!(slot.value.is_none(), "empty slot holds a value");
                } else {
                    assert!(!saw_empty, "occupied slot after an empty slot in the same set");
                    assert!(slot.value.is_some(), "occupied slot holds no value");
                    occupied += 1;
                }
            }
        }
        assert_eq!(self.len, occupied);
    }
}

impl<V, W: Writeout<V>> Drop for SetAssocCache<V, W> {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Writer that appends written-out values to a shared log.
    fn logging_writer<V>() -> (Rc<RefCell<Vec<V>>>, impl FnMut(V)) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        (log, move |v: V| sink.borrow_mut().push(v))
    }

    #[test]
    fn write_then_read_round_trip() {
        let (log, writer) = logging_writer();
        let mut cache = SetAssocCache::new(4, 2, writer);

        cache.write(2, "a");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.read(2), Some("a"));
        assert_eq!(cache.len(), 0);
        // read transfers ownership; nothing reaches the writer
        assert!(log.borrow().is_empty());
        // the entry is gone
        assert_eq!(cache.read(2), None);
    }

    #[test]
    fn full_set_evicts_lru_through_writer() {
        let (log, writer) = logging_writer();
        // capacity 4, associativity 2 -> 2 sets; even keys land in set 0
        let mut cache = SetAssocCache::new(4, 2, writer);

        cache.write(2, "a");
        cache.write(4, "b");
        assert!(log.borrow().is_empty());

        // set 0 is full; writing key 6 must write out "a" (the LRU)
        cache.write(6, "c");
        assert_eq!(*log.borrow(), vec!["a"]);
        assert_eq!(cache.len(), 2);

        // most recent first: 6, then 4
        assert_eq!(cache.read(4), Some("b"));
        assert_eq!(cache.read(6), Some("c"));
        cache.debug_validate_invariants();
    }

    #[test]
    fn sets_are_independent() {
        let (log, writer) = logging_writer();
        let mut cache = SetAssocCache::new(4, 2, writer);

        // two entries per set, no evictions
        cache.write(2, 'a');
        cache.write(4, 'b');
        cache.write(1, 'c');
        cache.write(3, 'd');
        assert_eq!(cache.len(), 4);
        assert!(log.borrow().is_empty());
        cache.debug_validate_invariants();

        // filling set 0 further does not disturb set 1
        cache.write(6, 'e');
        assert_eq!(*log.borrow(), vec!['a']);
        assert_eq!(cache.read(1), Some('c'));
        assert_eq!(cache.read(3), Some('d'));
    }

    #[test]
    fn read_hit_shifts_survivors_forward() {
        let (_log, writer) = logging_writer();
        let mut cache = SetAssocCache::new(4, 4, writer);

        cache.write(1, "a");
        cache.write(2, "b");
        cache.write(3, "c");
        // order: 3 (MRU), 2, 1 (LRU)
        assert_eq!(cache.read(2), Some("b"));
        cache.debug_validate_invariants();
        assert_eq!(cache.len(), 2);
        // remaining entries must still be readable
        assert_eq!(cache.read(3), Some("c"));
        assert_eq!(cache.read(1), Some("a"));
    }

    #[test]
    fn erase_writes_out_and_reports_presence() {
        let (log, writer) = logging_writer();
        let mut cache = SetAssocCache::new(4, 2, writer);

        cache.write(2, "a");
        cache.write(4, "b");

        assert!(cache.erase(2));
        assert_eq!(*log.borrow(), vec!["a"]);
        assert!(!cache.erase(2));
        assert_eq!(cache.len(), 1);
        cache.debug_validate_invariants();
    }

    #[test]
    fn flush_writes_every_resident_entry_once() {
        let (log, writer) = logging_writer();
        let mut cache = SetAssocCache::new(4, 2, writer);

        cache.write(2, 'a');
        cache.write(1, 'b');
        cache.write(3, 'c');

        cache.flush();
        let mut flushed = log.borrow().clone();
        flushed.sort();
        assert_eq!(flushed, vec!['a', 'b', 'c']);
        assert!(cache.is_empty());
        cache.debug_validate_invariants();

        // a second flush finds nothing
        cache.flush();
        assert_eq!(log.borrow().len(), 3);
    }

    #[test]
    fn drop_flushes_residents() {
        let (log, writer) = logging_writer();
        {
            let mut cache = SetAssocCache::new(4, 2, writer);
            cache.write(2, "a");
            cache.write(1, "b");
        }
        let mut written = log.borrow().clone();
        written.sort();
        assert_eq!(written, vec!["a", "b"]);
    }

    #[test]
    fn drop_after_flush_writes_nothing_more() {
        let (log, writer) = logging_writer();
        {
            let mut cache = SetAssocCache::new(4, 2, writer);
            cache.write(2, "a");
            cache.flush();
            assert_eq!(log.borrow().len(), 1);
        }
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn zero_capacity_is_pass_through() {
        let (log, writer) = logging_writer();
        let mut cache = SetAssocCache::new(0, 2, writer);

        cache.write(1, "a");
        cache.write(2, "b");
        assert_eq!(*log.borrow(), vec!["a", "b"]);
        assert_eq!(cache.read(1), None);
        assert!(!cache.erase(2));
        assert!(cache.is_empty());
    }

    #[test]
    fn associativity_zero_means_fully_associative() {
        let (log, writer) = logging_writer();
        let mut cache = SetAssocCache::new(3, 0, writer);
        assert_eq!(cache.associativity(), 3);
        assert_eq!(cache.sets(), 1);

        cache.write(10, 'a');
        cache.write(20, 'b');
        cache.write(30, 'c');
        assert!(log.borrow().is_empty());
        cache.write(40, 'd');
        // "a" was least recent
        assert_eq!(*log.borrow(), vec!['a']);
    }

    #[test]
    fn oversized_associativity_clamps_to_capacity() {
        let (_log, writer) = logging_writer::<u32>();
        let cache = SetAssocCache::new(4, 16, writer);
        assert_eq!(cache.associativity(), 4);
        assert_eq!(cache.capacity(), 4);
        assert_eq!(cache.sets(), 1);
    }

    #[test]
    fn capacity_rounds_down_to_associativity_multiple() {
        let (_log, writer) = logging_writer::<u32>();
        let cache = SetAssocCache::new(7, 2, writer);
        assert_eq!(cache.capacity(), 6);
        assert_eq!(cache.sets(), 3);
    }

    #[test]
    fn direct_mapped_set_overwrites_in_place() {
        let (log, writer) = logging_writer();
        // associativity 1: every set is a single slot
        let mut cache = SetAssocCache::new(2, 1, writer);

        cache.write(2, "a");
        cache.write(4, "b"); // same set as 2
        assert_eq!(*log.borrow(), vec!["a"]);
        assert_eq!(cache.read(4), Some("b"));
        assert_eq!(cache.read(2), None);
    }

    #[test]
    fn duplicate_write_stacks_a_second_entry() {
        let (log, writer) = logging_writer();
        let mut cache = SetAssocCache::new(4, 4, writer);

        cache.write(1, "old");
        cache.write(1, "new");
        assert_eq!(cache.len(), 2);

        // the most recent entry wins the scan; the stale one remains behind it
        assert_eq!(cache.read(1), Some("new"));
        assert_eq!(cache.read(1), Some("old"));
        assert!(log.borrow().is_empty());
    }

    #[test]
    #[should_panic(expected = "reserved")]
    fn key_zero_is_rejected() {
        let (_log, writer) = logging_writer::<u32>();
        let mut cache = SetAssocCache::new(4, 2, writer);
        cache.write(0, 1);
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn metrics_track_the_writer_history() {
        let (log, writer) = logging_writer();
        let mut cache = SetAssocCache::new(4, 2, writer);

        cache.write(2, 'a');
        cache.write(4, 'b');
        cache.write(6, 'c'); // evicts 'a'
        assert_eq!(cache.read(4), Some('b'));
        assert_eq!(cache.read(8), None);
        cache.erase(6);
        cache.flush();

        let snap = cache.metrics_snapshot();
        assert_eq!(snap.write_calls, 3);
        assert_eq!(snap.evicted_entries, 1);
        assert_eq!(snap.read_calls, 2);
        assert_eq!(snap.read_hits, 1);
        assert_eq!(snap.read_misses, 1);
        assert_eq!(snap.erase_calls, 1);
        assert_eq!(snap.erase_hits, 1);
        assert_eq!(snap.flush_calls, 1);
        assert_eq!(snap.flushed_entries, 0); // nothing left after read+erase
        assert_eq!(snap.cache_len, 0);

        // evicted 'a' + erased 'c'
        assert_eq!(*log.borrow(), vec!['a', 'c']);
    }
}
