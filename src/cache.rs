//! Per-node set-associative cache with MESI line states and LRU replacement.
//!
//! Grounded on the teacher's `CacheSim` (`src/cpu/cache.rs` in the retrieved
//! pack): a flat array of lines indexed by `(set, way)`, an access counter
//! used as the LRU stamp, and "prefer an invalid slot, else evict the
//! smallest stamp" replacement. This module generalizes that single
//! read/write `access` entry point into the five named operations the
//! directory protocol drives independently (`lookup`, `install`, `touch`,
//! `set_state`, `invalidate`), since unlike a private L1 the protocol needs
//! to reach into a line's state from outside a plain hit/miss access.

use std::fmt;

/// MESI line states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MesiState {
    /// No valid copy of this line.
    #[default]
    Invalid,
    /// Clean copy, possibly shared with other caches.
    Shared,
    /// Clean copy, guaranteed to be the only cached copy.
    Exclusive,
    /// Dirty copy, guaranteed to be the only cached copy.
    Modified,
}

impl fmt::Display for MesiState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MesiState::Invalid => "INVALID",
            MesiState::Shared => "SHARED",
            MesiState::Exclusive => "EXCLUSIVE",
            MesiState::Modified => "MODIFIED",
        };
        write!(f, "{s}")
    }
}

/// One cache line: tag, validity, MESI state, dirty bit, and LRU stamp.
///
/// Invariant: `state == MesiState::Invalid` iff `!valid`. `dirty` implies
/// `state == MesiState::Modified`. Both are maintained by every method below
/// that mutates a line; there is no public setter that could violate them.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheLine {
    /// Address bits above the set index and block offset.
    pub tag: u64,
    /// Whether this slot holds live data.
    pub valid: bool,
    /// Set iff this line was written while MODIFIED.
    pub dirty: bool,
    /// Current MESI state.
    pub state: MesiState,
    /// Monotonic stamp from the interconnect's step counter, used for LRU.
    pub last_used: u64,
}

/// A fixed-associativity group of lines sharing one set index.
///
/// Invariant: at most one line has `(valid == true, tag == T)` for any `T`.
#[derive(Debug, Clone)]
struct CacheSet {
    lines: Vec<CacheLine>,
}

impl CacheSet {
    fn new(ways: usize) -> Self {
        Self {
            lines: vec![CacheLine::default(); ways],
        }
    }

    /// Index of an invalid line, if any, else the line with the smallest
    /// `last_used` stamp (the LRU victim).
    fn victim_index(&self) -> usize {
        if let Some(i) = self.lines.iter().position(|l| !l.valid) {
            return i;
        }
        self.lines
            .iter()
            .enumerate()
            .min_by_key(|(_, l)| l.last_used)
            .map_or(0, |(i, _)| i)
    }

    /// A line only counts as present for hit detection while its state is
    /// non-INVALID. `invalidate` deliberately leaves `valid` set (see
    /// `DESIGN.md`), so `valid` alone would make an invalidated line look
    /// like a live hit again.
    fn find(&self, tag: u64) -> Option<usize> {
        self.lines
            .iter()
            .position(|l| l.valid && l.state != MesiState::Invalid && l.tag == tag)
    }
}

/// A per-node set-associative cache plus its hit/miss/eviction counters.
///
/// Belongs to exactly one node, identified by `processor_id`. Reached only
/// through the interconnect — it never holds a reference back to it.
#[derive(Debug)]
pub struct Cache {
    /// The node this cache belongs to.
    pub processor_id: usize,
    sets: Vec<CacheSet>,
    s: u32,
    b: u32,

    /// Number of accesses served by an already-valid, matching-tag line.
    pub hits: u64,
    /// Number of accesses that required an `install`.
    pub misses: u64,
    /// Number of times `install` evicted a previously valid line.
    pub evictions: u64,
    /// Number of evictions where the victim was dirty.
    pub dirty_evictions: u64,
}

impl Cache {
    /// Builds a cache with `2^s` sets of `e` lines each, `b` block-offset
    /// bits, belonging to node `processor_id`.
    #[must_use]
    pub fn new(processor_id: usize, s: u32, e: usize, b: u32) -> Self {
        let num_sets = 1usize << s;
        Self {
            processor_id,
            sets: (0..num_sets).map(|_| CacheSet::new(e)).collect(),
            s,
            b,
            hits: 0,
            misses: 0,
            evictions: 0,
            dirty_evictions: 0,
        }
    }

    fn set_index(&self, address: u64) -> usize {
        let num_sets = 1u64 << self.s;
        ((address >> self.b) % num_sets) as usize
    }

    fn tag(&self, address: u64) -> u64 {
        address >> (self.s + self.b)
    }

    /// Returns the valid line matching `address`'s tag in its mapped set, if
    /// any.
    #[must_use]
    pub fn lookup(&self, address: u64) -> Option<&CacheLine> {
        let set = &self.sets[self.set_index(address)];
        set.find(self.tag(address)).map(|i| &set.lines[i])
    }

    fn lookup_mut(&mut self, address: u64) -> Option<&mut CacheLine> {
        let set_index = self.set_index(address);
        let tag = self.tag(address);
        let set = &mut self.sets[set_index];
        set.find(tag).map(move |i| &mut set.lines[i])
    }

    /// Marks the line for `address`, if present, as most-recently-used.
    /// Returns whether a line was found.
    pub fn touch(&mut self, address: u64, timer: u64) -> bool {
        if let Some(line) = self.lookup_mut(address) {
            line.last_used = timer;
            true
        } else {
            false
        }
    }

    /// Installs a fresh line for `address` in state `new_state`, evicting the
    /// LRU (preferring an invalid slot) victim if the set is full.
    ///
    /// Updates `evictions`/`dirty_evictions` for the victim. Does **not**
    /// touch the interconnect's `mem_reads` counter — the caller bumps that,
    /// since the cache has no reference to the interconnect.
    pub fn install(&mut self, address: u64, new_state: MesiState, timer: u64) {
        let set_index = self.set_index(address);
        let tag = self.tag(address);
        let set = &mut self.sets[set_index];
        let victim = set.victim_index();
        let old = set.lines[victim];
        if old.valid {
            self.evictions += 1;
            if old.dirty {
                self.dirty_evictions += 1;
            }
        }
        set.lines[victim] = CacheLine {
            tag,
            valid: true,
            dirty: new_state == MesiState::Modified,
            state: new_state,
            last_used: timer,
        };
    }

    /// Sets the state of the line for `address`, if present; additionally
    /// marks it dirty when transitioning to MODIFIED. Returns whether found.
    pub fn set_state(&mut self, address: u64, new_state: MesiState) -> bool {
        if let Some(line) = self.lookup_mut(address) {
            line.state = new_state;
            if new_state == MesiState::Modified {
                line.dirty = true;
            }
            true
        } else {
            false
        }
    }

    /// Invalidates the line for `address`, if present.
    ///
    /// Matches the source's `invalidateCacheLine`: only `state` flips to
    /// `Invalid`; `valid` is left untouched (see `DESIGN.md`).
    pub fn invalidate(&mut self, address: u64) {
        if let Some(line) = self.lookup_mut(address) {
            line.state = MesiState::Invalid;
        }
    }

    /// Serves a local read at `address`: on hit, touches the line and counts
    /// a hit; on miss, counts a miss and leaves installation to the caller
    /// (which also owns the `mem_reads` traffic counter). Returns whether it
    /// was a hit.
    pub fn read_local_hit(&mut self, address: u64, timer: u64) -> bool {
        if self.touch(address, timer) {
            self.hits += 1;
            true
        } else {
            self.misses += 1;
            false
        }
    }

    /// Serves a local write at `address`: on hit, promotes the line to
    /// MODIFIED (dirty) and counts a hit; on miss, counts a miss. Returns
    /// whether it was a hit.
    pub fn write_local_hit(&mut self, address: u64, timer: u64) -> bool {
        if let Some(line) = self.lookup_mut(address) {
            line.state = MesiState::Modified;
            line.dirty = true;
            line.last_used = timer;
            self.hits += 1;
            true
        } else {
            self.misses += 1;
            false
        }
    }

    /// Iterates over every valid line, with its set index, for the state
    /// dump in the summary output.
    pub fn valid_lines(&self) -> impl Iterator<Item = (usize, &CacheLine)> {
        self.sets.iter().enumerate().flat_map(|(set_idx, set)| {
            set.lines
                .iter()
                .filter(|l| l.valid)
                .map(move |l| (set_idx, l))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_set_cache(ways: usize) -> Cache {
        // S=0 -> a single set; B=4 -> 16-byte lines, so consecutive
        // addresses 0, 16, 32, ... all map to set 0 with distinct tags.
        Cache::new(0, 0, ways, 4)
    }

    #[test]
    fn miss_then_hit_counts_exactly_one_each() {
        let mut c = one_set_cache(4);
        assert!(!c.read_local_hit(0, 1));
        c.install(0, MesiState::Exclusive, 1);
        assert_eq!(c.misses, 1);
        assert!(c.read_local_hit(0, 2));
        assert_eq!(c.hits, 1);
        assert_eq!(c.misses, 1);
    }

    #[test]
    fn install_prefers_invalid_slot_over_eviction() {
        let mut c = one_set_cache(2);
        c.install(0, MesiState::Shared, 1);
        assert_eq!(c.evictions, 0);
        c.install(16, MesiState::Shared, 2);
        assert_eq!(c.evictions, 0);
        assert!(c.lookup(0).is_some());
        assert!(c.lookup(16).is_some());
    }

    #[test]
    fn install_evicts_lru_when_set_is_full() {
        let mut c = one_set_cache(2);
        c.install(0, MesiState::Shared, 1);
        c.install(16, MesiState::Shared, 2);
        // address 0 is least recently used; installing a third line evicts it.
        c.install(32, MesiState::Shared, 3);
        assert_eq!(c.evictions, 1);
        assert!(c.lookup(0).is_none());
        assert!(c.lookup(16).is_some());
        assert!(c.lookup(32).is_some());
    }

    #[test]
    fn dirty_eviction_is_counted_separately() {
        let mut c = one_set_cache(1);
        c.install(0, MesiState::Modified, 1);
        c.install(16, MesiState::Shared, 2);
        assert_eq!(c.evictions, 1);
        assert_eq!(c.dirty_evictions, 1);
    }

    #[test]
    fn invalidate_leaves_valid_bit_set_but_misses_on_lookup() {
        let mut c = one_set_cache(1);
        c.install(0, MesiState::Shared, 1);
        c.invalidate(0);
        assert!(c.lookup(0).is_none(), "state flipped to Invalid so lookup misses");
        let raw = c.sets[0].lines[0];
        assert!(raw.valid, "source's invalidateCacheLine never clears valid");
        assert_eq!(raw.state, MesiState::Invalid);
    }

    #[test]
    fn repeated_invalidate_is_idempotent_on_state() {
        let mut c = one_set_cache(1);
        c.install(0, MesiState::Shared, 1);
        c.invalidate(0);
        c.invalidate(0);
        assert!(c.lookup(0).is_none());
    }

    #[test]
    fn seventeen_distinct_installs_into_sixteen_way_set_evict_exactly_one() {
        let mut c = one_set_cache(16);
        for i in 0..17u64 {
            c.install(i * 16, MesiState::Exclusive, i + 1);
        }
        assert_eq!(c.evictions, 1);
        assert_eq!(c.valid_lines().count(), 16);
    }
}
