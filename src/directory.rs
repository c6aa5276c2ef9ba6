//! Per-home-node directory state for the full-bit-vector coherence scheme.
//!
//! Grounded on `original_source/src/central_directory.c`: a fixed array of
//! `directory_entry_t` indexed by `directoryIndex(address)`, each entry
//! carrying a three-state enum, a presence bit-vector, and an owner. This
//! module fixes the source's ambiguous `directoryIndex` (`address %
//! NUM_LINES`, flagged `// IS THIS CORRECT` in the source) to the
//! block-granularity form the spec settles on.

use std::fmt;

/// Three-state directory entry status for the full-bit-vector scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirState {
    /// No cache holds a copy.
    #[default]
    Uncached,
    /// One or more caches hold a clean, shared copy.
    Shared,
    /// Exactly one cache holds the line, modified.
    ExclusiveModified,
}

impl fmt::Display for DirState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DirState::Uncached => "UNCACHED",
            DirState::Shared => "SHARED",
            DirState::ExclusiveModified => "EXCLUSIVE_MODIFIED",
        };
        write!(f, "{s}")
    }
}

/// No owning node; used when a line is UNCACHED or SHARED.
pub const NO_OWNER: Option<usize> = None;

/// Directory bookkeeping for one home line.
///
/// Invariants (enforced by every mutator in this module, never by a public
/// field setter):
/// - `state == Uncached` iff `sharers` is empty and `owner` is `None`.
/// - `state == Shared` implies `sharers` is non-empty and `owner` is `None`.
/// - `state == ExclusiveModified` implies `sharers == {owner}` for some
///   `owner != None`.
#[derive(Debug, Clone, Default)]
pub struct DirectoryEntry {
    /// Current directory state.
    pub state: DirState,
    /// Bit-vector of nodes holding a non-INVALID copy, represented as a
    /// sorted set of node ids (`NUM_PROCESSORS` is small, so a `Vec` is
    /// simpler than a real bitset and just as fast at this scale).
    pub sharers: Vec<usize>,
    /// The exclusive modifier, if `state == ExclusiveModified`.
    pub owner: Option<usize>,
}

impl DirectoryEntry {
    fn add_sharer(&mut self, node: usize) {
        if !self.sharers.contains(&node) {
            self.sharers.push(node);
        }
    }

    fn remove_sharer(&mut self, node: usize) {
        self.sharers.retain(|&s| s != node);
    }
}

/// A home node's directory: one [`DirectoryEntry`] per line it is
/// authoritative for.
#[derive(Debug)]
pub struct Directory {
    entries: Vec<DirectoryEntry>,
    num_lines: usize,
    b: u32,
}

impl Directory {
    /// Builds a directory with `num_lines` entries, all UNCACHED, for a
    /// cache geometry with `b` block-offset bits.
    #[must_use]
    pub fn new(num_lines: usize, b: u32) -> Self {
        Self {
            entries: vec![DirectoryEntry::default(); num_lines],
            num_lines,
            b,
        }
    }

    fn index(&self, address: u64) -> usize {
        ((address >> self.b) as usize) % self.num_lines
    }

    /// Returns a mutable reference to the entry for `address`, indexed by
    /// `(address >> B) mod NUM_LINES`.
    pub fn entry(&mut self, address: u64) -> &mut DirectoryEntry {
        let idx = self.index(address);
        &mut self.entries[idx]
    }

    /// Sets the entry's state; if transitioning to UNCACHED, also clears
    /// `sharers` and `owner`.
    pub fn set_state(&mut self, address: u64, new_state: DirState) {
        let e = self.entry(address);
        e.state = new_state;
        if new_state == DirState::Uncached {
            e.sharers.clear();
            e.owner = None;
        }
    }

    /// Records `node` as the exclusive modifier of `address`. Any other node
    /// previously in `sharers` is dropped and returned (as an `Invalidate`
    /// target list) so the caller can enqueue invalidations from `node` to
    /// each of them.
    #[must_use]
    pub fn record_modifier(&mut self, address: u64, node: usize) -> Vec<usize> {
        let e = self.entry(address);
        let to_invalidate: Vec<usize> = e.sharers.iter().copied().filter(|&s| s != node).collect();
        e.state = DirState::ExclusiveModified;
        e.owner = Some(node);
        e.sharers = vec![node];
        to_invalidate
    }

    /// Adds `node` to the sharer set without changing `state`/`owner`.
    pub fn add_sharer(&mut self, address: u64, node: usize) {
        self.entry(address).add_sharer(node);
    }

    /// Removes `node` from the sharer set without changing `state`/`owner`.
    pub fn remove_sharer(&mut self, address: u64, node: usize) {
        self.entry(address).remove_sharer(node);
    }

    /// Iterates over every non-UNCACHED `(line_index, entry)` pair, for the
    /// summary output.
    pub fn cached_entries(&self) -> impl Iterator<Item = (usize, &DirectoryEntry)> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.state != DirState::Uncached)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_is_uncached() {
        let mut d = Directory::new(256, 16);
        let e = d.entry(0);
        assert_eq!(e.state, DirState::Uncached);
        assert!(e.sharers.is_empty());
        assert_eq!(e.owner, None);
    }

    #[test]
    fn record_modifier_sets_exclusive_and_returns_old_sharers() {
        let mut d = Directory::new(256, 16);
        d.add_sharer(0, 1);
        d.add_sharer(0, 2);
        d.set_state(0, DirState::Shared);
        let victims = d.record_modifier(0, 3);
        assert_eq!(victims, vec![1, 2]);
        let e = d.entry(0);
        assert_eq!(e.state, DirState::ExclusiveModified);
        assert_eq!(e.owner, Some(3));
        assert_eq!(e.sharers, vec![3]);
    }

    #[test]
    fn set_state_uncached_clears_sharers_and_owner() {
        let mut d = Directory::new(256, 16);
        let _ = d.record_modifier(0, 1);
        d.set_state(0, DirState::Uncached);
        let e = d.entry(0);
        assert!(e.sharers.is_empty());
        assert_eq!(e.owner, None);
    }

    #[test]
    fn directory_index_is_block_granular_mod_num_lines() {
        let d = Directory::new(256, 16);
        // B = 16 -> line_bytes = 65536; two addresses in the same 64KiB
        // block map to the same directory index even if byte offsets differ.
        assert_eq!(d.index(0x1_0000), d.index(0x1_0000 + 4));
        // The next 64KiB block after 256 lines wraps back to index 0.
        let wrap_addr = 256u64 * 65536;
        assert_eq!(d.index(wrap_addr), 0);
    }
}
