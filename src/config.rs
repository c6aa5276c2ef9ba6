//! Cluster and cache geometry configuration.
//!
//! This module defines the constants that parameterize a simulation run. It
//! provides:
//! 1. **Defaults:** baseline cluster geometry mirroring the original source's
//!    hard-coded constants.
//! 2. **`RunConfig`:** the resolved geometry for a run, loadable from an
//!    optional TOML file and overridable field-by-field from the CLI.

use serde::Deserialize;
use std::path::Path;

use crate::error::Error;

/// Default geometry constants, mirroring the source's `#define`s.
mod defaults {
    /// Number of processor nodes in the cluster.
    pub const NUM_PROCESSORS: usize = 4;
    /// Number of directory entries per home node.
    pub const NUM_LINES: usize = 256;
    /// Set-index bits (`2^S` sets per cache).
    pub const S: u32 = 1;
    /// Associativity (lines per set).
    pub const E: usize = 16;
    /// Block-offset bits (`2^B` bytes per line).
    pub const B: u32 = 16;

    pub const fn num_processors() -> usize {
        NUM_PROCESSORS
    }
    pub const fn num_lines() -> usize {
        NUM_LINES
    }
    pub const fn s() -> u32 {
        S
    }
    pub const fn e() -> usize {
        E
    }
    pub const fn b() -> u32 {
        B
    }
}

/// Resolved cluster and cache geometry for one simulation run.
///
/// Every field defaults to the value the original source hard-codes; a
/// `--config` TOML file may override a subset of fields, and explicit CLI
/// flags take precedence over both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Number of processor nodes (`NUM_PROCESSORS`).
    #[serde(default = "defaults::num_processors")]
    pub num_processors: usize,
    /// Directory entries per home node (`NUM_LINES`).
    #[serde(default = "defaults::num_lines")]
    pub num_lines: usize,
    /// Set-index bits (`S`); the cache has `2^S` sets.
    #[serde(default = "defaults::s")]
    pub s: u32,
    /// Associativity (`E`); lines per set.
    #[serde(default = "defaults::e")]
    pub e: usize,
    /// Block-offset bits (`B`); `2^B` bytes per cache line.
    #[serde(default = "defaults::b")]
    pub b: u32,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            num_processors: defaults::num_processors(),
            num_lines: defaults::num_lines(),
            s: defaults::s(),
            e: defaults::e(),
            b: defaults::b(),
        }
    }
}

impl RunConfig {
    /// Loads a `RunConfig` from a TOML file, falling back to defaults for any
    /// field the file omits.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigRead`] if the file cannot be read, or
    /// [`Error::ConfigParse`] if its contents are not valid TOML for this
    /// structure.
    pub fn from_file(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Number of sets in each node's cache (`2^S`).
    #[must_use]
    pub fn num_sets(&self) -> usize {
        1usize << self.s
    }

    /// Number of bytes covered by one cache line (`2^B`).
    #[must_use]
    pub fn line_bytes(&self) -> u64 {
        1u64 << self.b
    }

    /// Number of address-space bytes homed at a single node
    /// (`NUM_LINES * 2^B`), used to compute the home node for an address.
    #[must_use]
    pub fn bytes_per_home(&self) -> u64 {
        self.num_lines as u64 * self.line_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_source_constants() {
        let cfg = RunConfig::default();
        assert_eq!(cfg.num_processors, 4);
        assert_eq!(cfg.num_lines, 256);
        assert_eq!(cfg.s, 1);
        assert_eq!(cfg.e, 16);
        assert_eq!(cfg.b, 16);
        assert_eq!(cfg.num_sets(), 2);
        assert_eq!(cfg.line_bytes(), 65536);
    }

    #[test]
    fn partial_toml_fills_remaining_defaults() {
        let cfg: RunConfig = toml::from_str("num_processors = 8\n").unwrap();
        assert_eq!(cfg.num_processors, 8);
        assert_eq!(cfg.num_lines, 256);
        assert_eq!(cfg.e, 16);
    }

    #[test]
    fn from_file_missing_path_is_config_read_error() {
        let err = RunConfig::from_file(Path::new("/nonexistent/dircoh.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }
}
