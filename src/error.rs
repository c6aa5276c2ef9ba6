//! Error taxonomy for the CLI and trace/config ingestion paths.
//!
//! The coherence core (cache, directory, interconnect) has no fallible
//! operations of its own — every handler's preconditions are structurally
//! guaranteed by the two-queue discipline, so this module only covers the
//! boundary: opening the trace file, parsing an optional config override,
//! and CLI usage.

use std::path::PathBuf;

/// Errors surfaced to `main`, each mapped to process exit code 1.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The trace file could not be opened.
    #[error("failed to open trace file {path}: {source}")]
    TraceOpen {
        /// Path that was passed on the command line.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The `--config` file exists but is not valid TOML for `RunConfig`.
    #[error("failed to parse config file {path}: {source}")]
    ConfigParse {
        /// Path that was passed via `--config`.
        path: PathBuf,
        /// Underlying TOML deserialization failure.
        #[source]
        source: toml::de::Error,
    },

    /// The `--config` file could not be read from disk.
    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        /// Path that was passed via `--config`.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}
