//! Directory-based cache coherence protocol simulator.
//!
//! This crate implements a MESI-style cache coherence protocol over a
//! full-bit-vector directory scheme, driven by a replayed memory-access
//! trace. It provides:
//! 1. **Core:** per-node set-associative [`cache`], per-node [`directory`],
//!    and the [`interconnect`] that couples them into a message-passing
//!    coherence protocol.
//! 2. **Messages:** the [`message`] alphabet and the FIFO [`queue`] the
//!    interconnect drains.
//! 3. **Ingestion:** [`trace`] parses a memory-access trace into records the
//!    [`driver`] replays against the interconnect.
//! 4. **Ambient stack:** [`config`] (cluster/cache geometry), [`error`]
//!    (CLI/trace/config error taxonomy), and [`summary`] (stdout reporting).

/// Per-node set-associative cache with MESI line states and LRU replacement.
pub mod cache;
/// Cluster and cache geometry configuration.
pub mod config;
/// Per-home-node directory state for the full-bit-vector coherence scheme.
pub mod directory;
/// Replays a trace against an interconnect and prints the summary.
pub mod driver;
/// Error taxonomy for the CLI and trace/config ingestion paths.
pub mod error;
/// The message-passing interconnect and its coherence dispatch logic.
pub mod interconnect;
/// Coherence messages exchanged over the interconnect.
pub mod message;
/// FIFO message queue.
pub mod queue;
/// Per-node and global summary reporting.
pub mod summary;
/// Trace file ingestion.
pub mod trace;

/// Resolved cluster/cache geometry for a run.
pub use crate::config::RunConfig;
/// The errors this crate's boundary (CLI, trace, config) can produce.
pub use crate::error::Error;
/// N cluster nodes, the two coherence queues, and global traffic counters.
pub use crate::interconnect::Interconnect;
