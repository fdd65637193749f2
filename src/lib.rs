//! Library crate for digitsd: fixed-width framing, the dedup filter, the
//! journal ring and its writer, statistics, connection handling, and the
//! server lifecycle.
//!
//! The binaries (`main.rs`, `bin/client.rs`) are thin wrappers. Everything
//! lives here so the integration tests can drive the ring→journal pipeline
//! without sockets, and the end-to-end tests can embed a full server on an
//! ephemeral port.

pub mod config;
pub mod connection;
pub mod constants;
pub mod error;
pub mod filter;
pub mod journal;
pub mod journal_writer;
pub mod protocol;
pub mod ring_types;
pub mod server;
pub mod shutdown;
pub mod stats;
pub mod wait;
