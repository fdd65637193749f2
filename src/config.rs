//! Server sizing and operational configuration.
//!
//! Hardcoded sizing values live here; wire-protocol constants (frame length,
//! terminate literal) live in `constants`.

use std::path::PathBuf;

use crate::constants::LINE_LEN;
use crate::wait::WaitPolicy;

/// Number of threads that concurrently handle client connections. Clients
/// beyond this count wait in the listen backlog unread.
pub const WORKER_COUNT: usize = 5;

/// Journal ring capacity (disruptor slots), each holding one nine-digit
/// message.
pub const RING_CAPACITY: usize = 1024 * 1024;

/// Per-connection receive buffer size (bytes).
pub const READ_BUF_SIZE: usize = 16 * 1024;

/// Journal file write buffer size (bytes).
pub const JOURNAL_BUF_SIZE: usize = 8 * 1024;

/// Name of the journal file inside `Config::journal_dir`.
pub const JOURNAL_FILE_NAME: &str = "numbers.log";

/// Kernel socket buffer hints applied to accepted connections.
pub const SOCKET_RECV_BUF: usize = 16 * 1024;
pub const SOCKET_SEND_BUF: usize = 16 * 1024;

/// Listen backlog. Must cover clients queued behind a saturated worker pool.
pub const LISTEN_BACKLOG: i32 = 1024;

pub const DEFAULT_PORT: u16 = 4000;

// Compile-time sanity checks
const _: () = assert!(
    RING_CAPACITY.is_power_of_two(),
    "ring capacity must be a power of two"
);
const _: () = assert!(
    READ_BUF_SIZE >= LINE_LEN,
    "receive buffer must hold at least one frame"
);
const _: () = assert!(
    JOURNAL_BUF_SIZE >= 8 * 1024,
    "journal buffer must be at least 8 KiB"
);

/// Runtime configuration consumed by `Server::start`.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP port to listen on. Port 0 binds an ephemeral port.
    pub port: u16,
    /// Directory holding the journal file.
    pub journal_dir: PathBuf,
    /// Idle policy for the journal consumer.
    pub wait: WaitPolicy,
    /// Serve connections inline on the acceptor thread instead of the
    /// worker pool.
    pub single_threaded: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            journal_dir: std::env::temp_dir(),
            wait: WaitPolicy::Block,
            single_threaded: false,
        }
    }
}
