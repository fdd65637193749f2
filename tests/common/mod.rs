#![allow(dead_code)]

use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use digitsd::config::Config;
use digitsd::server::Server;
use digitsd::wait::WaitPolicy;

/// Serializes the full-server tests: each one allocates the 125 MB filter
/// and a full-size ring, and the scenarios are timing-sensitive.
pub static SERVER_LOCK: Mutex<()> = Mutex::new(());

/// Start a server on an ephemeral port with its journal in a fresh temp dir.
pub fn start_server(wait: WaitPolicy, single_threaded: bool) -> (Server, TempDir) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let config = Config {
        port: 0,
        journal_dir: dir.path().to_path_buf(),
        wait,
        single_threaded,
    };
    let server = Server::start(config).expect("failed to start server");
    (server, dir)
}

pub fn digit_line(value: u32) -> Vec<u8> {
    format!("{value:09}\n").into_bytes()
}

/// Poll `cond` every 10 ms until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}
