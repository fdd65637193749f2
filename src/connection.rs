//! Per-connection read loop and the registry of live sockets.

use std::io::Read;
use std::net::TcpStream;
use std::sync::{Mutex, MutexGuard, PoisonError};

use slab::Slab;
use socket2::SockRef;
use tracing::{debug, warn};

use crate::config::{READ_BUF_SIZE, SOCKET_RECV_BUF, SOCKET_SEND_BUF};
use crate::journal::Journal;
use crate::protocol::{Frame, FrameDecoder};
use crate::shutdown::Shutdown;

/// Why a connection handler returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disconnect {
    /// Peer closed, the socket failed, or the peer broke protocol. The
    /// connection is gone; the server keeps running.
    Closed,
    /// The peer sent the terminate line. The caller must trigger the global
    /// stop; the handler itself does not touch other connections.
    Terminate,
}

/// Live client sockets, keyed by slab entry. Shutdown walks this to unblock
/// reads parked in worker threads.
pub struct ConnRegistry {
    conns: Mutex<Slab<TcpStream>>,
}

impl ConnRegistry {
    pub fn new() -> Self {
        Self {
            conns: Mutex::new(Slab::new()),
        }
    }

    fn register(&self, stream: &TcpStream) -> Option<usize> {
        match stream.try_clone() {
            Ok(clone) => Some(self.lock().insert(clone)),
            Err(error) => {
                // the read loop still works; this socket just cannot be
                // force-closed at shutdown
                warn!(%error, "failed to clone socket for registry");
                None
            }
        }
    }

    fn deregister(&self, key: usize) {
        self.lock().try_remove(key);
    }

    /// Shut down every registered socket so blocked reads return.
    pub fn shutdown_all(&self) {
        for (_, conn) in self.lock().iter() {
            let _ = conn.shutdown(std::net::Shutdown::Both);
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slab<TcpStream>> {
        self.conns.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ConnRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Removes the registry entry on every handler exit path.
struct RegistryGuard<'a> {
    registry: &'a ConnRegistry,
    key: Option<usize>,
}

impl Drop for RegistryGuard<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key {
            self.registry.deregister(key);
        }
    }
}

/// Socket tuning for accepted clients: NODELAY plus kernel buffer hints.
/// This server is read-heavy; the send hint only covers kernel ACK batching.
fn tune_socket(stream: &TcpStream) {
    let sock = SockRef::from(stream);
    if let Err(error) = sock.set_nodelay(true) {
        debug!(%error, "set_nodelay failed");
    }
    if let Err(error) = sock.set_recv_buffer_size(SOCKET_RECV_BUF) {
        debug!(%error, "set_recv_buffer_size failed");
    }
    if let Err(error) = sock.set_send_buffer_size(SOCKET_SEND_BUF) {
        debug!(%error, "set_send_buffer_size failed");
    }
}

/// Serve one client until EOF, protocol error, terminate, or shutdown.
///
/// The decoder's carry buffer lives on this stack frame and the registry
/// entry is held by an RAII guard, so both are released on every exit path.
pub fn handle_connection(
    mut stream: TcpStream,
    journal: &mut Journal,
    registry: &ConnRegistry,
    shutdown: &Shutdown,
) -> Disconnect {
    tune_socket(&stream);
    let _guard = RegistryGuard {
        registry,
        key: registry.register(&stream),
    };

    let mut decoder = FrameDecoder::new();
    let mut buf = Box::new([0u8; READ_BUF_SIZE]);
    loop {
        if shutdown.is_stopped() {
            return Disconnect::Closed;
        }
        let n = match stream.read(&mut buf[..]) {
            Ok(0) => return Disconnect::Closed,
            Ok(n) => n,
            Err(error) => {
                debug!(%error, "connection read failed");
                return Disconnect::Closed;
            }
        };

        let mut input = &buf[..n];
        loop {
            match decoder.next_frame(&mut input) {
                Ok(Some(Frame::Digits(digits))) => journal.write(&digits),
                Ok(Some(Frame::Terminate)) => return Disconnect::Terminate,
                Ok(None) => break,
                Err(_invalid) => {
                    debug!("invalid frame; closing connection");
                    return Disconnect::Closed;
                }
            }
        }
    }
}
