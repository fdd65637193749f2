//! Process-wide stop flag, shutdown fan-out, and POSIX signal wiring.

use std::net::{Ipv4Addr, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::{Arc, Condvar, Mutex, OnceLock, PoisonError};
use std::thread;
use std::time::Instant;

use tracing::{debug, info};

use crate::connection::ConnRegistry;
use crate::error::ServerError;
use crate::wait::Waiter;

/// Global stop flag plus everything that must be woken when it flips.
///
/// `trigger` is idempotent: the compare-and-set guarantees only the first
/// caller runs the fan-out. Wake targets are wired in as the server starts
/// up; anything not yet wired is skipped.
pub struct Shutdown {
    stopped: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
    /// Loopback address used to unblock the acceptor; set after bind.
    wake_addr: OnceLock<SocketAddr>,
    /// Live client sockets; shut down to unblock worker reads.
    registry: OnceLock<Arc<ConnRegistry>>,
    /// Journal consumer parker; notified so a blocked consumer re-polls.
    waiter: OnceLock<Arc<Waiter>>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            stopped: AtomicBool::new(false),
            lock: Mutex::new(()),
            cond: Condvar::new(),
            wake_addr: OnceLock::new(),
            registry: OnceLock::new(),
            waiter: OnceLock::new(),
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn set_wake_addr(&self, addr: SocketAddr) {
        let wake = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), addr.port());
        let _ = self.wake_addr.set(wake);
    }

    pub fn set_registry(&self, registry: Arc<ConnRegistry>) {
        let _ = self.registry.set(registry);
    }

    pub fn set_waiter(&self, waiter: Arc<Waiter>) {
        let _ = self.waiter.set(waiter);
    }

    /// Flip the stop flag and wake every blocked thread. Safe to call from
    /// any thread, any number of times.
    pub fn trigger(&self) {
        if self
            .stopped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        info!("shutdown triggered");

        {
            let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.cond.notify_all();
        }
        if let Some(waiter) = self.waiter.get() {
            waiter.notify();
        }
        if let Some(addr) = self.wake_addr.get() {
            // unblocks accept(); the acceptor discards this connection
            if let Err(error) = TcpStream::connect(addr) {
                debug!(%error, "acceptor wake connect failed");
            }
        }
        if let Some(registry) = self.registry.get() {
            registry.shutdown_all();
        }
    }

    /// Sleep until `deadline` or until shutdown triggers, whichever comes
    /// first. Returns `true` if shutdown triggered.
    pub fn wait_deadline(&self, deadline: Instant) -> bool {
        let mut guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if self.is_stopped() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            guard = self
                .cond
                .wait_timeout(guard, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// eventfd written from the signal handler, read by the watcher thread.
static SIGNAL_FD: AtomicI32 = AtomicI32::new(-1);

extern "C" fn on_signal(_signum: libc::c_int) {
    // async-signal-safe: a single write(2) on the eventfd
    let fd = SIGNAL_FD.load(Ordering::SeqCst);
    if fd >= 0 {
        let one: u64 = 1;
        unsafe {
            libc::write(fd, &one as *const u64 as *const libc::c_void, 8);
        }
    }
}

/// Install SIGINT/SIGTERM handlers that funnel into `shutdown.trigger()`.
///
/// The handler itself only writes to an eventfd; a watcher thread parked on
/// that fd runs the actual trigger.
pub fn install_signal_handlers(shutdown: Arc<Shutdown>) -> Result<(), ServerError> {
    let fd = unsafe { libc::eventfd(0, 0) };
    if fd < 0 {
        return Err(ServerError::Signal(std::io::Error::last_os_error()));
    }
    SIGNAL_FD.store(fd, Ordering::SeqCst);

    unsafe {
        let mut action: libc::sigaction = std::mem::zeroed();
        action.sa_sigaction = on_signal as extern "C" fn(libc::c_int) as usize;
        action.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut action.sa_mask);
        for signal in [libc::SIGINT, libc::SIGTERM] {
            if libc::sigaction(signal, &action, std::ptr::null_mut()) != 0 {
                return Err(ServerError::Signal(std::io::Error::last_os_error()));
            }
        }
    }

    thread::Builder::new()
        .name("signal-watcher".into())
        .spawn(move || {
            let mut count = 0u64;
            let n = unsafe {
                libc::read(
                    SIGNAL_FD.load(Ordering::SeqCst),
                    &mut count as *mut u64 as *mut libc::c_void,
                    8,
                )
            };
            if n == 8 {
                shutdown.trigger();
            }
        })
        .map_err(ServerError::Signal)?;
    Ok(())
}
