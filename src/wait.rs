//! Idle policy for the journal consumer between ring polls.
//!
//! Producers never wait on this policy; their only wait is a full ring.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

use clap::ValueEnum;

/// How the journal consumer waits when the ring is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WaitPolicy {
    /// Park on a condition that producers notify. Lowest idle CPU.
    Block,
    /// Sleep for tens of microseconds per empty poll.
    Sleep,
    /// Hint the scheduler to run something else.
    Yield,
    /// Spin. Lowest wake latency, one core pinned.
    Busy,
}

impl std::fmt::Display for WaitPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WaitPolicy::Block => "block",
            WaitPolicy::Sleep => "sleep",
            WaitPolicy::Yield => "yield",
            WaitPolicy::Busy => "busy",
        };
        f.write_str(name)
    }
}

/// Sleep duration for `WaitPolicy::Sleep`.
const IDLE_SLEEP: Duration = Duration::from_micros(50);

/// Park backstop for `WaitPolicy::Block`; bounds the window where a publish
/// lands between a failed poll and the park.
const PARK_TIMEOUT: Duration = Duration::from_millis(10);

/// Parker shared between the consumer (waits) and producers (notify).
pub struct Waiter {
    parked: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
}

impl Waiter {
    pub fn new() -> Self {
        Self {
            parked: AtomicBool::new(false),
            lock: Mutex::new(()),
            cond: Condvar::new(),
        }
    }

    /// Consumer side: wait out one empty poll according to `policy`.
    pub fn idle(&self, policy: WaitPolicy) {
        match policy {
            WaitPolicy::Busy => std::hint::spin_loop(),
            WaitPolicy::Yield => std::thread::yield_now(),
            WaitPolicy::Sleep => std::thread::sleep(IDLE_SLEEP),
            WaitPolicy::Block => {
                self.parked.store(true, Ordering::SeqCst);
                let guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
                let _unparked = self.cond.wait_timeout(guard, PARK_TIMEOUT);
                self.parked.store(false, Ordering::SeqCst);
            }
        }
    }

    /// Producer side: wake a parked consumer. Cheap when nobody is parked.
    pub fn notify(&self) {
        if self.parked.load(Ordering::SeqCst) {
            let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
            self.cond.notify_all();
        }
    }
}

impl Default for Waiter {
    fn default() -> Self {
        Self::new()
    }
}
