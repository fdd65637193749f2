//! Throughput counters and the periodic stdout reporter.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::shutdown::Shutdown;

/// Interval between statistics lines.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Default)]
struct Counters {
    period_received: u64,
    period_duplicates: u64,
    total_received: u64,
    total_duplicates: u64,
}

/// Received/duplicate counters. `add` runs on the journal-writer thread,
/// `take_period` on the reporter thread; one short lock protects the
/// swap-and-read.
#[derive(Debug, Default)]
pub struct Statistics {
    counters: Mutex<Counters>,
}

impl Statistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one consumer batch into the current period.
    pub fn add(&self, received: u64, duplicates: u64) {
        debug_assert!(duplicates <= received);
        if received == 0 && duplicates == 0 {
            return;
        }
        let mut counters = self.lock();
        counters.period_received += received;
        counters.period_duplicates += duplicates;
    }

    /// Read and zero the period counters, folding them into the totals.
    pub fn take_period(&self) -> (u64, u64) {
        let mut counters = self.lock();
        let received = std::mem::take(&mut counters.period_received);
        let duplicates = std::mem::take(&mut counters.period_duplicates);
        counters.total_received += received;
        counters.total_duplicates += duplicates;
        (received, duplicates)
    }

    /// Lifetime totals, including any not-yet-reported period.
    pub fn totals(&self) -> (u64, u64) {
        let counters = self.lock();
        (
            counters.total_received + counters.period_received,
            counters.total_duplicates + counters.period_duplicates,
        )
    }

    fn lock(&self) -> MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Render one statistics line, without the trailing newline.
pub fn format_report(received: u64, duplicates: u64) -> String {
    format!("received {received} numbers, {duplicates} duplicates")
}

/// Spawn the reporter: one line on stdout every ten seconds, zeros included,
/// first line ten seconds after startup. The schedule is fixed-rate: a late
/// tick is logged but does not shift later deadlines. No partial-period line
/// is printed at shutdown.
pub fn spawn_reporter(stats: Arc<Statistics>, shutdown: Arc<Shutdown>) -> JoinHandle<()> {
    thread::Builder::new()
        .name("stats-reporter".into())
        .spawn(move || {
            let mut deadline = Instant::now() + REPORT_INTERVAL;
            loop {
                if shutdown.wait_deadline(deadline) {
                    return;
                }
                let late = deadline.elapsed();
                if late > REPORT_INTERVAL {
                    warn!(late_ms = late.as_millis() as u64, "statistics tick fired late");
                }
                let (received, duplicates) = stats.take_period();
                println!("{}", format_report(received, duplicates));
                deadline += REPORT_INTERVAL;
            }
        })
        .expect("failed to spawn stats reporter")
}
