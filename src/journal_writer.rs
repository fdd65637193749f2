//! Consumer side of the journal: drain ring batches, dedup, append to the
//! journal file.

use std::fs::{self, File};
use std::io::{self, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use disruptor::Polling;
use tracing::warn;

use crate::config::{JOURNAL_BUF_SIZE, JOURNAL_FILE_NAME};
use crate::constants::DIGIT_COUNT;
use crate::error::ServerError;
use crate::filter::DigitsFilter;
use crate::journal::DigitsPoller;
use crate::protocol::parse_digits;
use crate::stats::Statistics;
use crate::wait::{WaitPolicy, Waiter};

/// Outcome of one poll cycle against the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A batch of published slots was processed.
    Batch,
    /// Nothing published since the last poll.
    Empty,
    /// Every producer handle is gone and the ring is empty.
    Drained,
}

/// Delete any stale journal at `dir` and create a fresh, empty file. Returns
/// the file and its full path. Prior runs leave no state behind: the dedup
/// filter starts empty, so the journal must too.
pub fn create_journal_file(dir: &Path) -> Result<(File, PathBuf), ServerError> {
    let path = dir.join(JOURNAL_FILE_NAME);
    match fs::remove_file(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(source) => return Err(ServerError::JournalCreate { path, source }),
    }
    let file = File::create(&path).map_err(|source| ServerError::JournalCreate {
        path: path.clone(),
        source,
    })?;
    Ok((file, path))
}

/// Single-threaded drain of the journal ring. Owns the ring's read cursor,
/// the dedup filter, and the buffered journal file; no other thread touches
/// any of them.
pub struct JournalWriter {
    poller: DigitsPoller,
    filter: DigitsFilter,
    out: BufWriter<File>,
    stats: Arc<Statistics>,
    waiter: Arc<Waiter>,
    policy: WaitPolicy,
}

impl JournalWriter {
    pub fn new(
        poller: DigitsPoller,
        filter: DigitsFilter,
        file: File,
        stats: Arc<Statistics>,
        waiter: Arc<Waiter>,
        policy: WaitPolicy,
    ) -> Self {
        Self {
            poller,
            filter,
            out: BufWriter::with_capacity(JOURNAL_BUF_SIZE, file),
            stats,
            waiter,
            policy,
        }
    }

    /// Drain until every producer handle is gone and the ring is empty, then
    /// flush the file buffer and return.
    pub fn run(mut self) {
        loop {
            match self.poll_once() {
                PollOutcome::Batch => {}
                PollOutcome::Empty => self.waiter.idle(self.policy),
                PollOutcome::Drained => break,
            }
        }
        if let Err(error) = self.out.flush() {
            warn!(%error, "journal flush failed during shutdown");
        }
    }

    /// One poll cycle. For each slot in the claimed batch: parse, dedup,
    /// append unique values to the file buffer. Statistics are folded in
    /// once per batch. A write error discards the rest of the batch's file
    /// output but keeps filtering and counting. Exposed so integration tests
    /// can drive the drain without a thread.
    pub fn poll_once(&mut self) -> PollOutcome {
        match self.poller.poll() {
            Ok(mut guard) => {
                let mut received = 0u64;
                let mut duplicates = 0u64;
                let mut write_failed = false;
                for event in &mut guard {
                    received += 1;
                    let value = parse_digits(&event.digits);
                    if !self.filter.test_and_set(value) {
                        duplicates += 1;
                    } else if !write_failed {
                        if let Err(error) = write_record(&mut self.out, &event.digits) {
                            warn!(%error, "journal write failed; discarding batch output");
                            write_failed = true;
                        }
                    }
                }
                self.stats.add(received, duplicates);
                PollOutcome::Batch
            }
            Err(Polling::NoEvents) => PollOutcome::Empty,
            Err(Polling::Shutdown) => PollOutcome::Drained,
        }
    }

    /// Flush buffered records without waiting for shutdown. Test hook.
    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

fn write_record(out: &mut BufWriter<File>, digits: &[u8; DIGIT_COUNT]) -> io::Result<()> {
    out.write_all(digits)?;
    out.write_all(b"\n")
}
