/// Progress reporting — shared atomic counters sampled by a throttled
/// reporter thread.
///
/// Workers only touch atomics (and one mutex for the current path, updated
/// per directory, not per entry); the reporter reads them on its own
/// schedule and pushes snapshots into a bounded channel with `try_send`.
/// Under backpressure samples are dropped, never delaying a worker —
/// progress is a monitoring aid, not part of correctness.
use crate::error::ScanIssue;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// The reporter is nudged out of its interval sleep every this many entries,
/// so bursts on fast filesystems surface between timer ticks.
pub const SAMPLE_EVERY_ENTRIES: u64 = 8_192;

/// Progress messages sent from the scan to a subscriber.
///
/// The actual tree data lives in the shared `LiveTree`; these messages
/// carry only lightweight counters and status flags. All of them are
/// best-effort: the authoritative outcome comes from `ScanHandle::join`.
#[derive(Debug)]
pub enum ScanProgress {
    /// Periodic snapshot of the shared counters.
    Update {
        files: u64,
        dirs: u64,
        apparent_bytes: u64,
        errors: u64,
        current_path: PathBuf,
    },
    /// A non-fatal issue was recorded (it also appears on the summary).
    Issue(ScanIssue),
    /// Scanning completed; the finished tree is in the shared `LiveTree`.
    Complete { duration: Duration, error_count: u64 },
    /// Scan was cancelled; partial results were discarded.
    Cancelled,
}

/// Counters shared between all workers and the reporter.
#[derive(Default)]
pub struct ScanCounters {
    files: AtomicU64,
    dirs: AtomicU64,
    apparent_bytes: AtomicU64,
    allocated_bytes: AtomicU64,
    errors: AtomicU64,
    hardlinks: AtomicU64,
    entries: AtomicU64,
    last_bucket: AtomicU64,
    current_path: Mutex<PathBuf>,
}

impl ScanCounters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_file(&self, apparent: u64, allocated: u64) {
        self.files.fetch_add(1, Ordering::Relaxed);
        self.apparent_bytes.fetch_add(apparent, Ordering::Relaxed);
        self.allocated_bytes.fetch_add(allocated, Ordering::Relaxed);
    }

    pub fn record_dir(&self, apparent: u64, allocated: u64) {
        self.dirs.fetch_add(1, Ordering::Relaxed);
        self.apparent_bytes.fetch_add(apparent, Ordering::Relaxed);
        self.allocated_bytes.fetch_add(allocated, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_hardlink(&self) {
        self.hardlinks.fetch_add(1, Ordering::Relaxed);
    }

    /// Note the directory a worker is about to enumerate.
    pub fn enter_directory(&self, path: &Path) {
        *self.current_path.lock() = path.to_path_buf();
    }

    /// Account `n` processed entries and nudge the reporter whenever the
    /// running total crosses a `SAMPLE_EVERY_ENTRIES` boundary. The nudge
    /// channel has capacity 1; a full channel means a sample is already
    /// pending, which is all a nudge could achieve anyway.
    pub fn note_entries(&self, n: u64, tick: &Sender<()>) {
        let total = self.entries.fetch_add(n, Ordering::Relaxed) + n;
        let bucket = total / SAMPLE_EVERY_ENTRIES;
        if bucket > self.last_bucket.swap(bucket, Ordering::Relaxed) {
            let _ = tick.try_send(());
        }
    }

    pub fn files(&self) -> u64 {
        self.files.load(Ordering::Relaxed)
    }

    pub fn dirs(&self) -> u64 {
        self.dirs.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    pub fn hardlinks(&self) -> u64 {
        self.hardlinks.load(Ordering::Relaxed)
    }

    fn snapshot(&self) -> ScanProgress {
        ScanProgress::Update {
            files: self.files.load(Ordering::Relaxed),
            dirs: self.dirs.load(Ordering::Relaxed),
            apparent_bytes: self.apparent_bytes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            current_path: self.current_path.lock().clone(),
        }
    }
}

/// Spawn the reporter thread.
///
/// It wakes on whichever comes first — the interval timer or an entry-count
/// nudge — emits a snapshot, and exits when the nudge channel disconnects
/// (the walk has ended, successfully or not).
pub fn spawn_reporter(
    counters: Arc<ScanCounters>,
    progress_tx: Sender<ScanProgress>,
    tick_rx: Receiver<()>,
    interval: Duration,
) -> JoinHandle<()> {
    thread::Builder::new()
        .name("duscan-progress".into())
        .spawn(move || loop {
            match tick_rx.recv_timeout(interval) {
                Ok(()) | Err(RecvTimeoutError::Timeout) => {
                    let _ = progress_tx.try_send(counters.snapshot());
                }
                Err(RecvTimeoutError::Disconnected) => {
                    // One last snapshot so even very short scans surface
                    // their final counters.
                    let _ = progress_tx.try_send(counters.snapshot());
                    break;
                }
            }
        })
        .expect("failed to spawn progress reporter")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_totals() {
        let counters = ScanCounters::new();
        counters.record_file(100, 128);
        counters.record_file(50, 64);
        counters.record_dir(10, 0);
        counters.record_error();
        counters.enter_directory(Path::new("/somewhere"));

        match counters.snapshot() {
            ScanProgress::Update {
                files,
                dirs,
                apparent_bytes,
                errors,
                current_path,
            } => {
                assert_eq!(files, 2);
                assert_eq!(dirs, 1);
                assert_eq!(apparent_bytes, 160);
                assert_eq!(errors, 1);
                assert_eq!(current_path, PathBuf::from("/somewhere"));
            }
            other => panic!("unexpected snapshot: {other:?}"),
        }
    }

    #[test]
    fn crossing_an_entry_bucket_nudges_the_reporter() {
        let counters = ScanCounters::new();
        let (tick_tx, tick_rx) = crossbeam_channel::bounded::<()>(1);

        counters.note_entries(10, &tick_tx);
        assert!(tick_rx.try_recv().is_err(), "no nudge below the boundary");

        counters.note_entries(SAMPLE_EVERY_ENTRIES, &tick_tx);
        assert!(tick_rx.try_recv().is_ok(), "boundary crossing must nudge");
    }

    #[test]
    fn reporter_emits_then_exits_on_disconnect() {
        let counters = Arc::new(ScanCounters::new());
        counters.record_file(1, 1);
        let (progress_tx, progress_rx) = crossbeam_channel::bounded(16);
        let (tick_tx, tick_rx) = crossbeam_channel::bounded::<()>(1);

        let reporter = spawn_reporter(
            counters,
            progress_tx,
            tick_rx,
            Duration::from_millis(1),
        );

        let first = progress_rx.recv_timeout(Duration::from_secs(5));
        assert!(matches!(first, Ok(ScanProgress::Update { .. })));

        drop(tick_tx);
        reporter.join().unwrap();
    }
}
