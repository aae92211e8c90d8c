/// Scanner module — orchestrates concurrent filesystem traversal.
///
/// A scan runs on a dedicated background thread which drives a bounded
/// worker pool (see [`walker`]). Nodes land in a **shared `LiveTree`**
/// (`Arc<RwLock<FileTree>>`) as directories complete, so a frontend can
/// render an incrementally-growing view while the scan is running; the
/// authoritative [`ScanResult`](crate::report::ScanResult) comes from
/// [`ScanHandle::join`].
pub mod classify;
pub mod dedup;
pub mod progress;
pub mod walker;

use crate::error::ScanError;
use crate::model::FileTree;
use crate::report::ScanResult;
use progress::ScanProgress;

use crossbeam_channel::Receiver;
use parking_lot::RwLock;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::info;

/// A shared, concurrently-readable scan tree.
///
/// Workers hold the write lock briefly — once per directory to insert its
/// children, once at the join to write its totals. A frontend may hold a
/// read lock to render the live tree.
pub type LiveTree = Arc<RwLock<FileTree>>;

/// Maximum number of progress messages that may queue up in the channel.
///
/// Messages are pushed with `try_send`: a subscriber that falls behind (or
/// does not exist) costs dropped samples, never a stalled worker. 4 096
/// slots give an attentive subscriber plenty of headroom at any realistic
/// sampling cadence.
pub const PROGRESS_CHANNEL_CAPACITY: usize = 4_096;

/// Arena capacity reserved up front; the tree grows past this as needed.
const INITIAL_TREE_CAPACITY: usize = 64 * 1024;

/// Configuration for one scan invocation.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Root paths to scan. Each becomes one root in the resulting tree.
    pub roots: Vec<PathBuf>,

    /// Expand a directory only while its depth is below this limit
    /// (roots are depth 0). `None` means unbounded.
    pub max_depth: Option<usize>,

    /// Descend into symlinked directories. Off by default: symlinks are
    /// recorded as zero-weight leaf references, which avoids cycles and
    /// double counting without tracking state.
    pub follow_symlinks: bool,

    /// Stay on the filesystem of each root: directories on other devices
    /// are recorded as boundary markers and not descended into.
    pub same_filesystem: bool,

    /// Glob patterns matched against full paths; matching entries are
    /// skipped entirely.
    pub exclude: Vec<String>,

    /// Worker pool size. `None` picks a small multiple of the available
    /// parallelism.
    pub threads: Option<usize>,

    /// Interval between progress samples (entry-count bursts can trigger
    /// an earlier sample).
    pub progress_interval: Duration,

    /// How many entries the largest-files cache keeps.
    pub largest_files: usize,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            roots: Vec::new(),
            max_depth: None,
            follow_symlinks: false,
            same_filesystem: false,
            exclude: Vec::new(),
            threads: None,
            progress_interval: Duration::from_millis(250),
            largest_files: 100,
        }
    }
}

impl ScanOptions {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            ..Self::default()
        }
    }

    /// Resolved worker pool size: directory enumeration blocks on I/O, so
    /// oversubscribing the cores pays off.
    pub fn worker_threads(&self) -> usize {
        self.threads
            .unwrap_or_else(|| (num_cpus::get() * 2).clamp(1, 64))
    }
}

/// Handle to a running or completed scan. Allows cancellation, receiving
/// progress updates, reading the live tree, and collecting the result.
pub struct ScanHandle {
    /// Receiver for progress updates from the scan thread.
    pub progress_rx: Receiver<ScanProgress>,

    /// Shared tree that is populated incrementally during scanning.
    pub live_tree: LiveTree,

    /// Flag to request cancellation.
    cancel_flag: Arc<AtomicBool>,

    /// Join handle for the scan thread.
    thread: thread::JoinHandle<Result<ScanResult, ScanError>>,
}

impl ScanHandle {
    /// Request the scan to stop as soon as possible. Workers observe the
    /// flag at unit boundaries; partial results are discarded.
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    /// Wait for the scan thread to finish and collect the outcome. A
    /// cancelled scan resolves to `Err(ScanError::Cancelled)`; once this
    /// returns, no worker units are still running.
    pub fn join(self) -> Result<ScanResult, ScanError> {
        self.thread.join().map_err(|_| ScanError::Panicked)?
    }
}

/// Start a new scan on a background thread.
///
/// Root paths are validated up front: a missing root fails here with
/// [`ScanError::RootNotFound`] and nothing is spawned.
pub fn start_scan(options: ScanOptions) -> Result<ScanHandle, ScanError> {
    if options.roots.is_empty() {
        return Err(ScanError::NoRoots);
    }

    // Compile excludes early so bad patterns fail synchronously.
    let excludes = walker::ExcludeMatcher::compile(&options.exclude)?;

    // Roots resolve through symlinks, so `duscan /some/link` scans the
    // target. Anything un-statable is fatal before traversal begins.
    for root in &options.roots {
        if fs::metadata(root).is_err() {
            return Err(ScanError::RootNotFound { path: root.clone() });
        }
    }

    let (progress_tx, progress_rx) =
        crossbeam_channel::bounded::<ScanProgress>(PROGRESS_CHANNEL_CAPACITY);
    let cancel_flag = Arc::new(AtomicBool::new(false));
    let cancel_clone = cancel_flag.clone();

    let live_tree: LiveTree = Arc::new(RwLock::new(FileTree::with_capacity(
        INITIAL_TREE_CAPACITY,
    )));
    let tree_clone = live_tree.clone();

    info!(roots = options.roots.len(), "starting scan");

    let thread = thread::Builder::new()
        .name("duscan-scan".into())
        .spawn(move || walker::run_scan(options, excludes, progress_tx, cancel_clone, tree_clone))
        .expect("failed to spawn scanner thread");

    Ok(ScanHandle {
        progress_rx,
        live_tree,
        cancel_flag,
        thread,
    })
}
