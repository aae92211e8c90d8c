/// duscan core — concurrent filesystem scanning and the scan data model.
///
/// This crate contains all scanning logic with zero frontend dependencies.
/// It is designed to be reusable across different frontends (CLI, TUI, GUI).
///
/// # Modules
///
/// - [`model`] — Arena-allocated scan tree and supporting types.
/// - [`scanner`] — Concurrent traversal with progress reporting and
///   cancellation.
/// - [`analysis`] — Post-scan queries over the finalized tree.
/// - [`report`] — Completed-scan result types and the JSON snapshot.
/// - [`error`] — The fatal-vs-recorded error taxonomy.
pub mod analysis;
pub mod error;
pub mod model;
pub mod report;
pub mod scanner;

pub use error::{IssueKind, ScanError, ScanIssue};
pub use model::{FileTree, Node, NodeIndex, NodeKind, SizeMode};
pub use report::{Report, ScanResult, ScanSummary};
pub use scanner::progress::ScanProgress;
pub use scanner::{start_scan, LiveTree, ScanHandle, ScanOptions};
