/// Error taxonomy for the scan engine.
///
/// Failures come in two tiers that propagate differently:
///
/// - `ScanError` — fatal. The scan as a whole cannot proceed (missing root,
///   cancellation, bad configuration). Returned from `start_scan` and
///   `ScanHandle::join`.
/// - `ScanIssue` — recorded. One node could not be fully read; the issue is
///   attached to that node, counted, and the scan continues with siblings
///   and ancestors untouched.
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A failure that aborts the whole scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// A starting path does not exist (or vanished mid-scan). No partial
    /// result is produced.
    #[error("root path not found: {}", path.display())]
    RootNotFound { path: PathBuf },

    /// No root paths were supplied.
    #[error("no root paths to scan")]
    NoRoots,

    /// The caller requested cancellation. Partial results are discarded;
    /// this is a clean stop, not a failure of the scan itself.
    #[error("scan cancelled")]
    Cancelled,

    /// An exclude pattern failed to compile.
    #[error("invalid exclude pattern: {0}")]
    Pattern(#[from] globset::Error),

    /// The worker pool could not be built.
    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    /// The scanner thread panicked.
    #[error("scanner thread panicked")]
    Panicked,
}

/// Classification of a recorded, non-fatal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Permission denied reading or statting the entry.
    Access,
    /// The entry vanished between enumeration and stat.
    NotFound,
    /// A symlink cycle was detected; the branch was pruned.
    SymlinkLoop,
    /// Any other I/O failure on the entry.
    Read,
}

/// A non-fatal failure tied to one node, collected on the scan summary.
#[derive(Debug, Clone, Serialize)]
pub struct ScanIssue {
    pub path: PathBuf,
    pub kind: IssueKind,
    pub message: String,
}

impl ScanIssue {
    /// Build an issue from an I/O error, mapping the error kind onto the
    /// recorded taxonomy.
    pub fn from_io(path: PathBuf, err: &io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::PermissionDenied => IssueKind::Access,
            io::ErrorKind::NotFound => IssueKind::NotFound,
            _ => IssueKind::Read,
        };
        Self {
            path,
            kind,
            message: err.to_string(),
        }
    }

    pub fn symlink_loop(path: PathBuf) -> Self {
        Self {
            path,
            kind: IssueKind::SymlinkLoop,
            message: "symlink cycle detected".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_kinds_map_onto_the_taxonomy() {
        let path = PathBuf::from("/x");
        let denied = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(ScanIssue::from_io(path.clone(), &denied).kind, IssueKind::Access);

        let gone = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(ScanIssue::from_io(path.clone(), &gone).kind, IssueKind::NotFound);

        let other = io::Error::new(io::ErrorKind::InvalidData, "odd");
        assert_eq!(ScanIssue::from_io(path, &other).kind, IssueKind::Read);
    }
}
