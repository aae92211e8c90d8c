/// Completed-scan result types and the JSON report snapshot.
use crate::error::{IssueKind, ScanIssue};
use crate::model::{FileTree, NodeIndex, SizeMode};
use crate::scanner::LiveTree;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

/// The outcome of a finished scan: the completed tree plus summary
/// counters. Immutable once the scan thread resolves.
pub struct ScanResult {
    /// The completed, finalized tree. Shared with any live consumers that
    /// were reading while the scan ran.
    pub tree: LiveTree,
    pub summary: ScanSummary,
}

/// Summary counters for one scan invocation.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    /// Non-directory entries seen (hard-link duplicates included).
    pub files: u64,
    pub directories: u64,
    pub apparent_bytes: u64,
    pub allocated_bytes: u64,
    /// Hard-link references that were recorded with zero weight because
    /// their object was already counted.
    pub hardlinks_deduped: u64,
    /// Every non-fatal issue recorded during the scan.
    pub issues: Vec<ScanIssue>,
    pub duration: Duration,
    pub started_at: DateTime<Utc>,
}

impl ScanSummary {
    /// `true` when no per-node issue was recorded.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Serializable snapshot of a finished scan: the summary plus the nested
/// tree, ordered largest-first so the output is deterministic.
#[derive(Debug, Serialize)]
pub struct Report {
    pub summary: ScanSummary,
    pub roots: Vec<NodeView>,
}

/// One node of the snapshot tree.
#[derive(Debug, Serialize)]
pub struct NodeView {
    pub name: String,
    pub kind: &'static str,
    pub apparent_size: u64,
    pub allocated_size: u64,
    pub entry_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<IssueKind>,
    #[serde(skip_serializing_if = "is_false")]
    pub boundary: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub duplicate: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeView>,
}

fn is_false(flag: &bool) -> bool {
    !*flag
}

impl Report {
    pub fn new(result: &ScanResult) -> Self {
        let tree = result.tree.read();
        let roots = tree
            .roots
            .iter()
            .map(|&root| NodeView::build(&tree, root))
            .collect();
        Self {
            summary: result.summary.clone(),
            roots,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl NodeView {
    fn build(tree: &FileTree, index: NodeIndex) -> Self {
        let node = tree.node(index);
        let children = tree
            .children_sorted(index, SizeMode::Apparent)
            .into_iter()
            .map(|child| NodeView::build(tree, child))
            .collect();
        Self {
            name: node.name.to_string(),
            kind: node.kind.as_str(),
            apparent_size: node.apparent_size,
            allocated_size: node.allocated_size,
            entry_count: node.entry_count,
            issue: node.issue,
            boundary: node.boundary,
            duplicate: node.duplicate,
            children,
        }
    }
}
