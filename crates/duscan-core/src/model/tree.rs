/// Arena-backed scan tree.
///
/// All nodes live in a single `Vec<Node>`. Relationships between nodes use
/// `NodeIndex` (a thin `u32` wrapper) rather than heap pointers, giving
/// cache-friendly traversal and cheap sharing behind a lock.
///
/// Aggregation happens at each directory's join in the walker — a parent's
/// totals are written strictly after all of its children's totals exist.
/// [`FileTree::finalize`] only computes the derived views on the completed
/// tree: percent-of-parent, the largest-files cache, and grand totals.
use super::node::{Node, NodeIndex};
use super::size::SizeMode;
use crate::error::IssueKind;

/// The complete tree produced by a scan, possibly still growing while the
/// scan runs.
#[derive(Debug, Clone, Default)]
pub struct FileTree {
    /// Arena: every node in a flat vector, parents always before children.
    pub nodes: Vec<Node>,

    /// Root node indices — one per scanned root path.
    pub roots: Vec<NodeIndex>,

    /// Total apparent bytes across all roots, set by `finalize`.
    pub total_apparent: u64,

    /// Total allocated bytes across all roots, set by `finalize`.
    pub total_allocated: u64,

    /// Indices of the N largest non-directory entries, sorted descending by
    /// apparent size. Set by `finalize`.
    pub largest_files: Vec<NodeIndex>,
}

impl FileTree {
    /// Create an empty tree with pre-allocated capacity.
    ///
    /// `estimated_nodes` is a rough guess; the arena grows as needed, but
    /// pre-allocation avoids repeated re-allocation early in a scan.
    pub fn with_capacity(estimated_nodes: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(estimated_nodes),
            ..Self::default()
        }
    }

    /// Allocate a new node in the arena and return its index.
    pub fn add_node(&mut self, node: Node) -> NodeIndex {
        let idx = NodeIndex::new(self.nodes.len());
        self.nodes.push(node);
        idx
    }

    /// Add a scan root to the tree.
    pub fn add_root(&mut self, node: Node) -> NodeIndex {
        let idx = self.add_node(node);
        self.roots.push(idx);
        idx
    }

    /// Attach `child` as a child of `parent`, prepending to the sibling
    /// list. O(1); sibling order reflects discovery order, which is not
    /// meaningful under concurrent traversal.
    pub fn add_child(&mut self, parent: NodeIndex, child: NodeIndex) {
        let old_first = self.nodes[parent.idx()].first_child;
        self.nodes[child.idx()].next_sibling = old_first;
        self.nodes[child.idx()].parent = Some(parent);
        self.nodes[parent.idx()].first_child = Some(child);
    }

    /// Write a directory's folded totals. Called exactly once per directory,
    /// at its join, after every child subtree has completed.
    pub fn set_aggregate(
        &mut self,
        index: NodeIndex,
        apparent: u64,
        allocated: u64,
        entry_count: u64,
    ) {
        let node = &mut self.nodes[index.idx()];
        node.apparent_size = apparent;
        node.allocated_size = allocated;
        node.entry_count = entry_count;
    }

    /// Attach a recorded issue to a node.
    pub fn annotate(&mut self, index: NodeIndex, issue: IssueKind) {
        self.nodes[index.idx()].issue = Some(issue);
    }

    /// Mark a node as a zero-weight hard-link duplicate.
    pub fn mark_duplicate(&mut self, index: NodeIndex) {
        self.nodes[index.idx()].duplicate = true;
    }

    /// Compute the derived views on a completed tree: apparent-based
    /// percent-of-parent for every node, the top-N largest files, and
    /// grand totals.
    pub fn finalize(&mut self, largest: usize) {
        for i in 0..self.nodes.len() {
            let parent_size = self.nodes[i]
                .parent
                .map(|p| self.nodes[p.idx()].apparent_size)
                // Roots use their own size as denominator.
                .unwrap_or(self.nodes[i].apparent_size);

            self.nodes[i].percent_of_parent = if parent_size > 0 {
                (self.nodes[i].apparent_size as f64 / parent_size as f64 * 100.0) as f32
            } else {
                0.0
            };
        }

        self.total_apparent = self
            .roots
            .iter()
            .map(|r| self.nodes[r.idx()].apparent_size)
            .sum();
        self.total_allocated = self
            .roots
            .iter()
            .map(|r| self.nodes[r.idx()].allocated_size)
            .sum();

        self.compute_largest_files(largest);
    }

    /// Find the N largest non-directory entries by apparent size.
    ///
    /// `select_nth_unstable_by` brings the top-N candidates to the front in
    /// O(n) average time; only that small slice is then fully sorted.
    fn compute_largest_files(&mut self, n: usize) {
        self.largest_files.clear();
        if n == 0 {
            return;
        }

        let mut candidates: Vec<NodeIndex> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| !node.kind.is_dir() && !node.duplicate)
            .map(|(i, _)| NodeIndex::new(i))
            .collect();

        let key = |tree: &Self, idx: NodeIndex| {
            let node = &tree.nodes[idx.idx()];
            (node.apparent_size, node.allocated_size)
        };

        if candidates.len() > n {
            candidates.select_nth_unstable_by(n - 1, |a, b| key(self, *b).cmp(&key(self, *a)));
            candidates.truncate(n);
        }
        candidates.sort_unstable_by(|a, b| key(self, *b).cmp(&key(self, *a)));
        self.largest_files = candidates;
    }

    /// Reconstruct the full path for a node by walking up to its root.
    ///
    /// Root nodes keep the path they were given, so the result is absolute
    /// whenever the scan root was.
    pub fn full_path(&self, index: NodeIndex) -> std::path::PathBuf {
        let mut segments = Vec::new();
        let mut current = Some(index);
        while let Some(idx) = current {
            segments.push(self.nodes[idx.idx()].name.as_str());
            current = self.nodes[idx.idx()].parent;
        }
        let mut path = std::path::PathBuf::new();
        for segment in segments.into_iter().rev() {
            path.push(segment);
        }
        path
    }

    /// Direct children of a node, unsorted.
    pub fn children(&self, parent: NodeIndex) -> Vec<NodeIndex> {
        let mut children = Vec::new();
        let mut child = self.nodes[parent.idx()].first_child;
        while let Some(idx) = child {
            children.push(idx);
            child = self.nodes[idx.idx()].next_sibling;
        }
        children
    }

    /// Direct children sorted by size under the given mode, descending,
    /// with the name as tie-break so output order is deterministic across
    /// scans despite non-deterministic traversal order.
    pub fn children_sorted(&self, parent: NodeIndex, mode: SizeMode) -> Vec<NodeIndex> {
        let mut children = self.children(parent);
        children.sort_unstable_by(|a, b| {
            let a_node = &self.nodes[a.idx()];
            let b_node = &self.nodes[b.idx()];
            b_node
                .size_for(mode)
                .cmp(&a_node.size_for(mode))
                .then_with(|| a_node.name.cmp(&b_node.name))
        });
        children
    }

    /// Get the node at the given index.
    #[inline]
    pub fn node(&self, index: NodeIndex) -> &Node {
        &self.nodes[index.idx()]
    }

    /// Total number of nodes in the tree.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if the tree contains no nodes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Discard all nodes. Used when a cancelled scan throws away partial
    /// results.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.roots.clear();
        self.total_apparent = 0;
        self.total_allocated = 0;
        self.largest_files.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeKind;
    use compact_str::CompactString;

    fn dir(name: &str) -> Node {
        Node::new(CompactString::new(name), NodeKind::Directory)
    }

    fn file(name: &str, size: u64) -> Node {
        let mut node = Node::new(CompactString::new(name), NodeKind::File);
        node.apparent_size = size;
        node.allocated_size = size;
        node
    }

    #[test]
    fn aggregates_flow_up_through_joins() {
        let mut tree = FileTree::with_capacity(8);

        let root = tree.add_root(dir("/scan"));
        let sub = tree.add_node(dir("sub"));
        tree.add_child(root, sub);
        let a = tree.add_node(file("a.txt", 100));
        tree.add_child(sub, a);
        let b = tree.add_node(file("b.txt", 300));
        tree.add_child(sub, b);

        // The walker writes each directory's totals at its join.
        tree.set_aggregate(sub, 400, 400, 2);
        tree.set_aggregate(root, 400, 400, 2);
        tree.finalize(10);

        assert_eq!(tree.node(sub).apparent_size, 400);
        assert_eq!(tree.node(root).entry_count, 2);
        assert_eq!(tree.total_apparent, 400);
        assert_eq!(tree.node(b).percent_of_parent, 75.0);
        assert_eq!(tree.largest_files, vec![b, a]);
    }

    #[test]
    fn full_path_walks_up_to_the_root() {
        let mut tree = FileTree::with_capacity(4);
        let root = tree.add_root(dir("/data"));
        let sub = tree.add_node(dir("logs"));
        tree.add_child(root, sub);
        let leaf = tree.add_node(file("app.log", 5));
        tree.add_child(sub, leaf);

        assert_eq!(
            tree.full_path(leaf),
            std::path::PathBuf::from("/data/logs/app.log")
        );
    }

    #[test]
    fn children_sort_by_size_then_name() {
        let mut tree = FileTree::with_capacity(8);
        let root = tree.add_root(dir("/scan"));
        let small = tree.add_node(file("small", 10));
        tree.add_child(root, small);
        let big = tree.add_node(file("big", 1000));
        tree.add_child(root, big);
        let tie_b = tree.add_node(file("b-tie", 10));
        tree.add_child(root, tie_b);

        let sorted = tree.children_sorted(root, SizeMode::Apparent);
        assert_eq!(sorted, vec![big, tie_b, small]);
    }

    #[test]
    fn duplicates_never_make_the_largest_list() {
        let mut tree = FileTree::with_capacity(4);
        let root = tree.add_root(dir("/scan"));
        let original = tree.add_node(file("orig", 2048));
        tree.add_child(root, original);
        let mut dup = file("link", 0);
        dup.duplicate = true;
        let dup = tree.add_node(dup);
        tree.add_child(root, dup);

        tree.finalize(10);
        assert_eq!(tree.largest_files, vec![original]);
    }

    #[test]
    fn clear_discards_everything() {
        let mut tree = FileTree::with_capacity(2);
        tree.add_root(dir("/scan"));
        tree.clear();
        assert!(tree.is_empty());
        assert!(tree.roots.is_empty());
    }
}
