/// A single node in the arena-allocated scan tree.
///
/// Nodes are stored in a flat `Vec<Node>` for cache-friendly traversal.
/// Parent-child relationships use indices rather than pointers, which also
/// keeps per-node allocation down to the name itself.
use crate::error::IssueKind;
use crate::model::size::SizeMode;
use compact_str::CompactString;

/// Lightweight index into the arena `Vec<Node>`.
///
/// Uses `u32` to keep nodes small — supports up to ~4 billion nodes,
/// which is more than enough for any real filesystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// Create a new `NodeIndex` from a `usize`, panicking in debug builds if
    /// it exceeds `u32::MAX`.
    #[inline]
    pub fn new(index: usize) -> Self {
        debug_assert!(index <= u32::MAX as usize, "NodeIndex overflow");
        Self(index as u32)
    }

    /// Return the index as a `usize` for Vec indexing.
    #[inline]
    pub fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Filesystem entry kinds the classifier distinguishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
    Symlink,
    /// Device nodes, sockets, FIFOs — anything that is none of the above.
    Other,
}

impl NodeKind {
    #[inline]
    pub fn is_dir(self) -> bool {
        matches!(self, NodeKind::Directory)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Directory => "directory",
            NodeKind::Symlink => "symlink",
            NodeKind::Other => "other",
        }
    }
}

/// Identity of the underlying data object: `(device, inode)`.
///
/// Two directory entries with the same identity are hard links to one
/// object and must be counted once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct InodeId {
    pub dev: u64,
    pub ino: u64,
}

/// A single filesystem entry in the tree.
///
/// Stored in a flat arena (`Vec<Node>`). Children are linked via a
/// `first_child` / `next_sibling` list so that no separate `Vec<NodeIndex>`
/// allocation is needed per node.
#[derive(Debug, Clone)]
pub struct Node {
    /// Entry name only (NOT the full path) — except for scan roots, which
    /// keep the path they were given so full paths can be reconstructed.
    pub name: CompactString,

    pub kind: NodeKind,

    /// Logical byte length from metadata. For directories this is the
    /// subtree aggregate (children plus the directory's own metadata),
    /// written at the directory's join.
    pub apparent_size: u64,

    /// Bytes actually consumed on storage (block-rounded). May exceed or be
    /// less than `apparent_size` (sparse files, compression, tail blocks).
    pub allocated_size: u64,

    /// `(device, inode)` identity, when the platform provides one.
    pub inode: Option<InodeId>,

    /// Index of the parent node. `None` for scan roots.
    pub parent: Option<NodeIndex>,

    /// First child (directories only). Children form a singly-linked list
    /// via [`next_sibling`](Node::next_sibling).
    pub first_child: Option<NodeIndex>,

    /// Next sibling under the same parent.
    pub next_sibling: Option<NodeIndex>,

    /// Total number of descendant non-directory entries.
    pub entry_count: u64,

    /// Share of the parent's aggregate **apparent** size (0.0–100.0),
    /// computed once in the finalize pass. Consumers reporting allocated
    /// sizes must derive their own ratio so the columns agree.
    pub percent_of_parent: f32,

    /// Set when the entry could not be fully read. The node stays in the
    /// tree so consumers can see where the scan degraded.
    pub issue: Option<IssueKind>,

    /// Filesystem boundary marker: the stay-on-filesystem policy stopped
    /// descent at this directory. Not an error.
    pub boundary: bool,

    /// Zero-weight reference to a hard-linked object already counted
    /// elsewhere in this scan.
    pub duplicate: bool,
}

impl Node {
    pub fn new(name: CompactString, kind: NodeKind) -> Self {
        Self {
            name,
            kind,
            apparent_size: 0,
            allocated_size: 0,
            inode: None,
            parent: None,
            first_child: None,
            next_sibling: None,
            entry_count: 0,
            percent_of_parent: 0.0,
            issue: None,
            boundary: false,
            duplicate: false,
        }
    }

    /// The size this node contributes under the given accounting mode.
    #[inline]
    pub fn size_for(&self, mode: SizeMode) -> u64 {
        match mode {
            SizeMode::Apparent => self.apparent_size,
            SizeMode::Allocated => self.allocated_size,
        }
    }
}
