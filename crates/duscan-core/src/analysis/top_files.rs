/// Largest-files query.
///
/// `FileTree::finalize` caches the top candidates with a partial selection;
/// this query reads that cache and enriches each entry with its
/// reconstructed path.
use crate::model::{FileTree, NodeIndex};
use std::path::PathBuf;

/// One entry in the largest-files listing.
#[derive(Debug)]
pub struct LargestFile {
    /// Index into the tree arena.
    pub index: NodeIndex,
    /// Full path, reconstructed from the tree.
    pub path: PathBuf,
    pub apparent_size: u64,
    pub allocated_size: u64,
}

/// The `n` largest non-directory entries, largest first. Hard-link
/// duplicates never appear — their weight belongs to the reference that
/// won the dedup race.
pub fn largest_files(tree: &FileTree, n: usize) -> Vec<LargestFile> {
    tree.largest_files
        .iter()
        .take(n)
        .map(|&index| {
            let node = tree.node(index);
            LargestFile {
                index,
                path: tree.full_path(index),
                apparent_size: node.apparent_size,
                allocated_size: node.allocated_size,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, NodeKind};
    use compact_str::CompactString;

    #[test]
    fn entries_come_back_largest_first_with_full_paths() {
        let mut tree = FileTree::with_capacity(8);
        let root = tree.add_root(Node::new(
            CompactString::new("/scan"),
            NodeKind::Directory,
        ));

        let mut small = Node::new(CompactString::new("small.txt"), NodeKind::File);
        small.apparent_size = 10;
        let small = tree.add_node(small);
        tree.add_child(root, small);

        let mut big = Node::new(CompactString::new("big.bin"), NodeKind::File);
        big.apparent_size = 4096;
        let big = tree.add_node(big);
        tree.add_child(root, big);

        tree.finalize(10);

        let top = largest_files(&tree, 1);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].apparent_size, 4096);
        assert_eq!(top[0].path, PathBuf::from("/scan/big.bin"));
    }
}
