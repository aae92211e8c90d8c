/// Data model for the duscan scan tree.
///
/// Re-exports the arena-allocated tree structure and supporting types.
pub mod node;
pub mod size;
pub mod tree;

pub use node::{InodeId, Node, NodeIndex, NodeKind};
pub use size::{format_count, format_size, SizeMode};
pub use tree::FileTree;
