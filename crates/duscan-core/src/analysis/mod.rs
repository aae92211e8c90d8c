/// Post-scan analysis — queries over the finalized tree.
pub mod top_files;

pub use top_files::{largest_files, LargestFile};
