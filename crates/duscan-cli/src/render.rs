/// Human-readable rendering of a finished scan.
///
/// Pure string building so the output is unit-testable; `run` decides what
/// goes to stdout.
use duscan_core::analysis;
use duscan_core::model::{format_count, format_size, SizeMode};
use duscan_core::{Node, ScanResult};
use std::fmt::Write;

/// Render the report: per-root header, first-level breakdown sorted by
/// size, optional largest-files listing, and a summary line.
pub fn human(result: &ScanResult, mode: SizeMode, top: usize) -> String {
    let tree = result.tree.read();
    let summary = &result.summary;
    let mut out = String::new();

    for &root in &tree.roots {
        let node = tree.node(root);
        let root_size = node.size_for(mode);
        let _ = writeln!(out, "{}  {}", format_size(root_size), node.name);

        for child in tree.children_sorted(root, mode) {
            let child = tree.node(child);
            let _ = writeln!(
                out,
                "  {:>10}  {:>5.1}%  {}{}",
                format_size(child.size_for(mode)),
                percent_of(child.size_for(mode), root_size),
                child.name,
                marker(child)
            );
        }
    }

    if top > 0 {
        let _ = writeln!(out, "\nLargest files:");
        for file in analysis::largest_files(&tree, top) {
            let size = match mode {
                SizeMode::Apparent => file.apparent_size,
                SizeMode::Allocated => file.allocated_size,
            };
            let _ = writeln!(out, "  {:>10}  {}", format_size(size), file.path.display());
        }
    }

    let _ = writeln!(
        out,
        "\n{} files, {} directories, {} apparent, {} on disk in {:.2?}",
        format_count(summary.files),
        format_count(summary.directories),
        format_size(summary.apparent_bytes),
        format_size(summary.allocated_bytes),
        summary.duration
    );
    if summary.hardlinks_deduped > 0 {
        let _ = writeln!(
            out,
            "{} hard-link references counted once",
            format_count(summary.hardlinks_deduped)
        );
    }

    out
}

/// Share of the parent's total under the active size mode, so the size and
/// percent columns always agree (the tree's cached percent is
/// apparent-based).
fn percent_of(size: u64, parent: u64) -> f64 {
    if parent > 0 {
        size as f64 / parent as f64 * 100.0
    } else {
        0.0
    }
}

/// Suffix flagging the states a reader would otherwise miss.
fn marker(node: &Node) -> &'static str {
    if node.issue.is_some() {
        " [unreadable]"
    } else if node.boundary {
        " [mount point]"
    } else if node.duplicate {
        " [hard link]"
    } else if node.kind.is_dir() {
        "/"
    } else {
        ""
    }
}
