/// The traversal engine — a bounded worker pool with a join per directory.
///
/// Each directory expansion is one unit of work: enumerate, classify every
/// entry (the stat happens outside any lock), insert all children into the
/// shared arena under a **single write-lock acquisition**, then fan the
/// sub-directories out through the pool. The directory's totals are folded
/// and written at its join, strictly after every child subtree has
/// completed — causal ordering, no guarantee about sibling completion
/// order.
///
/// Cross-worker mutable state is limited to the visited-inode set, the
/// shared counters, the issue list, and the arena (short, batched lock
/// holds). Everything else belongs to one worker chain until it is handed
/// to the parent at the join.
use crate::error::{IssueKind, ScanError, ScanIssue};
use crate::model::{Node, NodeIndex, NodeKind};
use crate::report::{ScanResult, ScanSummary};
use crate::scanner::classify::{self, EntryMeta};
use crate::scanner::dedup::VisitedSet;
use crate::scanner::progress::{self, ScanCounters, ScanProgress};
use crate::scanner::{LiveTree, ScanOptions};

use chrono::Utc;
use compact_str::CompactString;
use crossbeam_channel::Sender;
use globset::{Glob, GlobSet, GlobSetBuilder};
use parking_lot::Mutex;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Cancellation is re-checked after this many entries within one directory,
/// so a single huge directory cannot delay shutdown indefinitely.
const CANCEL_CHECK_STRIDE: usize = 512;

/// Placeholder metadata for entries that could not be statted.
const EMPTY_META: EntryMeta = EntryMeta {
    kind: NodeKind::Other,
    apparent_size: 0,
    allocated_size: 0,
    inode: None,
    nlink: 1,
};

/// Compiled exclude patterns, matched against full paths.
pub struct ExcludeMatcher {
    set: Option<GlobSet>,
}

impl ExcludeMatcher {
    pub fn compile(patterns: &[String]) -> Result<Self, globset::Error> {
        if patterns.is_empty() {
            return Ok(Self { set: None });
        }
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            builder.add(Glob::new(pattern)?);
        }
        Ok(Self {
            set: Some(builder.build()?),
        })
    }

    pub fn matches(&self, path: &Path) -> bool {
        self.set.as_ref().is_some_and(|set| set.is_match(path))
    }
}

/// Ancestor chain of directory identities, used for cycle detection under
/// the follow-symlinks policy. A persistent stack: each worker chain
/// extends it without mutating its parent's view, so sibling units can
/// carry diverging chains concurrently.
struct DirChain {
    id: crate::model::InodeId,
    parent: Option<Arc<DirChain>>,
}

impl DirChain {
    fn push(parent: &Option<Arc<DirChain>>, id: crate::model::InodeId) -> Option<Arc<DirChain>> {
        Some(Arc::new(DirChain {
            id,
            parent: parent.clone(),
        }))
    }

    fn contains(chain: &Option<Arc<DirChain>>, id: crate::model::InodeId) -> bool {
        let mut current = chain.as_deref();
        while let Some(link) = current {
            if link.id == id {
                return true;
            }
            current = link.parent.as_deref();
        }
        false
    }
}

/// Subtree totals handed to the parent at its join.
#[derive(Debug, Default, Clone, Copy)]
struct Totals {
    apparent: u64,
    allocated: u64,
    files: u64,
}

impl Totals {
    fn absorb(self, other: Totals) -> Totals {
        Totals {
            apparent: self.apparent + other.apparent,
            allocated: self.allocated + other.allocated,
            files: self.files + other.files,
        }
    }
}

/// One classified child entry, staged for the batched arena insert.
struct Classified {
    name: CompactString,
    path: PathBuf,
    kind: NodeKind,
    meta: EntryMeta,
    descend: bool,
    boundary: bool,
    duplicate: bool,
    issue: Option<IssueKind>,
}

/// Everything the worker units share. `Sync`; borrowed by every unit.
struct WalkContext {
    opts: ScanOptions,
    excludes: ExcludeMatcher,
    tree: LiveTree,
    visited: VisitedSet,
    counters: Arc<ScanCounters>,
    issues: Mutex<Vec<ScanIssue>>,
    cancel: Arc<AtomicBool>,
    progress_tx: Sender<ScanProgress>,
    tick_tx: Sender<()>,
}

impl WalkContext {
    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Record a non-fatal issue: count it, keep it for the summary, and
    /// surface it on the progress channel (best effort — the summary list
    /// is the authoritative record).
    fn note_issue(&self, issue: ScanIssue) {
        self.counters.record_error();
        let _ = self.progress_tx.try_send(ScanProgress::Issue(issue.clone()));
        self.issues.lock().push(issue);
    }

    /// As `note_issue`, additionally annotating an already-inserted node.
    fn record_issue(&self, node: NodeIndex, issue: ScanIssue) {
        self.tree.write().annotate(node, issue.kind);
        self.note_issue(issue);
    }
}

/// Scan thread body: build the pool, walk every root, assemble the result.
pub(crate) fn run_scan(
    opts: ScanOptions,
    excludes: ExcludeMatcher,
    progress_tx: Sender<ScanProgress>,
    cancel: Arc<AtomicBool>,
    tree: LiveTree,
) -> Result<ScanResult, ScanError> {
    let started_at = Utc::now();
    let start = Instant::now();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.worker_threads())
        .thread_name(|i| format!("duscan-walk-{i}"))
        .build()?;

    let counters = Arc::new(ScanCounters::new());
    let (tick_tx, tick_rx) = crossbeam_channel::bounded::<()>(1);
    let reporter = progress::spawn_reporter(
        counters.clone(),
        progress_tx.clone(),
        tick_rx,
        opts.progress_interval,
    );

    debug!(workers = opts.worker_threads(), "worker pool ready");

    let largest = opts.largest_files;
    let ctx = WalkContext {
        opts,
        excludes,
        tree: tree.clone(),
        visited: VisitedSet::new(),
        counters: counters.clone(),
        issues: Mutex::new(Vec::new()),
        cancel,
        progress_tx: progress_tx.clone(),
        tick_tx,
    };

    let outcome: Result<(), ScanError> = pool.install(|| {
        for root in &ctx.opts.roots {
            walk_root(&ctx, root)?;
        }
        Ok(())
    });

    // Dropping the nudge sender disconnects the reporter.
    let WalkContext {
        issues,
        tick_tx,
        cancel,
        ..
    } = ctx;
    drop(tick_tx);
    let _ = reporter.join();

    if cancel.load(Ordering::Relaxed) {
        // Partial results are discarded, not returned.
        tree.write().clear();
        let _ = progress_tx.try_send(ScanProgress::Cancelled);
        info!("scan cancelled, partial results discarded");
        return Err(ScanError::Cancelled);
    }

    if let Err(err) = outcome {
        tree.write().clear();
        warn!(%err, "scan aborted");
        return Err(err);
    }

    let issues = issues.into_inner();
    let (total_apparent, total_allocated) = {
        let mut tree = tree.write();
        tree.finalize(largest);
        (tree.total_apparent, tree.total_allocated)
    };

    let duration = start.elapsed();
    let summary = ScanSummary {
        files: counters.files(),
        directories: counters.dirs(),
        apparent_bytes: total_apparent,
        allocated_bytes: total_allocated,
        hardlinks_deduped: counters.hardlinks(),
        issues,
        duration,
        started_at,
    };

    info!(
        files = summary.files,
        dirs = summary.directories,
        errors = summary.issues.len(),
        ?duration,
        "scan complete"
    );

    let _ = progress_tx.try_send(ScanProgress::Complete {
        duration,
        error_count: summary.issues.len() as u64,
    });

    Ok(ScanResult { tree, summary })
}

/// Walk one root. A root that cannot be statted is fatal; everything below
/// it degrades gracefully.
fn walk_root(ctx: &WalkContext, root: &Path) -> Result<(), ScanError> {
    if ctx.cancelled() {
        return Ok(());
    }

    // Roots resolve through symlinks, so scanning a link scans its target.
    let meta = match classify::classify_following(root) {
        Ok(meta) => meta,
        Err(_) => {
            return Err(ScanError::RootNotFound {
                path: root.to_path_buf(),
            })
        }
    };

    let root_idx = {
        let mut tree = ctx.tree.write();
        let mut node = Node::new(root_label(root), meta.kind);
        node.inode = meta.inode;
        node.apparent_size = meta.apparent_size;
        node.allocated_size = meta.allocated_size;
        tree.add_root(node)
    };

    if meta.kind.is_dir() {
        ctx.counters
            .record_dir(meta.apparent_size, meta.allocated_size);
        // Roots sit at depth 0; a zero depth limit records them unexpanded.
        if ctx.opts.max_depth.map_or(true, |max| max > 0) {
            let chain = extend_chain(ctx, &None, &meta);
            let totals = walk_directory(
                ctx,
                root_idx,
                root.to_path_buf(),
                meta,
                0,
                meta.inode.map(|id| id.dev),
                &chain,
            );
            ctx.tree
                .write()
                .set_aggregate(root_idx, totals.apparent, totals.allocated, totals.files);
        }
    } else {
        // A root may be a plain file; count it like any other leaf.
        let mut meta = meta;
        let duplicate = dedup_leaf(ctx, &mut meta);
        ctx.counters
            .record_file(meta.apparent_size, meta.allocated_size);
        let mut tree = ctx.tree.write();
        tree.set_aggregate(root_idx, meta.apparent_size, meta.allocated_size, 1);
        if duplicate {
            tree.mark_duplicate(root_idx);
        }
    }

    Ok(())
}

/// One unit of work: expand a single directory whose node is already in
/// the arena, and return the folded subtree totals.
fn walk_directory(
    ctx: &WalkContext,
    dir_idx: NodeIndex,
    dir_path: PathBuf,
    dir_meta: EntryMeta,
    depth: usize,
    root_dev: Option<u64>,
    chain: &Option<Arc<DirChain>>,
) -> Totals {
    // The directory's own metadata overhead is part of its aggregate.
    let mut totals = Totals {
        apparent: dir_meta.apparent_size,
        allocated: dir_meta.allocated_size,
        files: 0,
    };

    if ctx.cancelled() {
        return totals;
    }

    ctx.counters.enter_directory(&dir_path);

    let entries = match fs::read_dir(&dir_path) {
        Ok(entries) => entries,
        Err(err) => {
            ctx.record_issue(dir_idx, ScanIssue::from_io(dir_path, &err));
            return totals;
        }
    };

    let mut children: Vec<Classified> = Vec::new();

    for (i, entry) in entries.enumerate() {
        if i % CANCEL_CHECK_STRIDE == 0 && ctx.cancelled() {
            return totals;
        }

        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                ctx.record_issue(dir_idx, ScanIssue::from_io(dir_path.clone(), &err));
                continue;
            }
        };

        let path = entry.path();
        if ctx.excludes.matches(&path) {
            continue;
        }
        let name = CompactString::new(entry.file_name().to_string_lossy().as_ref());

        let mut meta = match classify::classify(&path) {
            Ok(meta) => meta,
            Err(err) => {
                // The entry vanished or cannot be statted; keep a
                // placeholder node so the degradation stays visible.
                let issue = ScanIssue::from_io(path.clone(), &err);
                let kind = issue.kind;
                ctx.note_issue(issue);
                children.push(Classified {
                    name,
                    path,
                    kind: NodeKind::Other,
                    meta: EMPTY_META,
                    descend: false,
                    boundary: false,
                    duplicate: false,
                    issue: Some(kind),
                });
                continue;
            }
        };

        match meta.kind {
            NodeKind::Directory => {
                let (descend, boundary) = plan_directory(ctx, depth, root_dev, &meta);
                if !descend {
                    totals.apparent += meta.apparent_size;
                    totals.allocated += meta.allocated_size;
                }
                ctx.counters
                    .record_dir(meta.apparent_size, meta.allocated_size);
                children.push(Classified {
                    name,
                    path,
                    kind: NodeKind::Directory,
                    meta,
                    descend,
                    boundary,
                    duplicate: false,
                    issue: None,
                });
            }
            NodeKind::Symlink if ctx.opts.follow_symlinks => match classify::classify_following(&path) {
                Ok(target) if target.kind.is_dir() => match target.inode {
                    Some(id) if DirChain::contains(chain, id) => {
                        ctx.note_issue(ScanIssue::symlink_loop(path.clone()));
                        children.push(Classified {
                            name,
                            path,
                            kind: NodeKind::Symlink,
                            meta: EMPTY_META,
                            descend: false,
                            boundary: false,
                            duplicate: false,
                            issue: Some(IssueKind::SymlinkLoop),
                        });
                    }
                    Some(_) => {
                        let (descend, boundary) = plan_directory(ctx, depth, root_dev, &target);
                        if !descend {
                            totals.apparent += target.apparent_size;
                            totals.allocated += target.allocated_size;
                        }
                        ctx.counters
                            .record_dir(target.apparent_size, target.allocated_size);
                        // Recorded as the directory seen through the link.
                        children.push(Classified {
                            name,
                            path,
                            kind: NodeKind::Directory,
                            meta: target,
                            descend,
                            boundary,
                            duplicate: false,
                            issue: None,
                        });
                    }
                    None => {
                        // No identity to cycle-check against on this
                        // platform; keep the link as a zero-weight leaf.
                        meta.apparent_size = 0;
                        meta.allocated_size = 0;
                        totals.files += 1;
                        ctx.counters.record_file(0, 0);
                        children.push(Classified {
                            name,
                            path,
                            kind: NodeKind::Symlink,
                            meta,
                            descend: false,
                            boundary: false,
                            duplicate: false,
                            issue: None,
                        });
                    }
                },
                Ok(mut target) => {
                    // Link to a file-like target: charge the target's
                    // weight, deduplicated on the target's identity.
                    let duplicate = dedup_leaf(ctx, &mut target);
                    totals.apparent += target.apparent_size;
                    totals.allocated += target.allocated_size;
                    totals.files += 1;
                    ctx.counters
                        .record_file(target.apparent_size, target.allocated_size);
                    children.push(Classified {
                        name,
                        path,
                        kind: NodeKind::Symlink,
                        meta: target,
                        descend: false,
                        boundary: false,
                        duplicate,
                        issue: None,
                    });
                }
                Err(err) => {
                    let issue = ScanIssue::from_io(path.clone(), &err);
                    let kind = issue.kind;
                    ctx.note_issue(issue);
                    children.push(Classified {
                        name,
                        path,
                        kind: NodeKind::Symlink,
                        meta: EMPTY_META,
                        descend: false,
                        boundary: false,
                        duplicate: false,
                        issue: Some(kind),
                    });
                }
            },
            NodeKind::Symlink => {
                // Default policy: a zero-weight leaf reference.
                meta.apparent_size = 0;
                meta.allocated_size = 0;
                totals.files += 1;
                ctx.counters.record_file(0, 0);
                children.push(Classified {
                    name,
                    path,
                    kind: NodeKind::Symlink,
                    meta,
                    descend: false,
                    boundary: false,
                    duplicate: false,
                    issue: None,
                });
            }
            _ => {
                let duplicate = dedup_leaf(ctx, &mut meta);
                totals.apparent += meta.apparent_size;
                totals.allocated += meta.allocated_size;
                totals.files += 1;
                ctx.counters
                    .record_file(meta.apparent_size, meta.allocated_size);
                children.push(Classified {
                    name,
                    path,
                    kind: meta.kind,
                    meta,
                    descend: false,
                    boundary: false,
                    duplicate,
                    issue: None,
                });
            }
        }
    }

    ctx.counters.note_entries(children.len() as u64, &ctx.tick_tx);

    // One write-lock acquisition covers every child of this directory.
    let mut subdirs: Vec<(NodeIndex, PathBuf, EntryMeta)> = Vec::new();
    {
        let mut tree = ctx.tree.write();
        for child in children {
            let mut node = Node::new(child.name, child.kind);
            node.apparent_size = child.meta.apparent_size;
            node.allocated_size = child.meta.allocated_size;
            node.inode = child.meta.inode;
            node.issue = child.issue;
            node.boundary = child.boundary;
            node.duplicate = child.duplicate;
            let idx = tree.add_node(node);
            tree.add_child(dir_idx, idx);
            if child.descend {
                subdirs.push((idx, child.path, child.meta));
            }
        }
    }

    if subdirs.is_empty() {
        return totals;
    }

    // Fan out: sibling directories are independent units; the reduce below
    // is this directory's join.
    let child_totals = subdirs
        .into_par_iter()
        .map(|(idx, path, meta)| {
            let chain = extend_chain(ctx, chain, &meta);
            let sub = walk_directory(ctx, idx, path, meta, depth + 1, root_dev, &chain);
            ctx.tree
                .write()
                .set_aggregate(idx, sub.apparent, sub.allocated, sub.files);
            sub
        })
        .reduce(Totals::default, Totals::absorb);

    totals.absorb(child_totals)
}

/// Decide whether a directory entry is expanded, and whether it marks a
/// filesystem boundary.
fn plan_directory(
    ctx: &WalkContext,
    depth: usize,
    root_dev: Option<u64>,
    meta: &EntryMeta,
) -> (bool, bool) {
    let boundary = ctx.opts.same_filesystem
        && matches!((root_dev, meta.inode), (Some(dev), Some(id)) if id.dev != dev);
    let descend = !boundary && ctx.opts.max_depth.map_or(true, |max| depth + 1 < max);
    (descend, boundary)
}

/// Hard-link dedup at the leaf: the first sighting keeps its weight, later
/// sightings are zeroed. Returns whether this reference lost the race.
///
/// Normally only multi-link entries are tested. Under the follow-symlinks
/// policy every leaf is: a followed link reaches its target with
/// `nlink == 1`, yet the link and the real entry are two references to one
/// object.
fn dedup_leaf(ctx: &WalkContext, meta: &mut EntryMeta) -> bool {
    if meta.nlink <= 1 && !ctx.opts.follow_symlinks {
        return false;
    }
    if let Some(id) = meta.inode {
        if !ctx.visited.first_sighting(id) {
            meta.apparent_size = 0;
            meta.allocated_size = 0;
            ctx.counters.record_hardlink();
            return true;
        }
    }
    false
}

/// Extend the ancestor chain for a directory about to be expanded. Only
/// maintained under the follow-symlinks policy; real directories cannot
/// form cycles on their own.
fn extend_chain(
    ctx: &WalkContext,
    chain: &Option<Arc<DirChain>>,
    meta: &EntryMeta,
) -> Option<Arc<DirChain>> {
    if !ctx.opts.follow_symlinks {
        return None;
    }
    match meta.inode {
        Some(id) => DirChain::push(chain, id),
        None => chain.clone(),
    }
}

/// Scan roots keep the path they were given so full paths can be
/// reconstructed from the tree.
fn root_label(root: &Path) -> CompactString {
    CompactString::new(root.to_string_lossy().as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InodeId;

    #[test]
    fn empty_exclude_list_matches_nothing() {
        let matcher = ExcludeMatcher::compile(&[]).unwrap();
        assert!(!matcher.matches(Path::new("/any/path/at/all")));
    }

    #[test]
    fn exclude_globs_match_full_paths() {
        let patterns = vec!["*.log".to_string(), "**/node_modules".to_string()];
        let matcher = ExcludeMatcher::compile(&patterns).unwrap();
        assert!(matcher.matches(Path::new("/var/log/app.log")));
        assert!(matcher.matches(Path::new("/home/x/project/node_modules")));
        assert!(!matcher.matches(Path::new("/home/x/project/src")));
    }

    #[test]
    fn bad_patterns_fail_to_compile() {
        let patterns = vec!["a{b".to_string()];
        assert!(ExcludeMatcher::compile(&patterns).is_err());
    }

    #[test]
    fn chain_lookup_walks_every_ancestor() {
        let a = InodeId { dev: 1, ino: 10 };
        let b = InodeId { dev: 1, ino: 20 };
        let c = InodeId { dev: 1, ino: 30 };

        let chain = DirChain::push(&None, a);
        let chain = DirChain::push(&chain, b);

        assert!(DirChain::contains(&chain, a));
        assert!(DirChain::contains(&chain, b));
        assert!(!DirChain::contains(&chain, c));
        assert!(!DirChain::contains(&None, a));
    }
}
