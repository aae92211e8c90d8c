/// Path classification — stat one filesystem entry and describe it.
///
/// A pure read: one `stat` call per entry, no side effects. The expensive
/// syscall always happens outside any lock; the walker decides what to do
/// with the result (descend, count, dedup, prune).
use crate::model::{InodeId, NodeKind};
use std::fs::{self, Metadata};
use std::io;
use std::path::Path;

/// Everything the walker needs to know about one entry, gathered from a
/// single stat.
#[derive(Debug, Clone, Copy)]
pub struct EntryMeta {
    pub kind: NodeKind,

    /// Logical byte length from metadata.
    pub apparent_size: u64,

    /// Storage actually consumed. On Unix this is `st_blocks` × 512; on
    /// platforms without block accounting it falls back to the apparent
    /// size.
    pub allocated_size: u64,

    /// `(device, inode)` identity, when the platform provides one.
    pub inode: Option<InodeId>,

    /// Hard-link count. Entries with more than one link are candidates for
    /// deduplication (every leaf is, under the follow-symlinks policy).
    pub nlink: u64,
}

/// Stat `path` without following symlinks.
pub fn classify(path: &Path) -> io::Result<EntryMeta> {
    fs::symlink_metadata(path).map(|md| describe(&md))
}

/// Stat `path`, resolving symlinks. Used for scan roots and for the opt-in
/// follow-symlinks policy; a dangling link surfaces as `NotFound`.
pub fn classify_following(path: &Path) -> io::Result<EntryMeta> {
    fs::metadata(path).map(|md| describe(&md))
}

fn describe(md: &Metadata) -> EntryMeta {
    let file_type = md.file_type();
    let kind = if file_type.is_dir() {
        NodeKind::Directory
    } else if file_type.is_file() {
        NodeKind::File
    } else if file_type.is_symlink() {
        NodeKind::Symlink
    } else {
        NodeKind::Other
    };

    EntryMeta {
        kind,
        apparent_size: md.len(),
        allocated_size: allocated_size(md),
        inode: inode_id(md),
        nlink: link_count(md),
    }
}

#[cfg(unix)]
fn allocated_size(md: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    // st_blocks is always in 512-byte units, regardless of the
    // filesystem's block size.
    md.blocks() * 512
}

#[cfg(not(unix))]
fn allocated_size(md: &Metadata) -> u64 {
    md.len()
}

#[cfg(unix)]
fn inode_id(md: &Metadata) -> Option<InodeId> {
    use std::os::unix::fs::MetadataExt;
    Some(InodeId {
        dev: md.dev(),
        ino: md.ino(),
    })
}

#[cfg(not(unix))]
fn inode_id(_md: &Metadata) -> Option<InodeId> {
    None
}

#[cfg(unix)]
fn link_count(md: &Metadata) -> u64 {
    use std::os::unix::fs::MetadataExt;
    md.nlink()
}

#[cfg(not(unix))]
fn link_count(_md: &Metadata) -> u64 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn regular_files_report_kind_and_length() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.bin");
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(&[0u8; 1000]).unwrap();
        drop(f);

        let meta = classify(&path).unwrap();
        assert_eq!(meta.kind, NodeKind::File);
        assert_eq!(meta.apparent_size, 1000);
        assert!(meta.nlink >= 1);
    }

    #[test]
    fn directories_are_classified_as_such() {
        let tmp = TempDir::new().unwrap();
        let meta = classify(tmp.path()).unwrap();
        assert_eq!(meta.kind, NodeKind::Directory);
    }

    #[test]
    fn missing_entries_surface_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = classify(&tmp.path().join("gone")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn symlinks_are_not_followed_by_classify() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("target");
        fs::write(&target, b"abc").unwrap();
        let link = tmp.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert_eq!(classify(&link).unwrap().kind, NodeKind::Symlink);
        assert_eq!(classify_following(&link).unwrap().kind, NodeKind::File);
    }

    #[cfg(unix)]
    #[test]
    fn hard_links_share_identity_and_bump_nlink() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("first");
        fs::write(&first, b"payload").unwrap();
        let second = tmp.path().join("second");
        fs::hard_link(&first, &second).unwrap();

        let a = classify(&first).unwrap();
        let b = classify(&second).unwrap();
        assert_eq!(a.nlink, 2);
        assert_eq!(a.inode, b.inode);
        assert!(a.inode.is_some());
    }
}
