/// Hard-link deduplication state shared by every worker.
///
/// The set of `(device, inode)` pairs already counted in this scan. This is
/// the one piece of cross-worker mutable state on the hot path, so it is
/// sharded: each identity hashes to one of a fixed number of
/// independently-locked sets, and workers touching different shards never
/// contend.
use crate::model::InodeId;
use parking_lot::Mutex;
use std::collections::HashSet;

const SHARDS: usize = 16;

pub struct VisitedSet {
    shards: [Mutex<HashSet<InodeId>>; SHARDS],
}

impl VisitedSet {
    pub fn new() -> Self {
        Self {
            shards: std::array::from_fn(|_| Mutex::new(HashSet::new())),
        }
    }

    /// Atomic check-and-set for one identity.
    ///
    /// Returns `true` when `id` was not yet present — the caller wins and
    /// must count the object. A `false` return means another reference
    /// already claimed the weight; the caller records a zero-weight
    /// duplicate. When several workers race on the same identity, exactly
    /// one of them wins.
    pub fn first_sighting(&self, id: InodeId) -> bool {
        let shard = (id.ino ^ id.dev) as usize % SHARDS;
        self.shards[shard].lock().insert(id)
    }
}

impl Default for VisitedSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(dev: u64, ino: u64) -> InodeId {
        InodeId { dev, ino }
    }

    #[test]
    fn second_sighting_loses() {
        let set = VisitedSet::new();
        assert!(set.first_sighting(id(1, 42)));
        assert!(!set.first_sighting(id(1, 42)));
    }

    #[test]
    fn identities_differ_by_device_as_well_as_inode() {
        let set = VisitedSet::new();
        assert!(set.first_sighting(id(1, 42)));
        assert!(set.first_sighting(id(2, 42)));
    }

    #[test]
    fn concurrent_racers_produce_exactly_one_winner() {
        let set = VisitedSet::new();
        let winners = std::sync::atomic::AtomicU64::new(0);

        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    if set.first_sighting(id(7, 7)) {
                        winners.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    }
                });
            }
        });

        assert_eq!(winners.load(std::sync::atomic::Ordering::Relaxed), 1);
    }
}
