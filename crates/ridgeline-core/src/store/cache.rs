use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use crate::mmr::Accumulator;
use crate::types::Digest;

/// Default number of decoded snapshots kept in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 64;

/// In-memory cache of decoded snapshots, keyed by snapshot digest.
pub trait SnapshotCache: Send + Sync {
    fn get(&self, key: &Digest) -> Option<Accumulator>;

    fn insert(&self, key: Digest, accumulator: Accumulator);

    fn remove(&self, key: &Digest);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Least-recently-used cache with a fixed capacity.
pub struct LruSnapshotCache {
    entries: Mutex<LruCache<Digest, Accumulator>>,
}

impl LruSnapshotCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }
}

impl Default for LruSnapshotCache {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }
}

impl SnapshotCache for LruSnapshotCache {
    fn get(&self, key: &Digest) -> Option<Accumulator> {
        self.entries.lock().get(key).cloned()
    }

    fn insert(&self, key: Digest, accumulator: Accumulator) {
        self.entries.lock().put(key, accumulator);
    }

    fn remove(&self, key: &Digest) {
        self.entries.lock().pop(key);
    }

    fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

/// Caches nothing; every load decodes from the stored bytes.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSnapshotCache;

impl SnapshotCache for NoopSnapshotCache {
    fn get(&self, _key: &Digest) -> Option<Accumulator> {
        None
    }

    fn insert(&self, _key: Digest, _accumulator: Accumulator) {}

    fn remove(&self, _key: &Digest) {}

    fn len(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Weight;

    fn acc(count: u64) -> Accumulator {
        let mut acc = Accumulator::new();
        for i in 0..count {
            acc.append(Digest::from([i as u8; 32]), Weight::from(i + 1));
        }
        acc
    }

    #[test]
    fn test_lru_evicts_least_recent() {
        let cache = LruSnapshotCache::new(NonZeroUsize::new(2).unwrap());
        let (a, b, c) = (Digest::from([1; 32]), Digest::from([2; 32]), Digest::from([3; 32]));
        cache.insert(a, acc(1));
        cache.insert(b, acc(2));
        // Touch `a` so `b` becomes the eviction candidate.
        assert_eq!(cache.get(&a), Some(acc(1)));
        cache.insert(c, acc(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&b).is_none());
        assert_eq!(cache.get(&c).map(|acc| acc.leaf_count()), Some(3));

        cache.remove(&a);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_noop_cache_stays_empty() {
        let cache = NoopSnapshotCache;
        cache.insert(Digest::ZERO, acc(4));
        assert!(cache.get(&Digest::ZERO).is_none());
        assert!(cache.is_empty());
    }
}
