use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

use super::cache::{LruSnapshotCache, SnapshotCache};
use crate::codec::{decode_snapshot, encode_snapshot, CodecError};
use crate::mmr::Accumulator;
use crate::types::{keccak256, Digest};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("No snapshot stored under {0}")]
    NotFound(Digest),

    #[error("Stored bytes hash to {computed}, not to their key {key}")]
    KeyMismatch { key: Digest, computed: Digest },

    #[error("Snapshot could not be decoded: {0}")]
    Codec(#[from] CodecError),
}

/// Snapshot bytes keyed by `keccak256` of the encoding, so equal
/// accumulators share one entry and a key commits to its content.
pub struct SnapshotStore<C = LruSnapshotCache> {
    blobs: RwLock<HashMap<Digest, Vec<u8>>>,
    cache: C,
}

impl Default for SnapshotStore<LruSnapshotCache> {
    fn default() -> Self {
        Self::new(LruSnapshotCache::default())
    }
}

impl<C: SnapshotCache> SnapshotStore<C> {
    pub fn new(cache: C) -> Self {
        Self {
            blobs: RwLock::new(HashMap::new()),
            cache,
        }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    pub fn contains(&self, key: &Digest) -> bool {
        self.blobs.read().contains_key(key)
    }

    /// Persist `accumulator` and return its key.
    pub fn save(&self, accumulator: &Accumulator) -> Digest {
        let bytes = encode_snapshot(accumulator);
        let key = Digest::from(keccak256(&bytes));
        debug!(
            %key,
            leaf_count = accumulator.leaf_count(),
            bytes = bytes.len(),
            "saved accumulator snapshot"
        );
        self.blobs.write().insert(key, bytes);
        self.cache.insert(key, accumulator.clone());
        key
    }

    /// Accept snapshot bytes from elsewhere. They are decoded and validated
    /// before being stored.
    pub fn import(&self, bytes: Vec<u8>) -> Result<Digest, StoreError> {
        let accumulator = decode_snapshot(&bytes)?;
        let key = Digest::from(keccak256(&bytes));
        self.blobs.write().insert(key, bytes);
        self.cache.insert(key, accumulator);
        Ok(key)
    }

    /// Raw encoded bytes of a stored snapshot.
    pub fn export(&self, key: &Digest) -> Option<Vec<u8>> {
        self.blobs.read().get(key).cloned()
    }

    pub fn load(&self, key: &Digest) -> Result<Accumulator, StoreError> {
        if let Some(accumulator) = self.cache.get(key) {
            return Ok(accumulator);
        }

        let accumulator = {
            let blobs = self.blobs.read();
            let bytes = blobs.get(key).ok_or(StoreError::NotFound(*key))?;
            let computed = Digest::from(keccak256(bytes));
            if computed != *key {
                warn!(%key, %computed, "stored snapshot does not match its key");
                return Err(StoreError::KeyMismatch {
                    key: *key,
                    computed,
                });
            }
            decode_snapshot(bytes)?
        };
        debug!(%key, leaf_count = accumulator.leaf_count(), "decoded accumulator snapshot");
        self.cache.insert(*key, accumulator.clone());
        Ok(accumulator)
    }

    pub fn remove(&self, key: &Digest) -> bool {
        self.cache.remove(key);
        self.blobs.write().remove(key).is_some()
    }
}
