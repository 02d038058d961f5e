//! Lookup tables for one list.

use sbsync_core::chunk::{Bucket, ChunkRecord, FullHash, Prefix};

use crate::hash_set::{FullHashSet, PrefixSet};

/// The three membership sets of a list.
///
/// A `Lookup` is built privately by a merge and published as a whole.
/// Once published behind an `Arc` it is never mutated again.
#[derive(Debug, Clone, Default)]
pub struct Lookup {
    /// 4-byte prefixes that need full-hash confirmation.
    pub prefixes: PrefixSet,
    /// Full hashes the distributor advertised as matches.
    pub full_hashes: FullHashSet,
    /// Full hashes the distributor retracted. Never re-verify these remotely.
    pub resolved: FullHashSet,
}

impl Lookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains_prefix(&self, prefix: &Prefix) -> bool {
        self.prefixes.contains(prefix)
    }

    pub fn contains_full_hash(&self, hash: &FullHash) -> bool {
        self.full_hashes.contains(hash)
    }

    pub fn is_resolved(&self, hash: &FullHash) -> bool {
        self.resolved.contains(hash)
    }

    /// Apply every entry of a classified record.
    ///
    /// SUB full hashes are both removed from the match set and remembered
    /// as resolved, whether or not they were ever added.
    pub fn apply(&mut self, record: &ChunkRecord, bucket: Bucket) {
        for entry in record.entries(bucket) {
            match bucket {
                Bucket::AddPrefix => {
                    self.prefixes.insert_slice(entry);
                }
                Bucket::SubPrefix => {
                    self.prefixes.remove_slice(entry);
                }
                Bucket::AddFull => {
                    tracing::debug!(hash = hex::encode(entry), "adding full length hash");
                    self.full_hashes.insert_slice(entry);
                }
                Bucket::SubFull => {
                    self.full_hashes.remove_slice(entry);
                    self.resolved.insert_slice(entry);
                }
            }
        }
    }
}
