//! Fixed-width hash containers.

use std::collections::HashSet;

use sbsync_core::chunk::{FULL_HASH_LEN, PREFIX_LEN};

/// Set of fixed-width byte keys.
///
/// Keys are stored inline as `[u8; N]`, so a million 4-byte prefixes cost
/// a few megabytes rather than a heap allocation each.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HashStore<const N: usize> {
    keys: HashSet<[u8; N]>,
}

pub type PrefixSet = HashStore<PREFIX_LEN>;
pub type FullHashSet = HashStore<FULL_HASH_LEN>;

impl<const N: usize> HashStore<N> {
    pub fn new() -> Self {
        Self {
            keys: HashSet::new(),
        }
    }

    /// Insert a key. Inserting an existing key is a no-op.
    pub fn insert(&mut self, key: [u8; N]) {
        self.keys.insert(key);
    }

    /// Remove a key. Removing a missing key is a no-op.
    pub fn remove(&mut self, key: &[u8; N]) {
        self.keys.remove(key);
    }

    pub fn contains(&self, key: &[u8; N]) -> bool {
        self.keys.contains(key)
    }

    /// Insert from a slice. Returns false without inserting if the slice
    /// is not exactly `N` bytes.
    pub fn insert_slice(&mut self, key: &[u8]) -> bool {
        match <[u8; N]>::try_from(key) {
            Ok(key) => {
                self.keys.insert(key);
                true
            }
            Err(_) => false,
        }
    }

    /// Remove from a slice. Returns false if the slice is not `N` bytes.
    pub fn remove_slice(&mut self, key: &[u8]) -> bool {
        match <[u8; N]>::try_from(key) {
            Ok(key) => {
                self.keys.remove(&key);
                true
            }
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &[u8; N]> {
        self.keys.iter()
    }
}
