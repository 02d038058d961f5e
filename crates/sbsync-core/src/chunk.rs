//! Chunk records, the unit of distribution for blocklist data.
//!
//! A chunk is a numbered batch of hash entries. ADD chunks advertise entries,
//! SUB chunks retract them. Chunk numbers are unique within a chunk type, not
//! across types: ADD #7 and SUB #7 are unrelated chunks.

use std::collections::BTreeSet;
use std::fmt;
use std::slice::ChunksExact;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Width of a hash prefix entry in bytes.
pub const PREFIX_LEN: usize = 4;

/// Width of a full hash entry in bytes.
pub const FULL_HASH_LEN: usize = 32;

/// Truncated hash used for cheap preliminary matching.
pub type Prefix = [u8; PREFIX_LEN];

/// Complete 32-byte hash used to confirm a prefix match.
pub type FullHash = [u8; FULL_HASH_LEN];

// ── Chunk Type ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ChunkType {
    Add = 0x01,
    Sub = 0x02,
}

impl ChunkType {
    pub const ALL: [ChunkType; 2] = [ChunkType::Add, ChunkType::Sub];
}

impl TryFrom<u8> for ChunkType {
    type Error = ChunkError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(ChunkType::Add),
            0x02 => Ok(ChunkType::Sub),
            other => Err(ChunkError::UnknownChunkType(other)),
        }
    }
}

impl From<ChunkType> for u8 {
    fn from(t: ChunkType) -> u8 {
        t as u8
    }
}

impl fmt::Display for ChunkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkType::Add => f.write_str("add"),
            ChunkType::Sub => f.write_str("sub"),
        }
    }
}

// ── Bucket ────────────────────────────────────────────────────────────────────

/// The four recognized (chunk type, entry width) combinations.
///
/// Every record that reaches the lookup tables goes through exactly one of
/// these. Anything else is reported as [`ChunkError::Unclassified`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    AddPrefix,
    AddFull,
    SubPrefix,
    SubFull,
}

impl Bucket {
    pub fn width(self) -> usize {
        match self {
            Bucket::AddPrefix | Bucket::SubPrefix => PREFIX_LEN,
            Bucket::AddFull | Bucket::SubFull => FULL_HASH_LEN,
        }
    }

    pub fn chunk_type(self) -> ChunkType {
        match self {
            Bucket::AddPrefix | Bucket::AddFull => ChunkType::Add,
            Bucket::SubPrefix | Bucket::SubFull => ChunkType::Sub,
        }
    }
}

// ── Chunk Record ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkRecord {
    pub number: u32,
    pub chunk_type: ChunkType,
    /// Entry width in bytes as carried by the record. Only 4 and 32 are
    /// meaningful; other values survive decoding so they can be reported.
    pub entry_width: u8,
    /// Concatenated fixed-width entries.
    pub hashes: Bytes,
}

impl ChunkRecord {
    pub fn new(chunk_type: ChunkType, number: u32, entry_width: u8, hashes: impl Into<Bytes>) -> Self {
        Self {
            number,
            chunk_type,
            entry_width,
            hashes: hashes.into(),
        }
    }

    /// Classify this record by (chunk type, entry width).
    ///
    /// A hash blob that is not a whole number of entries is rejected, so a
    /// record that classifies can always be written and read back.
    pub fn bucket(&self) -> Result<Bucket, ChunkError> {
        let bucket = match (self.chunk_type, self.entry_width as usize) {
            (ChunkType::Add, PREFIX_LEN) => Bucket::AddPrefix,
            (ChunkType::Add, FULL_HASH_LEN) => Bucket::AddFull,
            (ChunkType::Sub, PREFIX_LEN) => Bucket::SubPrefix,
            (ChunkType::Sub, FULL_HASH_LEN) => Bucket::SubFull,
            (chunk_type, _) => {
                return Err(ChunkError::Unclassified {
                    chunk_type,
                    width: self.entry_width,
                })
            }
        };
        if self.hashes.len() % bucket.width() != 0 {
            return Err(ChunkError::PartialEntry {
                chunk_type: self.chunk_type,
                len: self.hashes.len(),
                width: self.entry_width,
            });
        }
        Ok(bucket)
    }

    /// Iterate the fixed-width entries of a classified record.
    pub fn entries(&self, bucket: Bucket) -> ChunksExact<'_, u8> {
        self.hashes.chunks_exact(bucket.width())
    }
}

// ── Chunk Numbers ─────────────────────────────────────────────────────────────

/// A set of chunk numbers per chunk type.
///
/// Used both for pending deletion instructions and for the chunks retained
/// by a merge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkNumbers {
    add: BTreeSet<u32>,
    sub: BTreeSet<u32>,
}

impl ChunkNumbers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, chunk_type: ChunkType) -> &BTreeSet<u32> {
        match chunk_type {
            ChunkType::Add => &self.add,
            ChunkType::Sub => &self.sub,
        }
    }

    fn get_mut(&mut self, chunk_type: ChunkType) -> &mut BTreeSet<u32> {
        match chunk_type {
            ChunkType::Add => &mut self.add,
            ChunkType::Sub => &mut self.sub,
        }
    }

    /// Returns true if the number was not already present.
    pub fn insert(&mut self, chunk_type: ChunkType, number: u32) -> bool {
        self.get_mut(chunk_type).insert(number)
    }

    pub fn contains(&self, chunk_type: ChunkType, number: u32) -> bool {
        self.get(chunk_type).contains(&number)
    }

    /// Remove every number present in `other`.
    pub fn remove_all(&mut self, other: &ChunkNumbers) {
        for chunk_type in ChunkType::ALL {
            let mine = self.get_mut(chunk_type);
            for number in other.get(chunk_type) {
                mine.remove(number);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.add.len() + self.sub.len()
    }

    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.sub.is_empty()
    }
}

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChunkError {
    #[error("unknown chunk type byte: 0x{0:02x}")]
    UnknownChunkType(u8),

    #[error("unrecognized {chunk_type} chunk with {width}-byte entries")]
    Unclassified { chunk_type: ChunkType, width: u8 },

    #[error("{chunk_type} chunk has {len} hash bytes, not a multiple of entry width {width}")]
    PartialEntry {
        chunk_type: ChunkType,
        len: usize,
        width: u8,
    },
}
