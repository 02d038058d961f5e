//! sbsync-core: shared types, the chunk record format, and configuration.
//! All other sbsync crates depend on this one.

pub mod chunk;
pub mod codec;
pub mod config;
pub mod ranges;

pub use chunk::{Bucket, ChunkError, ChunkNumbers, ChunkRecord, ChunkType, FullHash, Prefix};
pub use codec::{CodecError, RecordReader, RecordWriter};
pub use ranges::encode_ranges;
