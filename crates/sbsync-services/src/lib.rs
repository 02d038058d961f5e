//! sbsync-services: blocklist state, merging, and persistence.

pub mod error;
pub mod hash_set;
pub mod list;
pub mod log_store;
pub mod lookup;
pub mod merge;
pub mod source;
pub mod update;
pub mod verify_cache;

pub use error::SyncError;
pub use hash_set::{FullHashSet, HashStore, PrefixSet};
pub use list::{ChunkRanges, ListStats, SafeList};
pub use lookup::Lookup;
pub use merge::{MergeError, MergeOutcome, PassStats, SyncReport};
pub use source::{ChunkDecoder, Fetcher, FileFetcher, FramedDecoder};
pub use verify_cache::{CachedVerdict, VerificationCache};
