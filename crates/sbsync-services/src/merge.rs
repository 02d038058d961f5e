//! Delta merge. Rebuilds a list's chunk log and lookup tables in one pass.
//!
//! Records flow through a single pipeline, first the existing log in on-disk
//! order, then the delta in fetched order:
//!
//!   1. drop records named by a pending deletion
//!   2. classify by (chunk type, entry width); skip anything unrecognized
//!      or carrying a partial trailing entry
//!   3. remember the chunk number as kept
//!   4. copy the record verbatim to the new log
//!   5. apply its entries to the fresh lookup tables
//!
//! Later records win: a SUB after an ADD for the same key removes it, an ADD
//! after a SUB puts it back. Nothing here touches live state. The caller
//! decides whether to publish the outcome.

use std::io::{self, Write};

use serde::Serialize;

use sbsync_core::chunk::{Bucket, ChunkNumbers, ChunkRecord, ChunkType};
use sbsync_core::codec::{CodecError, RecordWriter};

use crate::lookup::Lookup;

/// Per-pass counters. Advisory only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassStats {
    /// Records copied to the new log and applied.
    pub chunks: usize,
    /// Records dropped by a deletion instruction.
    pub deleted: usize,
    /// Records skipped because they did not classify: unrecognized (type,
    /// width) or a partial trailing entry.
    pub anomalous: usize,
    pub add_prefixes: usize,
    pub sub_prefixes: usize,
    pub add_full_hashes: usize,
    pub sub_full_hashes: usize,
}

impl PassStats {
    fn count_entries(&mut self, bucket: Bucket, entries: usize) {
        match bucket {
            Bucket::AddPrefix => self.add_prefixes += entries,
            Bucket::SubPrefix => self.sub_prefixes += entries,
            Bucket::AddFull => self.add_full_hashes += entries,
            Bucket::SubFull => self.sub_full_hashes += entries,
        }
    }
}

/// Summary of one synchronization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Records read back from the persisted log.
    pub existing: PassStats,
    /// Records taken from the fetched delta.
    pub delta: PassStats,
    /// Distinct ADD chunk numbers held after the merge.
    pub add_chunks: usize,
    /// Distinct SUB chunk numbers held after the merge.
    pub sub_chunks: usize,
}

impl SyncReport {
    pub fn added(&self) -> usize {
        self.delta.chunks
    }

    pub fn deleted(&self) -> usize {
        self.existing.deleted + self.delta.deleted
    }

    pub fn anomalous(&self) -> usize {
        self.existing.anomalous + self.delta.anomalous
    }
}

/// Everything a successful merge produces besides the new log itself.
#[derive(Debug)]
pub struct MergeOutcome {
    pub lookup: Lookup,
    pub kept: ChunkNumbers,
    pub report: SyncReport,
}

#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("existing log record {index} unreadable")]
    ExistingLog {
        index: usize,
        #[source]
        source: CodecError,
    },

    #[error("failed to write merged log")]
    Write(#[source] io::Error),
}

struct Merger<'a, W: Write> {
    deletions: &'a ChunkNumbers,
    out: &'a mut RecordWriter<W>,
    lookup: Lookup,
    kept: ChunkNumbers,
}

impl<W: Write> Merger<'_, W> {
    fn process(
        &mut self,
        record: &ChunkRecord,
        stats: &mut PassStats,
        origin: &'static str,
    ) -> Result<(), MergeError> {
        if self.deletions.contains(record.chunk_type, record.number) {
            tracing::trace!(
                origin,
                chunk_type = %record.chunk_type,
                chunk = record.number,
                "dropping deleted chunk"
            );
            stats.deleted += 1;
            return Ok(());
        }

        let bucket = match record.bucket() {
            Ok(bucket) => bucket,
            Err(e) => {
                tracing::warn!(origin, chunk = record.number, error = %e, "skipping anomalous chunk");
                stats.anomalous += 1;
                return Ok(());
            }
        };

        self.kept.insert(record.chunk_type, record.number);
        self.out.write(record).map_err(MergeError::Write)?;
        self.lookup.apply(record, bucket);

        stats.chunks += 1;
        stats.count_entries(bucket, record.hashes.len() / bucket.width());
        Ok(())
    }
}

/// Merge the existing log and a delta into `out`.
///
/// `existing` is consumed lazily, one record at a time. The first read error
/// aborts the merge: an unreadable log means the prior state is unknown.
pub fn merge<E, W>(
    existing: E,
    delta: &[ChunkRecord],
    deletions: &ChunkNumbers,
    out: &mut RecordWriter<W>,
) -> Result<MergeOutcome, MergeError>
where
    E: IntoIterator<Item = Result<ChunkRecord, CodecError>>,
    W: Write,
{
    let mut merger = Merger {
        deletions,
        out,
        lookup: Lookup::new(),
        kept: ChunkNumbers::new(),
    };
    let mut report = SyncReport::default();

    for (index, record) in existing.into_iter().enumerate() {
        let record = record.map_err(|source| MergeError::ExistingLog { index, source })?;
        merger.process(&record, &mut report.existing, "log")?;
    }
    tracing::info!(
        chunks = report.existing.chunks,
        deleted = report.existing.deleted,
        anomalous = report.existing.anomalous,
        add_prefixes = report.existing.add_prefixes,
        sub_prefixes = report.existing.sub_prefixes,
        add_full_hashes = report.existing.add_full_hashes,
        sub_full_hashes = report.existing.sub_full_hashes,
        "loaded existing chunks"
    );

    for record in delta {
        merger.process(record, &mut report.delta, "delta")?;
    }
    tracing::info!(
        chunks = report.delta.chunks,
        deleted = report.delta.deleted,
        anomalous = report.delta.anomalous,
        add_prefixes = report.delta.add_prefixes,
        sub_prefixes = report.delta.sub_prefixes,
        add_full_hashes = report.delta.add_full_hashes,
        sub_full_hashes = report.delta.sub_full_hashes,
        "merged delta chunks"
    );

    report.add_chunks = merger.kept.get(ChunkType::Add).len();
    report.sub_chunks = merger.kept.get(ChunkType::Sub).len();

    Ok(MergeOutcome {
        lookup: merger.lookup,
        kept: merger.kept,
        report,
    })
}
