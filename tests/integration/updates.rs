use sbsync_services::{FileFetcher, FramedDecoder, SyncError};

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Update cycle: sources on disk through FileFetcher and FramedDecoder
// ══════════════════════════════════════════════════════════════════════════════

/// Queued sources are fetched, merged in queue order, and retired.
#[test]
fn test_update_applies_sources_in_order() -> Result<()> {
    let scratch = Scratch::new("update")?;
    scratch.write_source("delta-1.bin", &[add(1, 4, b"abcdefgh")])?;
    scratch.write_source("delta-2.bin", &[sub(1, 4, b"efgh"), add(2, 4, b"ijkl")])?;
    let fetcher = FileFetcher::new(scratch.incoming());
    let list = scratch.open()?;

    list.queue_source("delta-1.bin");
    list.queue_source("file://delta-2.bin");
    let report = list
        .update(&fetcher, &FramedDecoder)?
        .context("sources were pending")?;

    assert_eq!(report.added(), 3);
    assert!(list.contains_prefix(b"abcd"));
    assert!(!list.contains_prefix(b"efgh"));
    assert!(list.contains_prefix(b"ijkl"));
    assert_eq!(list.chunk_ranges().add, "1-2");
    assert_eq!(list.chunk_ranges().sub, "1");
    assert!(list.pending_sources().is_empty());

    assert!(list.update(&fetcher, &FramedDecoder)?.is_none());
    Ok(())
}

/// A missing source aborts the cycle before anything is merged; once it
/// appears the next cycle applies everything.
#[test]
fn test_update_retries_after_missing_source() -> Result<()> {
    let scratch = Scratch::new("update-retry")?;
    scratch.write_source("delta-1.bin", &[add(1, 4, b"abcd")])?;
    let fetcher = FileFetcher::new(scratch.incoming());
    let list = scratch.open()?;

    list.queue_source("delta-1.bin");
    list.queue_source("delta-2.bin");
    let err = list.update(&fetcher, &FramedDecoder).unwrap_err();

    assert!(matches!(err, SyncError::Transport { ref location, .. } if location == "delta-2.bin"));
    assert_eq!(list.pending_sources().len(), 2);
    assert!(!list.contains_prefix(b"abcd"));
    assert!(!scratch.log_path().exists());

    scratch.write_source("delta-2.bin", &[add(2, 4, b"wxyz")])?;
    list.update(&fetcher, &FramedDecoder)?;

    assert!(list.contains_prefix(b"abcd"));
    assert!(list.contains_prefix(b"wxyz"));
    assert!(list.pending_sources().is_empty());
    Ok(())
}

/// A source with a bad checksum is a decode failure and stays queued.
#[test]
fn test_update_rejects_corrupt_source() -> Result<()> {
    let scratch = Scratch::new("update-corrupt")?;
    scratch.write_source("delta-1.bin", &[add(1, 4, b"abcd")])?;
    let path = scratch.incoming().join("delta-1.bin");
    let mut bytes = std::fs::read(&path)?;
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    std::fs::write(&path, bytes)?;

    let list = scratch.open()?;
    list.queue_source("delta-1.bin");
    let err = list
        .update(&FileFetcher::new(scratch.incoming()), &FramedDecoder)
        .unwrap_err();

    assert!(matches!(err, SyncError::Decode(_)), "unexpected error: {err}");
    assert_eq!(list.pending_sources(), vec!["delta-1.bin".to_string()]);
    assert!(!list.contains_prefix(b"abcd"));
    Ok(())
}

/// Deletions requested alongside an update are applied in the same cycle.
#[test]
fn test_update_applies_pending_deletions() -> Result<()> {
    let scratch = Scratch::new("update-deletions")?;
    let list = scratch.open()?;
    list.synchronize(&[add(1, 4, b"abcd"), add(2, 4, b"efgh")])?;
    scratch.write_source("delta-3.bin", &[add(3, 4, b"ijkl")])?;

    list.request_deletion(ChunkType::Add, 1);
    list.queue_source("delta-3.bin");
    list.update(&FileFetcher::new(scratch.incoming()), &FramedDecoder)?;

    assert!(!list.contains_prefix(b"abcd"));
    assert!(list.contains_prefix(b"efgh"));
    assert!(list.contains_prefix(b"ijkl"));
    assert_eq!(list.chunk_ranges().add, "2-3");
    assert_eq!(read_log(&scratch.log_path())?.len(), 2);
    Ok(())
}
