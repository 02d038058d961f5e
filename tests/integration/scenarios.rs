use sbsync_core::chunk::ChunkType;

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Merge scenarios
// ══════════════════════════════════════════════════════════════════════════════

/// Empty list plus one ADD prefix chunk: two prefixes, one persisted record.
#[test]
fn test_first_add_chunk_populates_empty_list() -> Result<()> {
    let scratch = Scratch::new("first-add")?;
    let list = scratch.open()?;

    let report = list.synchronize(&[add(1, 4, b"abcdefgh")])?;

    assert_eq!(report.added(), 1);
    let lookup = list.lookup();
    assert_eq!(lookup.prefixes.len(), 2);
    assert!(lookup.contains_prefix(b"abcd"));
    assert!(lookup.contains_prefix(b"efgh"));
    assert_eq!(read_log(&scratch.log_path())?, vec![add(1, 4, b"abcdefgh")]);
    assert_eq!(list.chunk_ranges().get(ChunkType::Add), "1");
    assert_eq!(list.chunk_ranges().get(ChunkType::Sub), "");
    Ok(())
}

/// A persisted chunk named in a deletion instruction is dropped by an
/// otherwise empty merge.
#[test]
fn test_deletion_with_empty_delta_drops_persisted_chunk() -> Result<()> {
    let scratch = Scratch::new("delete")?;
    scratch.open()?.synchronize(&[add(1, 4, b"abcdefgh")])?;

    let list = scratch.open()?;
    assert!(list.contains_prefix(b"abcd"));
    list.request_deletion(ChunkType::Add, 1);
    let report = list.synchronize(&[])?;

    assert_eq!(report.deleted(), 1);
    assert!(read_log(&scratch.log_path())?.is_empty());
    assert!(list.lookup().prefixes.is_empty());
    assert_eq!(list.chunk_ranges().add, "");
    assert!(list.pending_deletions().is_empty());
    Ok(())
}

/// Re-merging with nothing new must not change the log or the tables.
#[test]
fn test_empty_merge_is_idempotent() -> Result<()> {
    let scratch = Scratch::new("idempotent")?;
    let list = scratch.open()?;
    list.synchronize(&[
        add(1, 4, b"abcdefgh"),
        add(2, 32, &[0x11; 32]),
        sub(1, 4, b"abcd"),
    ])?;
    let bytes_before = std::fs::read(scratch.log_path())?;
    let lookup_before = list.lookup();

    list.synchronize(&[])?;
    list.synchronize(&[])?;

    assert_eq!(std::fs::read(scratch.log_path())?, bytes_before);
    let lookup_after = list.lookup();
    assert_eq!(lookup_after.prefixes, lookup_before.prefixes);
    assert_eq!(lookup_after.full_hashes, lookup_before.full_hashes);
    assert_eq!(lookup_after.resolved, lookup_before.resolved);
    Ok(())
}

/// SUB of a full hash removes it from the full-hash set and marks it
/// resolved, whether or not it was ever added.
#[test]
fn test_sub_full_hash_resolves() -> Result<()> {
    let scratch = Scratch::new("sub-full")?;
    let list = scratch.open()?;
    let advertised = [0xa5u8; 32];
    let never_added = [0x5au8; 32];

    list.synchronize(&[add(1, 32, &advertised)])?;
    assert!(list.contains_full_hash(&advertised));

    list.synchronize(&[sub(1, 32, &advertised), sub(2, 32, &never_added)])?;

    assert!(!list.contains_full_hash(&advertised));
    assert!(list.is_resolved(&advertised));
    assert!(list.is_resolved(&never_added));
    assert!(!list.contains_full_hash(&never_added));
    assert_eq!(list.chunk_ranges().sub, "1-2");
    Ok(())
}

/// Membership follows record order: the last ADD or SUB touching a prefix wins.
#[test]
fn test_membership_follows_record_order() -> Result<()> {
    let scratch = Scratch::new("order")?;
    let list = scratch.open()?;

    list.synchronize(&[add(1, 4, b"abcd"), sub(1, 4, b"abcd"), add(2, 4, b"abcd")])?;
    assert!(list.contains_prefix(b"abcd"));

    list.synchronize(&[sub(2, 4, b"abcd")])?;
    assert!(!list.contains_prefix(b"abcd"));

    // Persisted order is replayed on reopen.
    let reopened = scratch.open()?;
    assert!(!reopened.contains_prefix(b"abcd"));
    assert_eq!(reopened.chunk_ranges().add, "1-2");
    assert_eq!(reopened.chunk_ranges().sub, "1-2");
    Ok(())
}

/// Unrecognized entry widths are skipped but the rest of the merge proceeds.
#[test]
fn test_anomalous_chunk_is_skipped() -> Result<()> {
    let scratch = Scratch::new("anomalous")?;
    let list = scratch.open()?;

    let report = list.synchronize(&[add(1, 4, b"abcd"), add(2, 8, b"12345678")])?;

    assert_eq!(report.anomalous(), 1);
    assert!(list.contains_prefix(b"abcd"));
    assert_eq!(list.chunk_ranges().add, "1");
    assert_eq!(read_log(&scratch.log_path())?.len(), 1);
    Ok(())
}

/// Deleting a chunk the list never held is a no-op.
#[test]
fn test_deleting_unknown_chunk_is_noop() -> Result<()> {
    let scratch = Scratch::new("delete-unknown")?;
    let list = scratch.open()?;
    list.synchronize(&[add(1, 4, b"abcd")])?;

    list.request_deletion(ChunkType::Add, 42);
    list.request_deletion(ChunkType::Sub, 1);
    let report = list.synchronize(&[])?;

    assert_eq!(report.deleted(), 0);
    assert!(list.contains_prefix(b"abcd"));
    assert!(list.pending_deletions().is_empty());
    Ok(())
}

/// A hash blob with a partial trailing entry is skipped, and the committed
/// log stays readable by later merges and by a reopen.
#[test]
fn test_partial_entry_chunk_keeps_log_readable() -> Result<()> {
    let scratch = Scratch::new("partial-entry")?;
    let list = scratch.open()?;

    let report = list.synchronize(&[add(1, 4, b"abcdefgh"), add(2, 4, b"abcde")])?;

    assert_eq!(report.added(), 1);
    assert_eq!(report.anomalous(), 1);
    assert_eq!(list.chunk_ranges().add, "1");
    assert_eq!(read_log(&scratch.log_path())?, vec![add(1, 4, b"abcdefgh")]);

    list.synchronize(&[])?;
    let reopened = scratch.open()?;
    assert!(reopened.contains_prefix(b"abcd"));
    assert!(reopened.contains_prefix(b"efgh"));
    assert_eq!(reopened.chunk_ranges().add, "1");
    Ok(())
}
