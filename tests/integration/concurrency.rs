use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;

use sbsync_services::Lookup;

use crate::*;

// ══════════════════════════════════════════════════════════════════════════════
//  Concurrent merges and readers
// ══════════════════════════════════════════════════════════════════════════════

const WRITERS: u8 = 8;
const ROUNDS: u8 = 3;
const SEED_ENTRIES: u32 = 4000;

fn pair(writer: u8, round: u8) -> [u8; 8] {
    [b'w', writer, round, b'a', b'w', writer, round, b'b']
}

fn chunk_number(writer: u8, round: u8) -> u32 {
    2 + u32::from(writer) * u32::from(ROUNDS) + u32::from(round)
}

/// Checks one published snapshot. Both prefixes of a writer's chunk are
/// present or neither is. Returns how many chunks it holds.
fn committed_chunks(lookup: &Lookup) -> Result<usize, String> {
    if !lookup.contains_prefix(&0u32.to_be_bytes()) {
        return Err("seed chunk missing".to_string());
    }
    let mut held = 0;
    for writer in 0..WRITERS {
        for round in 0..ROUNDS {
            let p = pair(writer, round);
            let a = lookup.contains_prefix(&[p[0], p[1], p[2], p[3]]);
            let b = lookup.contains_prefix(&[p[4], p[5], p[6], p[7]]);
            if a != b {
                return Err(format!("torn chunk from writer {writer} round {round}"));
            }
            held += usize::from(a);
        }
    }
    let expected = SEED_ENTRIES as usize + 2 * held;
    if lookup.prefixes.len() != expected {
        return Err(format!("{} prefixes, expected {expected}", lookup.prefixes.len()));
    }
    Ok(held)
}

/// Merges from several threads are serialized, so none of them loses
/// another's chunk. Readers polling meanwhile only ever see whole commits.
#[test]
fn test_concurrent_merges_serialize_and_readers_see_whole_states() -> Result<()> {
    let scratch = Scratch::new("concurrent")?;
    let list = Arc::new(scratch.open()?);
    let seed: Vec<u8> = (0..SEED_ENTRIES).flat_map(|i| i.to_be_bytes()).collect();
    list.synchronize(&[add(1, 4, &seed)])?;

    let done = Arc::new(AtomicBool::new(false));
    let reader = {
        let list = list.clone();
        let done = done.clone();
        thread::spawn(move || -> Result<usize, String> {
            let mut last = 0;
            let mut polls = 0;
            loop {
                let finished = done.load(Ordering::Acquire);
                let held = committed_chunks(&list.lookup())?;
                if held < last {
                    return Err(format!("went back from {last} to {held} chunks"));
                }
                last = held;
                polls += 1;
                if finished {
                    return Ok(polls);
                }
            }
        })
    };

    let writers: Vec<_> = (0..WRITERS)
        .map(|writer| {
            let list = list.clone();
            thread::spawn(move || -> Result<()> {
                for round in 0..ROUNDS {
                    list.synchronize(&[add(chunk_number(writer, round), 4, &pair(writer, round))])?;
                }
                Ok(())
            })
        })
        .collect();
    for handle in writers {
        handle
            .join()
            .map_err(|_| anyhow::anyhow!("writer thread panicked"))??;
    }
    done.store(true, Ordering::Release);

    let polls = reader
        .join()
        .map_err(|_| anyhow::anyhow!("reader thread panicked"))?
        .map_err(anyhow::Error::msg)?;
    assert!(polls > 0);

    let total = usize::from(WRITERS) * usize::from(ROUNDS);
    assert_eq!(committed_chunks(&list.lookup()).map_err(anyhow::Error::msg)?, total);
    assert_eq!(read_log(&scratch.log_path())?.len(), total + 1);
    assert_eq!(list.chunk_ranges().add, format!("1-{}", total + 1));
    assert_eq!(list.chunk_ranges().sub, "");

    let reopened = scratch.open()?;
    assert_eq!(committed_chunks(&reopened.lookup()).map_err(anyhow::Error::msg)?, total);
    Ok(())
}
