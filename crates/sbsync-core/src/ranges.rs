//! Chunk range summaries.
//!
//! The update request tells the distributor which chunks are already held
//! as a compact list of runs: `1-3,5,7-9`.

/// Encode a set of chunk numbers as comma-joined ascending runs.
///
/// Input order and duplicates do not matter. An empty set encodes to `""`.
pub fn encode_ranges<I>(numbers: I) -> String
where
    I: IntoIterator<Item = u32>,
{
    let mut sorted: Vec<u32> = numbers.into_iter().collect();
    sorted.sort_unstable();
    sorted.dedup();

    let mut out = String::new();
    let mut iter = sorted.into_iter();
    let Some(first) = iter.next() else {
        return out;
    };

    let (mut start, mut end) = (first, first);
    for n in iter {
        if end.checked_add(1) == Some(n) {
            end = n;
            continue;
        }
        push_run(&mut out, start, end);
        start = n;
        end = n;
    }
    push_run(&mut out, start, end);
    out
}

fn push_run(out: &mut String, start: u32, end: u32) {
    if !out.is_empty() {
        out.push(',');
    }
    if start == end {
        out.push_str(&start.to_string());
    } else {
        out.push_str(&format!("{start}-{end}"));
    }
}
