//! Canned datasets and transforms for tests and demos.

use crate::record::Record;
use crate::stream::RecordSender;
use anyhow::Result;

/// Six unit counts over keys `a` (x3), `b` (x2) and `c` (x1).
///
/// Summing per key gives `a = 3`, `b = 2`, `c = 1`.
#[must_use]
pub fn sample_counts() -> Vec<Record<u64>> {
    ["a", "b", "a", "c", "b", "a"]
        .into_iter()
        .map(|k| Record::new(k, 1))
        .collect()
}

/// A few lines of text keyed by line number.
#[must_use]
pub fn sample_lines() -> Vec<Record<String>> {
    [
        "the quick brown fox",
        "jumps over the lazy dog",
        "the dog sleeps",
        "",
        "a fox and a dog",
    ]
    .into_iter()
    .enumerate()
    .map(|(i, line)| Record::new(format!("line-{i}"), line.to_string()))
    .collect()
}

/// Map transform emitting `(word, 1)` for each whitespace-separated word of the value.
pub fn split_words(record: Record<String>, out: &RecordSender<u64>) -> Result<()> {
    for word in record.value().split_whitespace() {
        out.emit(word.to_lowercase(), 1)?;
    }
    Ok(())
}
