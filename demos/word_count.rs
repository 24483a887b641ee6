//! Word count over a text file (or a built-in paragraph).
//!
//! Each line becomes one input record; the map stage splits lines into
//! lowercase words, the reduce stage sums the counts, and the sorted finisher
//! prints the result in key order.
//!
//! Run with: cargo run --example word_count [-- path/to/file.txt]
//! Tune with `KVFLOW_MAP_WORKERS`, `KVFLOW_REDUCE_WORKERS`, `KVFLOW_CHANNEL_CAPACITY`
//! and `RUST_LOG`.

use anyhow::{Context, Result};
use kvflow::metrics::PipelineMetrics;
use kvflow::*;
use regex::Regex;
use std::fs;
use tracing_subscriber::EnvFilter;

const FALLBACK_TEXT: &str = "\
It was the best of times, it was the worst of times,
it was the age of wisdom, it was the age of foolishness,
it was the epoch of belief, it was the epoch of incredulity,
it was the season of Light, it was the season of Darkness";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let text = match std::env::args().nth(1) {
        Some(path) => fs::read_to_string(&path).with_context(|| format!("reading {path}"))?,
        None => FALLBACK_TEXT.to_string(),
    };
    let lines: Vec<_> = text
        .lines()
        .enumerate()
        .map(|(n, line)| Record::new(format!("line-{n}"), line.to_string()))
        .collect();

    let word_re = Regex::new(r"[A-Za-z0-9_']+")?;
    let split = move |record: Record<String>, out: &RecordSender<u64>| -> Result<()> {
        for word in word_re.find_iter(record.value()) {
            out.emit(word.as_str().to_lowercase(), 1)?;
        }
        Ok(())
    };

    let metrics = PipelineMetrics::new();
    let runner = Runner::from_env()?.with_metrics(metrics.clone());
    let counts = runner.sorted_map_reduce(stream_from_iter(lines, 64)?, split, sum_values(), by_key)?;

    for record in counts {
        println!("{record}");
    }
    metrics.print();
    Ok(())
}
