//! Run statistics for a map/reduce pipeline.
//!
//! Attach a [`PipelineMetrics`] to a [`Runner`](crate::Runner) and it is filled in
//! while the pipeline runs:
//!
//! - records read from the input stream (by the map dispatcher),
//! - records routed to each reduce partition (by the reduce dispatcher),
//! - records emitted on the final output stream,
//! - wall-clock time from start until the output stream closed.
//!
//! # Example
//!
//! ```no_run
//! use kvflow::*;
//! use kvflow::metrics::PipelineMetrics;
//!
//! # fn main() -> anyhow::Result<()> {
//! let metrics = PipelineMetrics::new();
//! let runner = Runner::default().with_metrics(metrics.clone());
//!
//! let input = from_vec(vec![Record::new("a", 1u64), Record::new("b", 2)])?;
//! let out = runner.map_reduce(input, identity(), sum_values())?;
//! let _ = out.collect_checked()?;
//!
//! metrics.print();
//! metrics.save_to_file("metrics.json")?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Shared, thread-safe counters for one pipeline run. Cloning shares the counters.
#[derive(Clone, Debug, Default)]
pub struct PipelineMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    records_in: AtomicU64,
    records_out: Arc<AtomicU64>,
    partitions: Mutex<Vec<u64>>,
    window: Mutex<(Option<Instant>, Option<Instant>)>,
}

/// Point-in-time copy of the counters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub records_in: u64,
    pub intermediate_records: u64,
    pub records_out: u64,
    pub partition_counts: Vec<u64>,
    pub elapsed_ms: Option<u64>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl PipelineMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_start(&self) {
        *lock(&self.inner.window) = (Some(Instant::now()), None);
    }

    pub(crate) fn record_end(&self) {
        lock(&self.inner.window).1 = Some(Instant::now());
    }

    pub(crate) fn add_records_in(&self, n: u64) {
        self.inner.records_in.fetch_add(n, Ordering::Relaxed);
    }

    /// Fold one dispatcher's per-partition tallies into the totals.
    pub(crate) fn add_partition_counts(&self, counts: &[u64]) {
        let mut totals = lock(&self.inner.partitions);
        if totals.len() < counts.len() {
            totals.resize(counts.len(), 0);
        }
        for (total, n) in totals.iter_mut().zip(counts) {
            *total += n;
        }
    }

    pub(crate) fn output_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.inner.records_out)
    }

    #[must_use]
    pub fn records_in(&self) -> u64 {
        self.inner.records_in.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn records_out(&self) -> u64 {
        self.inner.records_out.load(Ordering::Relaxed)
    }

    /// Records routed to each reducer, indexed by partition.
    #[must_use]
    pub fn partition_counts(&self) -> Vec<u64> {
        lock(&self.inner.partitions).clone()
    }

    /// Total records that went from the map stage to the reduce stage.
    #[must_use]
    pub fn intermediate_records(&self) -> u64 {
        lock(&self.inner.partitions).iter().sum()
    }

    /// Time from start until the output stream closed, once it has.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        match *lock(&self.inner.window) {
            (Some(start), Some(end)) => Some(end.duration_since(start)),
            _ => None,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_in: self.records_in(),
            intermediate_records: self.intermediate_records(),
            records_out: self.records_out(),
            partition_counts: self.partition_counts(),
            elapsed_ms: self
                .elapsed()
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
        }
    }

    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self.snapshot()).unwrap_or(Value::Null)
    }

    /// Print the counters to stdout in a human-readable format.
    pub fn print(&self) {
        let snap = self.snapshot();
        println!("\n========== Pipeline Metrics ==========");
        if let Some(ms) = snap.elapsed_ms {
            println!("Execution Time: {:.3}s ({ms} ms)", ms as f64 / 1000.0);
            println!("--------------------------------------");
        }
        println!("records_in: {}", snap.records_in);
        println!("intermediate_records: {}", snap.intermediate_records);
        println!("records_out: {}", snap.records_out);
        for (i, n) in snap.partition_counts.iter().enumerate() {
            println!("partition[{i}]: {n}");
        }
        println!("======================================\n");
    }

    /// Save the counters to a pretty-printed JSON file.
    ///
    /// # Errors
    /// If the file cannot be created or written.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let formatted = serde_json::to_string_pretty(&self.snapshot())?;
        let mut file = File::create(path)?;
        file.write_all(formatted.as_bytes())?;
        Ok(())
    }
}
