//! Pipeline orchestration.
//!
//! A [`Runner`] holds the knobs of a run (stage parallelism, channel buffering,
//! optional metrics) and wires input → map stage → reduce stage → output.
//!
//! ```text
//! input ──round-robin──▶ map#0..M ──▶ intermediate ──hash(key)──▶ reduce#0..R ──▶ output
//! ```
//!
//! Both stages are started before anything flows and are driven purely by channel
//! activity, so [`Runner::map_reduce`] returns the output stream right away. The
//! sorted variant has to wait for the whole result before it can emit anything.

use crate::error::EngineError;
use crate::map_stage::MapStage;
use crate::metrics::PipelineMetrics;
use crate::record::Record;
use crate::reduce_stage::ReduceStage;
use crate::sorted::KeyValues;
use crate::stream::{RecordSender, RecordStream, channel};
use crate::worker::Stage;
use anyhow::{Context, Result};
use std::time::Instant;
use tracing::info;

/// Environment variable overriding [`Runner::map_workers`].
pub const MAP_WORKERS_ENV: &str = "KVFLOW_MAP_WORKERS";
/// Environment variable overriding [`Runner::reduce_workers`].
pub const REDUCE_WORKERS_ENV: &str = "KVFLOW_REDUCE_WORKERS";
/// Environment variable overriding [`Runner::channel_capacity`].
pub const CHANNEL_CAPACITY_ENV: &str = "KVFLOW_CHANNEL_CAPACITY";

#[derive(Clone, Debug)]
pub struct Runner {
    /// Parallel map workers (`>= 1`).
    pub map_workers: usize,
    /// Parallel reducers, i.e. key partitions (`>= 1`).
    pub reduce_workers: usize,
    /// Records buffered per channel; `0` makes every hand-off a rendezvous.
    pub channel_capacity: usize,
    pub metrics: Option<PipelineMetrics>,
}

impl Default for Runner {
    fn default() -> Self {
        let cpus = num_cpus::get().max(1);
        Self {
            map_workers: cpus,
            reduce_workers: cpus,
            channel_capacity: 0,
            metrics: None,
        }
    }
}

impl Runner {
    /// Defaults overlaid with `KVFLOW_MAP_WORKERS`, `KVFLOW_REDUCE_WORKERS` and
    /// `KVFLOW_CHANNEL_CAPACITY`, when set.
    ///
    /// # Errors
    /// If a variable is set but is not a non-negative integer, or a worker count is zero.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through `lookup`.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parse = |name: &str| -> Result<Option<usize>> {
            lookup(name)
                .map(|raw| {
                    raw.trim()
                        .parse::<usize>()
                        .with_context(|| format!("{name} must be a non-negative integer, got {raw:?}"))
                })
                .transpose()
        };

        let mut runner = Self::default();
        if let Some(n) = parse(MAP_WORKERS_ENV)? {
            runner.map_workers = n;
        }
        if let Some(n) = parse(REDUCE_WORKERS_ENV)? {
            runner.reduce_workers = n;
        }
        if let Some(n) = parse(CHANNEL_CAPACITY_ENV)? {
            runner.channel_capacity = n;
        }
        runner.validate()?;
        Ok(runner)
    }

    #[must_use]
    pub const fn with_map_workers(mut self, workers: usize) -> Self {
        self.map_workers = workers;
        self
    }

    #[must_use]
    pub const fn with_reduce_workers(mut self, workers: usize) -> Self {
        self.reduce_workers = workers;
        self
    }

    #[must_use]
    pub const fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Reject configurations that could only deadlock.
    ///
    /// # Errors
    /// [`EngineError::InvalidWorkerCount`] for a zero worker count.
    pub fn validate(&self) -> Result<()> {
        if self.map_workers == 0 {
            return Err(EngineError::InvalidWorkerCount {
                stage: Stage::Map,
                count: 0,
            }
            .into());
        }
        if self.reduce_workers == 0 {
            return Err(EngineError::InvalidWorkerCount {
                stage: Stage::Reduce,
                count: 0,
            }
            .into());
        }
        Ok(())
    }

    /// Start the two-stage pipeline and return its output stream immediately.
    ///
    /// The output yields every reduced record exactly once and closes after the
    /// last reducer returns. Use [`RecordStream::recv_checked`] on it to learn
    /// about failed workers instead of blocking forever.
    ///
    /// # Errors
    /// An invalid configuration, or a thread that could not be spawned.
    pub fn map_reduce<I, M, R, MF, RF>(
        &self,
        input: RecordStream<I>,
        map_fn: MF,
        reduce_fn: RF,
    ) -> Result<RecordStream<R>>
    where
        I: Send + 'static,
        M: Send + 'static,
        R: Send + 'static,
        MF: Fn(Record<I>, &RecordSender<M>) -> Result<()> + Send + Sync + 'static,
        RF: Fn(RecordStream<M>, &RecordSender<R>) -> Result<()> + Send + Sync + 'static,
    {
        self.validate()?;

        let (failures_tx, failures_rx) = crossbeam_channel::unbounded();
        let (mid_tx, mid_rx) = channel::<M>(self.channel_capacity);
        let (out_tx, out_rx) = channel::<R>(self.channel_capacity);

        let mut reduce = ReduceStage::new(self.reduce_workers)?
            .with_channel_capacity(self.channel_capacity)
            .with_failures(failures_tx.clone());
        let mut map = MapStage::new(self.map_workers)?
            .with_channel_capacity(self.channel_capacity)
            .with_failures(failures_tx);
        if let Some(metrics) = &self.metrics {
            metrics.record_start();
            reduce = reduce.with_metrics(metrics.clone());
            map = map.with_metrics(metrics.clone());
        }

        info!(
            map_workers = self.map_workers,
            reduce_workers = self.reduce_workers,
            channel_capacity = self.channel_capacity,
            "starting map/reduce pipeline"
        );
        // stage handles are detached; failures surface on the output stream
        reduce.run(mid_rx, reduce_fn, out_tx)?;
        map.run(input, map_fn, mid_tx)?;

        Ok(out_rx.with_failures(failures_rx))
    }

    /// Run the pipeline to completion, sort the whole result with `less`, and
    /// re-stream it.
    ///
    /// Blocks until the unsorted pipeline has finished.
    ///
    /// # Errors
    /// Anything [`map_reduce`](Self::map_reduce) reports, plus the first worker
    /// failure observed while draining.
    pub fn sorted_map_reduce<I, M, R, MF, RF, C>(
        &self,
        input: RecordStream<I>,
        map_fn: MF,
        reduce_fn: RF,
        less: C,
    ) -> Result<RecordStream<R>>
    where
        I: Send + 'static,
        M: Send + 'static,
        R: Send + 'static,
        MF: Fn(Record<I>, &RecordSender<M>) -> Result<()> + Send + Sync + 'static,
        RF: Fn(RecordStream<M>, &RecordSender<R>) -> Result<()> + Send + Sync + 'static,
        C: Fn(&Record<R>, &Record<R>) -> bool + Send + Sync + 'static,
    {
        let mut unsorted = self.map_reduce(input, map_fn, reduce_fn)?;

        let mut buffer = KeyValues::new(less);
        while let Some(record) = unsorted.recv_checked()? {
            buffer.push(record);
        }

        let started = Instant::now();
        buffer.sort();
        info!(
            records = buffer.len(),
            sort_ms = started.elapsed().as_millis() as u64,
            "sorted pipeline output"
        );

        buffer.into_stream(self.channel_capacity)
    }
}
