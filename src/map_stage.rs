//! Parallel map stage: round-robin fan-out, shared fan-in.
//!
//! A dispatcher thread reads the input stream and hands records to `N` worker
//! channels in strict round-robin order (record `i` goes to worker `i % N`).
//! Each worker calls the map function once per record; the function may emit
//! any number of records on the shared output sender. A [`CompletionBarrier`]
//! over the output closes it once all `N` workers have drained their inputs.
//!
//! Order is preserved within one worker's channel only; the output interleaves
//! workers arbitrarily.

use crate::barrier::CompletionBarrier;
use crate::error::EngineError;
use crate::metrics::PipelineMetrics;
use crate::record::Record;
use crate::stream::{RecordSender, RecordStream, channel};
use crate::worker::{FailureSink, Stage, StageHandle, WorkerFailure, WorkerId, spawn_named, spawn_worker};
use anyhow::Result;
use crossbeam_channel::Sender;
use std::sync::Arc;
use tracing::debug;

/// Start a map stage with default settings (rendezvous channels, no failure channel).
///
/// Returns immediately; the stage runs on its own threads until `input` closes.
/// The returned handle can be joined to wait for it and collect worker errors.
///
/// # Errors
/// [`EngineError::InvalidWorkerCount`] when `workers` is zero, or a thread spawn error.
pub fn run_map_stage<I, O, F>(
    input: RecordStream<I>,
    map_fn: F,
    workers: usize,
    output: RecordSender<O>,
) -> Result<StageHandle>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(Record<I>, &RecordSender<O>) -> Result<()> + Send + Sync + 'static,
{
    MapStage::new(workers)?.run(input, map_fn, output)
}

/// Configurable map stage.
pub struct MapStage {
    workers: usize,
    capacity: usize,
    failures: FailureSink,
    metrics: Option<PipelineMetrics>,
}

impl MapStage {
    /// # Errors
    /// [`EngineError::InvalidWorkerCount`] when `workers` is zero.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(EngineError::InvalidWorkerCount {
                stage: Stage::Map,
                count: workers,
            }
            .into());
        }
        Ok(Self {
            workers,
            capacity: 0,
            failures: None,
            metrics: None,
        })
    }

    /// Buffer up to `capacity` records per worker channel (default `0`: rendezvous).
    #[must_use]
    pub const fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Report worker failures on `failures`.
    #[must_use]
    pub fn with_failures(mut self, failures: Sender<WorkerFailure>) -> Self {
        self.failures = Some(failures);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: PipelineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Spawn the workers and the dispatcher.
    pub fn run<I, O, F>(
        self,
        input: RecordStream<I>,
        map_fn: F,
        output: RecordSender<O>,
    ) -> Result<StageHandle>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(Record<I>, &RecordSender<O>) -> Result<()> + Send + Sync + 'static,
    {
        let Self {
            workers,
            capacity,
            failures,
            metrics,
        } = self;
        let map_fn = Arc::new(map_fn);
        let barrier = Arc::new(CompletionBarrier::closing(output.clone(), workers)?);

        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let id = WorkerId::new(Stage::Map, index);
            let (tx, rx) = channel::<I>(capacity);
            let out = output.clone();
            let f = Arc::clone(&map_fn);
            let handle = spawn_worker(id, Arc::clone(&barrier), failures.clone(), move || {
                for record in rx {
                    f(record, &out)?;
                }
                Ok(())
            })?;
            senders.push(tx);
            handles.push((id, handle));
        }
        // the barrier and the workers hold the only remaining senders
        drop(output);

        let dispatcher = spawn_named("kvflow-map-dispatch".to_string(), move || -> Result<()> {
            let mut dispatched = 0usize;
            let mut outcome = Ok(());
            for record in input {
                let slot = dispatched % workers;
                if let Err(err) = senders[slot].send(record) {
                    outcome = Err(err.context(format!("map worker {slot} stopped accepting records")));
                    break;
                }
                dispatched += 1;
            }
            // published before the close so the totals are in place when the output ends
            if let Some(m) = &metrics {
                m.add_records_in(dispatched as u64);
            }
            // closing every worker channel tells each worker its input is done
            drop(senders);
            debug!(records = dispatched, workers, "map dispatcher finished");
            outcome
        })?;

        Ok(StageHandle::new(Stage::Map, dispatcher, handles))
    }
}
