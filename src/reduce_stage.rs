//! Partitioned reduce stage: key-hash fan-out, shared fan-in.
//!
//! The dispatcher routes every intermediate record to reducer
//! [`partition_for(key, N)`](crate::partition::partition_for), so all records with
//! one key meet in the same reducer. Each reducer is called *once* with its whole
//! partition as a [`RecordStream`] and may buffer, aggregate or emit as it goes.
//! A [`CompletionBarrier`] over the output closes it after all `N` reducers return.
//!
//! A reducer that returns before draining its partition is allowed; the dispatcher
//! discards whatever else is routed to it and keeps feeding the others.

use crate::barrier::CompletionBarrier;
use crate::error::EngineError;
use crate::metrics::PipelineMetrics;
use crate::partition::partition_for;
use crate::stream::{RecordSender, RecordStream, channel};
use crate::worker::{FailureSink, Stage, StageHandle, WorkerFailure, WorkerId, spawn_named, spawn_worker};
use anyhow::Result;
use crossbeam_channel::Sender;
use std::sync::Arc;
use tracing::debug;

/// Start a reduce stage with default settings (rendezvous channels, no failure channel).
///
/// # Errors
/// [`EngineError::InvalidWorkerCount`] when `workers` is zero, or a thread spawn error.
pub fn run_reduce_stage<I, O, F>(
    input: RecordStream<I>,
    reduce_fn: F,
    workers: usize,
    output: RecordSender<O>,
) -> Result<StageHandle>
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(RecordStream<I>, &RecordSender<O>) -> Result<()> + Send + Sync + 'static,
{
    ReduceStage::new(workers)?.run(input, reduce_fn, output)
}

/// Configurable reduce stage.
pub struct ReduceStage {
    workers: usize,
    capacity: usize,
    failures: FailureSink,
    metrics: Option<PipelineMetrics>,
}

impl ReduceStage {
    /// # Errors
    /// [`EngineError::InvalidWorkerCount`] when `workers` is zero.
    pub fn new(workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(EngineError::InvalidWorkerCount {
                stage: Stage::Reduce,
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

    /// Buffer up to `capacity` records per partition channel (default `0`: rendezvous).
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

    /// Spawn the reducers and the routing dispatcher.
    pub fn run<I, O, F>(
        self,
        input: RecordStream<I>,
        reduce_fn: F,
        output: RecordSender<O>,
    ) -> Result<StageHandle>
    where
        I: Send + 'static,
        O: Send + 'static,
        F: Fn(RecordStream<I>, &RecordSender<O>) -> Result<()> + Send + Sync + 'static,
    {
        let Self {
            workers,
            capacity,
            failures,
            metrics,
        } = self;
        let reduce_fn = Arc::new(reduce_fn);
        let output = match &metrics {
            Some(m) => output.counted(m.output_counter()),
            None => output,
        };
        let keeper = output.clone();
        let finished = metrics.clone();
        let barrier = Arc::new(CompletionBarrier::new(workers, move || {
            // stamp the end time before consumers can observe the close
            if let Some(m) = finished {
                m.record_end();
            }
            drop(keeper);
        })?);

        let mut senders = Vec::with_capacity(workers);
        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let id = WorkerId::new(Stage::Reduce, index);
            let (tx, rx) = channel::<I>(capacity);
            let out = output.clone();
            let f = Arc::clone(&reduce_fn);
            let handle = spawn_worker(id, Arc::clone(&barrier), failures.clone(), move || {
                f(rx, &out)
            })?;
            senders.push(Some(tx));
            handles.push((id, handle));
        }
        drop(output);

        let dispatcher = spawn_named("kvflow-reduce-dispatch".to_string(), move || -> Result<()> {
            let mut routed = vec![0u64; workers];
            let mut live = workers;
            for record in input {
                let slot = partition_for(record.key(), workers);
                let Some(tx) = &senders[slot] else {
                    continue;
                };
                if tx.send(record).is_err() {
                    debug!(partition = slot, "reducer stopped accepting records; discarding its partition");
                    senders[slot] = None;
                    live -= 1;
                    if live == 0 {
                        break;
                    }
                    continue;
                }
                routed[slot] += 1;
            }
            if let Some(m) = &metrics {
                m.add_partition_counts(&routed);
            }
            // end of input for every partition, independently
            drop(senders);
            debug!(?routed, "reduce dispatcher finished");
            Ok(())
        })?;

        Ok(StageHandle::new(Stage::Reduce, dispatcher, handles))
    }
}
