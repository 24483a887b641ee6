//! Worker identity and thread supervision.
//!
//! Every stage runs as one dispatcher thread plus `N` worker threads. Workers are
//! identified by a [`WorkerId`] (stage + index) which is small, `Copy`, and
//! hashable, and shows up in thread names, log fields, and failure reports.
//!
//! Transforms are never retried. When one returns an error or panics, the worker
//! publishes a [`WorkerFailure`] (if the run has a failure channel), skips its
//! completion signal, and exits. Panics are re-raised after being reported.

use crate::barrier::CompletionBarrier;
use crate::error::EngineError;
use anyhow::{Result, anyhow};
use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// Which half of the pipeline a worker belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum Stage {
    Map,
    Reduce,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Map => "map",
            Self::Reduce => "reduce",
        })
    }
}

/// Identifier of a worker within one pipeline run.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct WorkerId {
    stage: Stage,
    index: usize,
}

impl WorkerId {
    #[must_use]
    pub const fn new(stage: Stage, index: usize) -> Self {
        Self { stage, index }
    }

    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    /// Position of the worker within its stage (`0..workers`).
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.stage, self.index)
    }
}

/// A worker that stopped without finishing its input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerFailure {
    pub worker: WorkerId,
    pub message: String,
}

impl WorkerFailure {
    #[must_use]
    pub fn into_error(self) -> EngineError {
        EngineError::WorkerFailed {
            worker: self.worker,
            message: self.message,
        }
    }
}

pub(crate) type FailureSink = Option<Sender<WorkerFailure>>;

/// Spawn a named OS thread, mapping spawn errors into [`EngineError::Spawn`].
pub(crate) fn spawn_named<T, F>(name: String, body: F) -> Result<JoinHandle<T>>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    thread::Builder::new()
        .name(name.clone())
        .spawn(body)
        .map_err(|source| EngineError::Spawn { name, source }.into())
}

/// Spawn a worker thread.
///
/// `body` owns everything the worker touches (its input channel, a clone of the
/// shared output sender). It is consumed by the call, so those handles are
/// released *before* the barrier is signalled.
pub(crate) fn spawn_worker<F>(
    id: WorkerId,
    barrier: Arc<CompletionBarrier>,
    failures: FailureSink,
    body: F,
) -> Result<JoinHandle<Result<()>>>
where
    F: FnOnce() -> Result<()> + Send + 'static,
{
    spawn_named(format!("kvflow-{id}"), move || {
        debug!(worker = %id, "worker starting");
        match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(Ok(())) => {
                debug!(worker = %id, "worker drained its input");
                barrier.signal();
                Ok(())
            }
            Ok(Err(err)) => {
                let message = format!("{err:#}");
                warn!(worker = %id, %message, "worker failed");
                report(failures.as_ref(), id, message.clone());
                Err(EngineError::WorkerFailed { worker: id, message }.into())
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(worker = %id, %message, "worker panicked");
                report(failures.as_ref(), id, message);
                panic::resume_unwind(payload)
            }
        }
    })
}

fn report(failures: Option<&Sender<WorkerFailure>>, worker: WorkerId, message: String) {
    if let Some(tx) = failures {
        // unbounded; only fails if nobody is listening any more
        let _ = tx.send(WorkerFailure { worker, message });
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with a non-string payload".to_string()
    }
}

/// Join handles for the threads of one running stage.
///
/// Dropping the handle detaches the threads; the stage keeps running.
pub struct StageHandle {
    stage: Stage,
    dispatcher: JoinHandle<Result<()>>,
    workers: Vec<(WorkerId, JoinHandle<Result<()>>)>,
}

impl StageHandle {
    pub(crate) fn new(
        stage: Stage,
        dispatcher: JoinHandle<Result<()>>,
        workers: Vec<(WorkerId, JoinHandle<Result<()>>)>,
    ) -> Self {
        Self {
            stage,
            dispatcher,
            workers,
        }
    }

    #[must_use]
    pub const fn stage(&self) -> Stage {
        self.stage
    }

    #[must_use]
    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Wait for the dispatcher and every worker to exit.
    ///
    /// Blocks until the stage's input stream has been closed and drained. A
    /// worker failure takes precedence over the dispatcher error it causes.
    ///
    /// # Errors
    /// The first worker failure, or the dispatcher's error if no worker failed.
    pub fn join(self) -> Result<()> {
        let stage = self.stage;
        let mut first: Option<anyhow::Error> = None;
        for (id, handle) in self.workers {
            let outcome = match handle.join() {
                Ok(result) => result,
                Err(payload) => Err(EngineError::WorkerFailed {
                    worker: id,
                    message: panic_message(payload.as_ref()),
                }
                .into()),
            };
            if let Err(err) = outcome {
                first.get_or_insert(err);
            }
        }
        let dispatched = self
            .dispatcher
            .join()
            .map_err(|payload| anyhow!("{stage} dispatcher panicked: {}", panic_message(payload.as_ref())))
            .and_then(|result| result);
        match (first, dispatched) {
            (Some(err), _) | (None, Err(err)) => Err(err),
            (None, Ok(())) => Ok(()),
        }
    }
}
