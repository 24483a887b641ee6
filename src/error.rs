//! Typed errors raised by the engine.
//!
//! Public functions return [`anyhow::Result`]; the underlying cause is always one
//! of the [`EngineError`] variants below, so callers that care can recover it with
//! `err.downcast_ref::<EngineError>()`.

use crate::worker::{Stage, WorkerId};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A stage was configured with zero workers.
    #[error("{stage} stage needs at least one worker (got {count})")]
    InvalidWorkerCount { stage: Stage, count: usize },

    /// A completion barrier was asked to wait for zero signals.
    #[error("completion barrier must expect at least one signal")]
    InvalidSignalCount,

    /// The receiving side of a stream has been dropped.
    #[error("record stream is closed")]
    StreamClosed,

    /// A map or reduce transform returned an error or panicked.
    #[error("worker {worker} failed: {message}")]
    WorkerFailed { worker: WorkerId, message: String },

    /// No record arrived within the caller's watchdog window.
    #[error("no record received within {0:?}")]
    Timeout(Duration),

    /// The OS refused to start a worker thread.
    #[error("failed to spawn thread {name}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
