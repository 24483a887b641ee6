//! Closable record channels connecting every stage of a pipeline.
//!
//! A stream has two halves:
//! - [`RecordSender`]: the producing side. It is cheap to clone; the stream
//!   closes once every clone has been dropped.
//! - [`RecordStream`]: the single consuming side. It yields records in send
//!   order and reports the end of the stream once it is closed and drained.
//!
//! The convention everywhere in the engine is *the producer closes, the consumer
//! never does*. Dropping a `RecordStream` early is still safe: producers see
//! [`EngineError::StreamClosed`] on their next send and stop.
//!
//! A capacity of `0` gives a rendezvous channel (each send waits for a matching
//! receive), which is the engine's default backpressure. A positive capacity
//! adds a bounded buffer.

use crate::error::EngineError;
use crate::record::Record;
use crate::worker::{WorkerFailure, spawn_named};
use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded, select};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Create a connected sender/stream pair.
///
/// ```
/// use kvflow::{channel, Record};
///
/// let (tx, rx) = channel::<u32>(1);
/// tx.emit("a", 1).unwrap();
/// drop(tx);
/// assert_eq!(rx.recv(), Some(Record::new("a", 1)));
/// assert_eq!(rx.recv(), None);
/// ```
#[must_use]
pub fn channel<V>(capacity: usize) -> (RecordSender<V>, RecordStream<V>) {
    let (tx, rx) = bounded(capacity);
    (RecordSender::new(tx), RecordStream::new(rx))
}

/// Feed an iterator of records into a new stream from a producer thread.
///
/// The stream closes after the last record has been handed off. If the
/// returned stream is dropped early, the producer stops.
pub fn stream_from_iter<V, I>(records: I, capacity: usize) -> Result<RecordStream<V>>
where
    V: Send + 'static,
    I: IntoIterator<Item = Record<V>>,
    I::IntoIter: Send + 'static,
{
    let (tx, rx) = channel(capacity);
    let records = records.into_iter();
    spawn_named("kvflow-source".to_string(), move || {
        for record in records {
            if tx.send(record).is_err() {
                debug!("source stream consumer went away; stopping producer");
                break;
            }
        }
    })?;
    Ok(rx)
}

/// Stream the contents of a vector through a rendezvous channel.
pub fn from_vec<V: Send + 'static>(records: Vec<Record<V>>) -> Result<RecordStream<V>> {
    stream_from_iter(records, 0)
}

/// Producing half of a record stream.
pub struct RecordSender<V> {
    tx: Sender<Record<V>>,
    sent: Option<Arc<AtomicU64>>,
}

impl<V> Clone for RecordSender<V> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            sent: self.sent.clone(),
        }
    }
}

impl<V> RecordSender<V> {
    pub(crate) const fn new(tx: Sender<Record<V>>) -> Self {
        Self { tx, sent: None }
    }

    /// Count every successful send on `counter`, including sends through clones.
    pub(crate) fn counted(mut self, counter: Arc<AtomicU64>) -> Self {
        self.sent = Some(counter);
        self
    }

    /// Hand one record to the consumer, blocking while the channel is full.
    ///
    /// # Errors
    /// [`EngineError::StreamClosed`] if the consuming side has been dropped.
    pub fn send(&self, record: Record<V>) -> Result<()> {
        self.tx.send(record).map_err(|_| EngineError::StreamClosed)?;
        if let Some(sent) = &self.sent {
            sent.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Shorthand for `send(Record::new(key, value))`.
    pub fn emit(&self, key: impl Into<String>, value: V) -> Result<()> {
        self.send(Record::new(key, value))
    }
}

/// Non-blocking receive outcome.
#[derive(Debug, PartialEq, Eq)]
pub enum TryRecv<V> {
    /// A record was waiting.
    Record(Record<V>),
    /// Nothing buffered right now, but producers are still attached.
    Empty,
    /// Every producer is gone and the stream is drained.
    Closed,
}

enum Next<V> {
    Record(Option<Record<V>>),
    Failure(WorkerFailure),
    FailuresDone,
}

/// Consuming half of a record stream.
///
/// Streams returned by the pipeline entry points are also wired to the run's
/// failure channel; [`recv_checked`](Self::recv_checked) uses it to report a
/// failed worker instead of blocking forever. Plain [`recv`](Self::recv) and
/// iteration ignore it.
#[derive(Debug)]
pub struct RecordStream<V> {
    rx: Receiver<Record<V>>,
    failures: Option<Receiver<WorkerFailure>>,
    failed: Option<WorkerFailure>,
}

impl<V> RecordStream<V> {
    pub(crate) const fn new(rx: Receiver<Record<V>>) -> Self {
        Self {
            rx,
            failures: None,
            failed: None,
        }
    }

    pub(crate) fn with_failures(mut self, failures: Receiver<WorkerFailure>) -> Self {
        self.failures = Some(failures);
        self
    }

    /// Block for the next record; `None` once the stream is closed and drained.
    pub fn recv(&self) -> Option<Record<V>> {
        self.rx.recv().ok()
    }

    /// Poll for a record without blocking.
    pub fn try_recv(&self) -> TryRecv<V> {
        match self.rx.try_recv() {
            Ok(record) => TryRecv::Record(record),
            Err(TryRecvError::Empty) => TryRecv::Empty,
            Err(TryRecvError::Disconnected) => TryRecv::Closed,
        }
    }

    /// Like [`recv`](Self::recv), but give up after `timeout`.
    ///
    /// # Errors
    /// [`EngineError::Timeout`] when nothing arrives in time.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Record<V>>> {
        match self.rx.recv_timeout(timeout) {
            Ok(record) => Ok(Some(record)),
            Err(RecvTimeoutError::Disconnected) => Ok(None),
            Err(RecvTimeoutError::Timeout) => Err(EngineError::Timeout(timeout).into()),
        }
    }

    /// Block for the next record, or fail as soon as any worker of the run fails.
    ///
    /// Once a failure has been observed every later call returns it again.
    ///
    /// # Errors
    /// [`EngineError::WorkerFailed`] describing the first failure seen.
    pub fn recv_checked(&mut self) -> Result<Option<Record<V>>> {
        loop {
            if let Some(failure) = &self.failed {
                return Err(failure.clone().into_error().into());
            }
            let Some(failures) = &self.failures else {
                return Ok(self.recv());
            };
            let next = select! {
                recv(self.rx) -> msg => Next::Record(msg.ok()),
                recv(failures) -> failure => match failure {
                    Ok(failure) => Next::Failure(failure),
                    Err(_) => Next::FailuresDone,
                },
            };
            match next {
                Next::Record(record) => return Ok(record),
                Next::Failure(failure) => self.failed = Some(failure),
                // every worker has exited; only the data channel matters now
                Next::FailuresDone => self.failures = None,
            }
        }
    }

    /// Drain the stream into a vector, stopping at the first worker failure.
    pub fn collect_checked(mut self) -> Result<Vec<Record<V>>> {
        let mut out = Vec::new();
        while let Some(record) = self.recv_checked()? {
            out.push(record);
        }
        Ok(out)
    }
}

impl<V> Iterator for RecordStream<V> {
    type Item = Record<V>;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}
