//! # kvflow
//!
//! A **concurrent, partitioned map/reduce engine** over streams of key/value
//! records. Records flow through two parallel stages connected by closable
//! channels:
//!
//! ```text
//! input ──▶ map stage (M workers) ──▶ intermediate ──▶ reduce stage (R workers) ──▶ output
//!           round-robin dispatch                       hash(key) routing
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use kvflow::*;
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let input = from_vec(vec![
//!     Record::new("a", 1u64),
//!     Record::new("b", 1),
//!     Record::new("a", 1),
//!     Record::new("c", 1),
//!     Record::new("b", 1),
//!     Record::new("a", 1),
//! ])?;
//!
//! // Sorted finisher: the whole result, ordered by key.
//! let totals: Vec<_> = sorted_map_reduce(input, identity(), 2, sum_values(), 2, by_key)?.collect();
//!
//! assert_eq!(totals, vec![Record::new("a", 3), Record::new("b", 2), Record::new("c", 1)]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Records and streams
//!
//! A [`Record`] is an immutable `(String, V)` pair. Keys repeat; grouping by key
//! is what the reduce stage is for. A stream is a [`RecordSender`] /
//! [`RecordStream`] pair: producers close it by dropping every sender, and the
//! consumer sees the end of the stream once it is drained. Channels default to
//! rendezvous hand-off, which doubles as backpressure all the way back to the
//! input producer.
//!
//! ### Stages
//!
//! - The **map stage** spreads input records round-robin across `M` workers.
//!   Each calls the map function once per record; it may emit zero or more records.
//! - The **reduce stage** routes each intermediate record by a deterministic hash
//!   of its key, so every record with a given key reaches the same reducer. Each
//!   reducer is handed its whole partition as a stream.
//!
//! Each stage closes its shared output through a [`CompletionBarrier`]: a
//! countdown latch that fires after exactly one signal per worker.
//!
//! ### Ordering
//!
//! Output order is not deterministic. [`sorted_map_reduce`] materializes the full
//! result in a [`KeyValues`] buffer, sorts it, and re-streams it.
//!
//! ### Failures
//!
//! Transforms are not retried. A transform that errors or panics stops its
//! worker, which never signals its barrier, so the pipeline cannot complete.
//! Streams returned by the entry points surface that through
//! [`RecordStream::recv_checked`] / [`RecordStream::collect_checked`]; plain
//! iteration blocks. [`RecordStream::recv_timeout`] gives a watchdog.
//!
//! ## Module Overview
//!
//! - [`record`] - the `Record` type
//! - [`stream`] - channels, stream helpers
//! - [`barrier`] - completion barrier
//! - [`partition`] - key hashing and partition routing
//! - [`map_stage`] / [`reduce_stage`] - the two stages
//! - [`runner`] - configuration and orchestration
//! - [`pipeline`] - free-function entry points
//! - [`sorted`] - ordered collection and comparators
//! - [`reducers`] - ready-made map/reduce transforms
//! - [`metrics`] - run statistics
//! - [`testing`] - helpers for testing pipelines

pub mod barrier;
pub mod error;
pub mod map_stage;
pub mod metrics;
pub mod partition;
pub mod pipeline;
pub mod record;
pub mod reduce_stage;
pub mod reducers;
pub mod runner;
pub mod sorted;
pub mod stream;
pub mod testing;
pub mod worker;

pub use barrier::CompletionBarrier;
pub use error::EngineError;
pub use map_stage::{MapStage, run_map_stage};
pub use metrics::{MetricsSnapshot, PipelineMetrics};
pub use partition::{key_hash, partition_for};
pub use pipeline::{map_reduce, sorted_map_reduce};
pub use record::Record;
pub use reduce_stage::{ReduceStage, run_reduce_stage};
pub use reducers::*;
pub use runner::Runner;
pub use sorted::{KeyValues, Less, by_key, by_key_then_value};
pub use stream::{RecordSender, RecordStream, TryRecv, channel, from_vec, stream_from_iter};
pub use worker::{Stage, StageHandle, WorkerFailure, WorkerId};
