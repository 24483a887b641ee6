//! Free-function entry points.
//!
//! These take the stage parallelism explicitly and otherwise use
//! [`Runner::default`] settings. Use a [`Runner`] directly for channel buffering,
//! metrics, or environment-driven configuration.

use crate::record::Record;
use crate::runner::Runner;
use crate::stream::{RecordSender, RecordStream};
use anyhow::Result;

/// Start a map/reduce pipeline and return its output stream without blocking.
///
/// ```
/// use kvflow::*;
///
/// # fn main() -> anyhow::Result<()> {
/// let input = from_vec(vec![
///     Record::new("a", 1u64),
///     Record::new("b", 1),
///     Record::new("a", 1),
/// ])?;
/// let mut out: Vec<_> = map_reduce(input, identity(), 2, sum_values(), 2)?.collect();
/// out.sort();
/// assert_eq!(out, vec![Record::new("a", 2), Record::new("b", 1)]);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// A zero worker count, or a thread that could not be spawned.
pub fn map_reduce<I, M, R, MF, RF>(
    input: RecordStream<I>,
    map_fn: MF,
    map_workers: usize,
    reduce_fn: RF,
    reduce_workers: usize,
) -> Result<RecordStream<R>>
where
    I: Send + 'static,
    M: Send + 'static,
    R: Send + 'static,
    MF: Fn(Record<I>, &RecordSender<M>) -> Result<()> + Send + Sync + 'static,
    RF: Fn(RecordStream<M>, &RecordSender<R>) -> Result<()> + Send + Sync + 'static,
{
    Runner::default()
        .with_map_workers(map_workers)
        .with_reduce_workers(reduce_workers)
        .map_reduce(input, map_fn, reduce_fn)
}

/// Run a map/reduce pipeline to completion and stream its output sorted by `less`.
///
/// ```
/// use kvflow::*;
///
/// # fn main() -> anyhow::Result<()> {
/// let input = from_vec(vec![Record::new("b", 1u64), Record::new("a", 1)])?;
/// let out: Vec<_> = sorted_map_reduce(input, identity(), 1, sum_values(), 2, by_key)?.collect();
/// assert_eq!(out, vec![Record::new("a", 1), Record::new("b", 1)]);
/// # Ok(())
/// # }
/// ```
///
/// # Errors
/// A zero worker count, a thread spawn failure, or a failed worker.
pub fn sorted_map_reduce<I, M, R, MF, RF, C>(
    input: RecordStream<I>,
    map_fn: MF,
    map_workers: usize,
    reduce_fn: RF,
    reduce_workers: usize,
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
    Runner::default()
        .with_map_workers(map_workers)
        .with_reduce_workers(reduce_workers)
        .sorted_map_reduce(input, map_fn, reduce_fn, less)
}
