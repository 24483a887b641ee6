//! Ready-made map and reduce transforms.
//!
//! Map transforms have the shape `Fn(Record<I>, &RecordSender<O>) -> Result<()>`
//! and are called once per record. Reduce transforms have the shape
//! `Fn(RecordStream<I>, &RecordSender<O>) -> Result<()>` and are called once per
//! partition with the whole partition stream. Any accumulation state lives inside
//! the call, so nothing is shared between reducers.
//!
//! ```no_run
//! use kvflow::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let input = from_vec(vec![Record::new("a", 1u64), Record::new("a", 2)])?;
//! let out = map_reduce(input, identity(), 2, sum_values(), 2)?;
//! assert_eq!(out.collect::<Vec<_>>(), vec![Record::new("a", 3)]);
//! # Ok(())
//! # }
//! ```

use crate::record::Record;
use crate::stream::{RecordSender, RecordStream};
use anyhow::Result;
use rustc_hash::FxHashMap;
use std::ops::AddAssign;

// ---------- map side ----------

/// Emit every record unchanged.
pub fn identity<V: Send + 'static>()
-> impl Fn(Record<V>, &RecordSender<V>) -> Result<()> + Send + Sync + Clone + 'static {
    |record: Record<V>, out: &RecordSender<V>| out.send(record)
}

/// Emit every record with its value transformed, keeping the key.
pub fn map_values<I, O, F>(f: F) -> impl Fn(Record<I>, &RecordSender<O>) -> Result<()> + Send + Sync + 'static
where
    I: Send + 'static,
    O: Send + 'static,
    F: Fn(I) -> O + Send + Sync + 'static,
{
    move |record: Record<I>, out: &RecordSender<O>| out.send(record.map_value(&f))
}

/// Emit only the records matching `pred`.
pub fn filter_records<V, P>(pred: P) -> impl Fn(Record<V>, &RecordSender<V>) -> Result<()> + Send + Sync + 'static
where
    V: Send + 'static,
    P: Fn(&Record<V>) -> bool + Send + Sync + 'static,
{
    move |record: Record<V>, out: &RecordSender<V>| {
        if pred(&record) {
            out.send(record)?;
        }
        Ok(())
    }
}

// ---------- reduce side ----------

/// Forward the whole partition unchanged.
pub fn passthrough<V: Send + 'static>()
-> impl Fn(RecordStream<V>, &RecordSender<V>) -> Result<()> + Send + Sync + Clone + 'static {
    |input: RecordStream<V>, out: &RecordSender<V>| {
        for record in input {
            out.send(record)?;
        }
        Ok(())
    }
}

/// One record per key holding the sum of its values.
pub fn sum_values<V>() -> impl Fn(RecordStream<V>, &RecordSender<V>) -> Result<()> + Send + Sync + Clone + 'static
where
    V: AddAssign + Default + Send + 'static,
{
    |input: RecordStream<V>, out: &RecordSender<V>| {
        let mut totals: FxHashMap<String, V> = FxHashMap::default();
        for record in input {
            let (key, value) = record.into_parts();
            *totals.entry(key).or_default() += value;
        }
        for (key, total) in totals {
            out.emit(key, total)?;
        }
        Ok(())
    }
}

/// One record per key holding how many records carried that key.
pub fn count_values<V>() -> impl Fn(RecordStream<V>, &RecordSender<u64>) -> Result<()> + Send + Sync + Clone + 'static
where
    V: Send + 'static,
{
    |input: RecordStream<V>, out: &RecordSender<u64>| {
        let mut counts: FxHashMap<String, u64> = FxHashMap::default();
        for record in input {
            let (key, _) = record.into_parts();
            *counts.entry(key).or_insert(0) += 1;
        }
        for (key, n) in counts {
            out.emit(key, n)?;
        }
        Ok(())
    }
}

/// One record per key holding all of its values, in arrival order.
pub fn collect_values<V>() -> impl Fn(RecordStream<V>, &RecordSender<Vec<V>>) -> Result<()> + Send + Sync + Clone + 'static
where
    V: Send + 'static,
{
    |input: RecordStream<V>, out: &RecordSender<Vec<V>>| {
        let mut groups: FxHashMap<String, Vec<V>> = FxHashMap::default();
        for record in input {
            let (key, value) = record.into_parts();
            groups.entry(key).or_default().push(value);
        }
        for (key, values) in groups {
            out.emit(key, values)?;
        }
        Ok(())
    }
}
