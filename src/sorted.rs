//! Ordered collection used by the sorting finisher.
//!
//! [`KeyValues`] materializes a whole result set, sorts it with an injected
//! "less than" predicate and re-streams it. The predicate follows the usual
//! convention: `less(a, b)` is `true` when `a` must come before `b`. It has to be
//! a strict weak ordering, otherwise the resulting order is unspecified.
//!
//! Ties keep no particular order unless the predicate breaks them itself, as
//! [`by_key_then_value`] does.

use crate::record::Record;
use crate::stream::{RecordStream, stream_from_iter};
use anyhow::Result;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::sync::Arc;

/// "Sorts before" predicate over two records.
pub type Less<V> = dyn Fn(&Record<V>, &Record<V>) -> bool + Send + Sync;

/// Key ascending, lexicographic.
pub fn by_key<V>(a: &Record<V>, b: &Record<V>) -> bool {
    a.key() < b.key()
}

/// Key ascending, then value ascending. Gives a fully deterministic order.
pub fn by_key_then_value<V: Ord>(a: &Record<V>, b: &Record<V>) -> bool {
    (a.key(), a.value()) < (b.key(), b.value())
}

/// Growable, predicate-ordered buffer of records.
pub struct KeyValues<V> {
    records: Vec<Record<V>>,
    less: Arc<Less<V>>,
}

impl<V> KeyValues<V> {
    pub fn new<F>(less: F) -> Self
    where
        F: Fn(&Record<V>, &Record<V>) -> bool + Send + Sync + 'static,
    {
        Self::with_capacity(0, less)
    }

    pub fn with_capacity<F>(capacity: usize, less: F) -> Self
    where
        F: Fn(&Record<V>, &Record<V>) -> bool + Send + Sync + 'static,
    {
        Self {
            records: Vec::with_capacity(capacity),
            less: Arc::new(less),
        }
    }

    /// Append a record. Storage grows geometrically, so pushes are amortized O(1).
    pub fn push(&mut self, record: Record<V>) {
        self.records.push(record);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[Record<V>] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record<V>> {
        self.records.iter()
    }

    /// `true` if no adjacent pair is out of order under the predicate.
    #[must_use]
    pub fn is_sorted(&self) -> bool {
        self.records.windows(2).all(|w| !(self.less)(&w[1], &w[0]))
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Record<V>> {
        self.records
    }
}

impl<V: Send> KeyValues<V> {
    /// Sort in place with the collection's predicate, using the rayon thread pool.
    pub fn sort(&mut self) {
        let less = Arc::clone(&self.less);
        self.records.par_sort_by(|a, b| ordering(less.as_ref(), a, b));
    }
}

impl<V: Send + 'static> KeyValues<V> {
    /// Re-stream the buffered records, in their current order, from a producer thread.
    pub fn into_stream(self, capacity: usize) -> Result<RecordStream<V>> {
        stream_from_iter(self.records, capacity)
    }
}

impl<V> Extend<Record<V>> for KeyValues<V> {
    fn extend<T: IntoIterator<Item = Record<V>>>(&mut self, iter: T) {
        self.records.extend(iter);
    }
}

fn ordering<V>(less: &Less<V>, a: &Record<V>, b: &Record<V>) -> Ordering {
    if less(a, b) {
        Ordering::Less
    } else if less(b, a) {
        Ordering::Greater
    } else {
        Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv(key: &str, value: i32) -> Record<i32> {
        Record::new(key, value)
    }

    #[test]
    fn sorts_by_key() {
        let mut buf = KeyValues::new(by_key);
        buf.extend([kv("c", 1), kv("a", 2), kv("b", 3)]);
        assert!(!buf.is_sorted());

        buf.sort();

        let keys: Vec<_> = buf.iter().map(|r| r.key().to_string()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
        assert!(buf.is_sorted());
    }

    #[test]
    fn tie_break_on_value() {
        let mut buf = KeyValues::new(by_key_then_value);
        buf.extend([kv("a", 3), kv("a", 1), kv("a", 2)]);
        buf.sort();
        assert_eq!(buf.into_vec(), vec![kv("a", 1), kv("a", 2), kv("a", 3)]);
    }

    #[test]
    fn custom_descending_predicate() {
        let mut buf = KeyValues::new(|a: &Record<i32>, b: &Record<i32>| a.value() > b.value());
        buf.extend([kv("x", 1), kv("y", 9), kv("z", 5)]);
        buf.sort();
        let values: Vec<_> = buf.iter().map(|r| *r.value()).collect();
        assert_eq!(values, [9, 5, 1]);
    }

    #[test]
    fn empty_buffer_is_sorted() {
        let mut buf = KeyValues::<i32>::new(by_key);
        buf.sort();
        assert!(buf.is_empty());
        assert!(buf.is_sorted());
    }

    #[test]
    fn re_stream_preserves_order() -> Result<()> {
        let mut buf = KeyValues::with_capacity(4, by_key);
        buf.extend([kv("d", 4), kv("b", 2), kv("a", 1), kv("c", 3)]);
        buf.sort();
        let out: Vec<_> = buf.into_stream(0)?.collect();
        assert_eq!(out, vec![kv("a", 1), kv("b", 2), kv("c", 3), kv("d", 4)]);
        Ok(())
    }
}
