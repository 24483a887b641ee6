//! Fluent builders for input record sets.

use crate::record::Record;
use crate::stream::{RecordStream, from_vec};
use anyhow::Result;

/// A fluent builder for pipeline input.
///
/// # Example
///
/// ```
/// use kvflow::testing::RecordsBuilder;
///
/// let records = RecordsBuilder::new()
///     .add("a", 1)
///     .add_repeated("b", 2, 3)
///     .add_cycled(&["x", "y"], 4, |i| i as i32)
///     .build();
///
/// assert_eq!(records.len(), 8); // 1 + 3 + 4
/// ```
pub struct RecordsBuilder<V> {
    records: Vec<Record<V>>,
}

impl<V> Default for RecordsBuilder<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> RecordsBuilder<V> {
    #[must_use]
    pub const fn new() -> Self {
        Self { records: Vec::new() }
    }

    /// Add a single record.
    #[must_use]
    pub fn add(mut self, key: impl Into<String>, value: V) -> Self {
        self.records.push(Record::new(key, value));
        self
    }

    /// Add several `(key, value)` pairs.
    #[must_use]
    pub fn add_pairs<K: Into<String>>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self {
        self.records.extend(pairs.into_iter().map(Record::from));
        self
    }

    /// Add `count` copies of the same record.
    #[must_use]
    pub fn add_repeated(mut self, key: impl Into<String>, value: V, count: usize) -> Self
    where
        V: Clone,
    {
        let key = key.into();
        for _ in 0..count {
            self.records.push(Record::new(key.clone(), value.clone()));
        }
        self
    }

    /// Add `count` records whose keys cycle through `keys`; record `i` gets `value(i)`.
    ///
    /// # Panics
    ///
    /// Panics if `keys` is empty and `count` is not zero.
    #[must_use]
    pub fn add_cycled(mut self, keys: &[&str], count: usize, value: impl Fn(usize) -> V) -> Self {
        for i in 0..count {
            self.records.push(Record::new(keys[i % keys.len()], value(i)));
        }
        self
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
    pub fn build(self) -> Vec<Record<V>> {
        self.records
    }
}

impl<V: Send + 'static> RecordsBuilder<V> {
    /// Build and feed the records into a new input stream.
    pub fn stream(self) -> Result<RecordStream<V>> {
        from_vec(self.records)
    }
}
