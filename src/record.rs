//! The unit of data flowing through a pipeline.
//!
//! A [`Record`] is an immutable `(key, value)` pair. Keys are plain strings and
//! are *not* unique across a stream: many records sharing a key is the normal
//! case, since the reduce stage groups work by key.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An immutable key/value pair.
///
/// Fields are private so a record cannot be changed after construction;
/// take it apart with [`Record::into_parts`] to build a new one.
///
/// ```
/// use kvflow::Record;
///
/// let r = Record::new("apple", 3);
/// assert_eq!(r.key(), "apple");
/// assert_eq!(*r.value(), 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Record<V> {
    key: String,
    value: V,
}

impl<V> Record<V> {
    /// Build a record from anything string-like and a value.
    pub fn new(key: impl Into<String>, value: V) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }

    /// The record key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The record value.
    #[must_use]
    pub const fn value(&self) -> &V {
        &self.value
    }

    /// Consume the record, returning the value.
    #[must_use]
    pub fn into_value(self) -> V {
        self.value
    }

    /// Consume the record, returning `(key, value)`.
    #[must_use]
    pub fn into_parts(self) -> (String, V) {
        (self.key, self.value)
    }

    /// Build a new record with the same key and a transformed value.
    #[must_use]
    pub fn map_value<O>(self, f: impl FnOnce(V) -> O) -> Record<O> {
        Record {
            key: self.key,
            value: f(self.value),
        }
    }
}

impl<K: Into<String>, V> From<(K, V)> for Record<V> {
    fn from((key, value): (K, V)) -> Self {
        Self::new(key, value)
    }
}

impl<V: fmt::Display> fmt::Display for Record<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.key, self.value)
    }
}
