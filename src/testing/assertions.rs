//! Assertion functions for checking pipeline output.

use crate::record::Record;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

/// Assert that two record sequences are equal, in order.
///
/// # Panics
///
/// Panics if the sequences differ in length or content.
///
/// # Example
///
/// ```
/// use kvflow::Record;
/// use kvflow::testing::assert_records_equal;
///
/// let out = vec![Record::new("a", 1), Record::new("b", 2)];
/// assert_records_equal(&out, &[Record::new("a", 1), Record::new("b", 2)]);
/// ```
pub fn assert_records_equal<V: Debug + PartialEq>(actual: &[Record<V>], expected: &[Record<V>]) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "Record count mismatch:\n  Expected length: {}\n  Actual length: {}\n  Expected: {expected:?}\n  Actual: {actual:?}",
        expected.len(),
        actual.len()
    );

    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        assert_eq!(
            a, e,
            "Record mismatch at index {i}:\n  Expected: {e:?}\n  Actual: {a:?}\n  Full expected: {expected:?}\n  Full actual: {actual:?}"
        );
    }
}

/// Assert that two record collections hold the same multiset of records.
///
/// Duplicates count: `[a, a]` and `[a]` are different.
///
/// # Panics
///
/// Panics listing the missing and surplus records if the multisets differ.
///
/// # Example
///
/// ```
/// use kvflow::Record;
/// use kvflow::testing::assert_records_unordered_equal;
///
/// let out = vec![Record::new("b", 2), Record::new("a", 1), Record::new("a", 1)];
/// assert_records_unordered_equal(
///     &out,
///     &[Record::new("a", 1), Record::new("a", 1), Record::new("b", 2)],
/// );
/// ```
pub fn assert_records_unordered_equal<V: Debug + Eq + Hash>(actual: &[Record<V>], expected: &[Record<V>]) {
    let mut balance: HashMap<&Record<V>, i64> = HashMap::new();
    for r in expected {
        *balance.entry(r).or_insert(0) += 1;
    }
    for r in actual {
        *balance.entry(r).or_insert(0) -= 1;
    }

    let missing: Vec<_> = balance.iter().filter(|(_, n)| **n > 0).collect();
    let extra: Vec<_> = balance.iter().filter(|(_, n)| **n < 0).collect();

    assert!(
        missing.is_empty() && extra.is_empty(),
        "Record multiset mismatch:\n  Missing (record, count): {missing:?}\n  Extra (record, -count): {extra:?}\n  Expected: {expected:?}\n  Actual: {actual:?}"
    );
}

/// Assert that keys never decrease along the sequence.
///
/// # Panics
///
/// Panics at the first adjacent pair whose keys are out of order.
pub fn assert_keys_non_decreasing<V: Debug>(records: &[Record<V>]) {
    for (i, pair) in records.windows(2).enumerate() {
        assert!(
            pair[0].key() <= pair[1].key(),
            "Keys out of order at index {}:\n  {:?} before {:?}",
            i + 1,
            pair[0],
            pair[1]
        );
    }
}

/// Assert that every record satisfies `predicate`.
///
/// # Panics
///
/// Panics on the first record that does not.
pub fn assert_all_records<V: Debug>(records: &[Record<V>], predicate: impl Fn(&Record<V>) -> bool) {
    for (i, record) in records.iter().enumerate() {
        assert!(
            predicate(record),
            "Predicate failed for record at index {i}:\n  Record: {record:?}"
        );
    }
}
