//! Testing utilities for kvflow pipelines.
//!
//! Pipeline output order is nondeterministic unless the sorted finisher is used,
//! so most checks compare record *multisets*. This module bundles:
//!
//! - **Assertions**: ordered, unordered (multiset) and ordering checks on records
//! - **Builders**: fluent construction of input record sets
//! - **Fixtures**: small canned datasets and transforms
//!
//! # Quick Start
//!
//! ```no_run
//! use kvflow::*;
//! use kvflow::testing::*;
//!
//! #[test]
//! fn sums_per_key() -> anyhow::Result<()> {
//!     let input = RecordsBuilder::new()
//!         .add("a", 1u64)
//!         .add("b", 2)
//!         .add("a", 3)
//!         .stream()?;
//!
//!     let out: Vec<_> = map_reduce(input, identity(), 2, sum_values(), 2)?.collect();
//!
//!     assert_records_unordered_equal(&out, &[Record::new("a", 4), Record::new("b", 2)]);
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod builders;
pub mod fixtures;

pub use assertions::*;
pub use builders::*;
pub use fixtures::*;
