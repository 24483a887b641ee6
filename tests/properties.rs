use kvflow::testing::*;
use kvflow::*;
use proptest::prelude::*;
use std::collections::HashMap;

fn records_strategy() -> impl Strategy<Value = Vec<Record<u32>>> {
    prop::collection::vec(("[a-f]{1,2}", 0u32..1000), 0..120)
        .prop_map(|pairs| pairs.into_iter().map(Record::from).collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn identity_pipeline_conserves_multiset(
        records in records_strategy(),
        map_workers in 1usize..5,
        reduce_workers in 1usize..5,
        capacity in 0usize..4,
    ) {
        let runner = Runner::default()
            .with_map_workers(map_workers)
            .with_reduce_workers(reduce_workers)
            .with_channel_capacity(capacity);
        let out = runner
            .map_reduce(from_vec(records.clone()).unwrap(), identity(), passthrough())
            .unwrap()
            .collect_checked()
            .unwrap();
        assert_records_unordered_equal(&out, &records);
    }

    #[test]
    fn totals_match_sequential_sum(
        records in records_strategy(),
        map_workers in 1usize..5,
        reduce_workers in 1usize..6,
    ) {
        let mut expected: HashMap<String, u64> = HashMap::new();
        for r in &records {
            *expected.entry(r.key().to_string()).or_default() += u64::from(*r.value());
        }

        let input = from_vec(records.into_iter().map(|r| r.map_value(u64::from)).collect()).unwrap();
        let out: Vec<_> = sorted_map_reduce(input, identity(), map_workers, sum_values(), reduce_workers, by_key)
            .unwrap()
            .collect();

        assert_keys_non_decreasing(&out);
        prop_assert_eq!(out.len(), expected.len());
        for record in &out {
            prop_assert_eq!(Some(record.value()), expected.get(record.key()));
        }
    }

    #[test]
    fn partition_is_stable_and_in_range(key in ".{0,16}", partitions in 1usize..64) {
        let p = partition_for(&key, partitions);
        prop_assert!(p < partitions);
        prop_assert_eq!(p, partition_for(&key, partitions));
    }
}
