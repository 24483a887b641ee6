use anyhow::{Result, bail};
use kvflow::testing::*;
use kvflow::*;
use std::collections::HashMap;

#[test]
fn sums_unit_counts_per_key() -> Result<()> {
    let input = from_vec(sample_counts())?;
    let out = map_reduce(input, identity(), 2, sum_values(), 2)?.collect_checked()?;

    assert_records_unordered_equal(
        &out,
        &[Record::new("a", 3), Record::new("b", 2), Record::new("c", 1)],
    );
    Ok(())
}

#[test]
fn empty_input_closes_output() -> Result<()> {
    let input = from_vec(Vec::<Record<u64>>::new())?;
    let out = map_reduce(input, identity(), 3, sum_values(), 4)?.collect_checked()?;
    assert!(out.is_empty());
    Ok(())
}

#[test]
fn sorted_totals_come_out_in_key_order() -> Result<()> {
    let input = from_vec(sample_counts())?;
    let out: Vec<_> = sorted_map_reduce(input, identity(), 2, sum_values(), 2, by_key)?.collect();

    assert_records_equal(
        &out,
        &[Record::new("a", 3), Record::new("b", 2), Record::new("c", 1)],
    );
    Ok(())
}

#[test]
fn identity_pipeline_conserves_records() -> Result<()> {
    let records = RecordsBuilder::new()
        .add_cycled(&["k1", "k2", "k3", "k4", "k5"], 200, |i| i as u32)
        .add_repeated("dup", 7, 10)
        .build();

    let input = from_vec(records.clone())?;
    let out = map_reduce(input, identity(), 4, passthrough(), 3)?.collect_checked()?;

    assert_records_unordered_equal(&out, &records);
    Ok(())
}

#[test]
fn every_key_is_reduced_exactly_once() -> Result<()> {
    let records = RecordsBuilder::new()
        .add_cycled(&["a", "b", "c", "d", "e", "f", "g"], 140, |_| 1u64)
        .build();

    let input = from_vec(records)?;
    let out = map_reduce(input, identity(), 3, count_values(), 5)?.collect_checked()?;

    assert_eq!(out.len(), 7);
    let mut seen = HashMap::new();
    for record in &out {
        assert!(seen.insert(record.key().to_string(), *record.value()).is_none());
    }
    assert!(seen.values().all(|&n| n == 20));
    Ok(())
}

#[test]
fn word_count_over_lines() -> Result<()> {
    let input = from_vec(sample_lines())?;
    let out: Vec<_> = sorted_map_reduce(input, split_words, 3, sum_values(), 2, by_key)?.collect();

    assert_keys_non_decreasing(&out);
    let counts: HashMap<_, _> = out.iter().map(|r| (r.key().to_string(), *r.value())).collect();
    assert_eq!(counts["the"], 3);
    assert_eq!(counts["dog"], 3);
    assert_eq!(counts["fox"], 2);
    assert_eq!(counts["a"], 2);
    assert_eq!(counts["lazy"], 1);
    Ok(())
}

#[test]
fn map_can_emit_many_or_none() -> Result<()> {
    let input = from_vec(vec![
        Record::new("x", 3u32),
        Record::new("y", 0),
        Record::new("z", 2),
    ])?;
    let repeat = |record: Record<u32>, out: &RecordSender<u32>| -> Result<()> {
        for _ in 0..*record.value() {
            out.emit(record.key(), 1)?;
        }
        Ok(())
    };

    let out: Vec<_> = sorted_map_reduce(input, repeat, 2, sum_values(), 2, by_key)?.collect();
    assert_records_equal(&out, &[Record::new("x", 3), Record::new("z", 2)]);
    Ok(())
}

#[test]
fn ready_made_transforms_compose() -> Result<()> {
    let input = from_vec(
        RecordsBuilder::new()
            .add_pairs([("a", 1i64), ("b", -2), ("a", 5), ("c", 4), ("b", 3)])
            .build(),
    )?;
    let positive_doubled = |record: Record<i64>, out: &RecordSender<i64>| -> Result<()> {
        if *record.value() > 0 {
            out.send(record.map_value(|v| v * 2))?;
        }
        Ok(())
    };

    let mut out: Vec<_> = sorted_map_reduce(input, positive_doubled, 2, collect_values(), 2, by_key)?.collect();
    for record in &mut out {
        // arrival order within a key is not fixed
        *record = record.clone().map_value(|mut v| {
            v.sort_unstable();
            v
        });
    }
    assert_records_equal(
        &out,
        &[
            Record::new("a", vec![2, 10]),
            Record::new("b", vec![6]),
            Record::new("c", vec![8]),
        ],
    );
    Ok(())
}

#[test]
fn filter_and_map_values() -> Result<()> {
    let input = from_vec(sample_counts())?;
    let runner = Runner::default().with_map_workers(2).with_reduce_workers(2);
    let only_a = runner.map_reduce(input, filter_records(|r: &Record<u64>| r.key() == "a"), count_values())?;
    assert_records_equal(&only_a.collect_checked()?, &[Record::new("a", 3)]);

    let input = from_vec(sample_counts())?;
    let scaled = runner.sorted_map_reduce(input, map_values(|v: u64| v * 10), sum_values(), by_key)?;
    assert_records_equal(
        &scaled.collect::<Vec<_>>(),
        &[Record::new("a", 30), Record::new("b", 20), Record::new("c", 10)],
    );
    Ok(())
}

#[test]
fn zero_workers_are_rejected() {
    let err = map_reduce(from_vec(sample_counts()).unwrap(), identity(), 0, sum_values(), 2).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::InvalidWorkerCount { stage: Stage::Map, count: 0 })
    ));

    let err = map_reduce(from_vec(sample_counts()).unwrap(), identity(), 2, sum_values(), 0).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::InvalidWorkerCount { stage: Stage::Reduce, .. })
    ));
}

#[test]
fn failing_map_surfaces_on_checked_receive() -> Result<()> {
    let input = from_vec(sample_counts())?;
    let reject_c = |record: Record<u64>, out: &RecordSender<u64>| -> Result<()> {
        if record.key() == "c" {
            bail!("refusing key c");
        }
        out.send(record)
    };

    let err = map_reduce(input, reject_c, 2, sum_values(), 2)?
        .collect_checked()
        .unwrap_err();
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::WorkerFailed { worker, message }) => {
            assert_eq!(worker.stage(), Stage::Map);
            assert!(message.contains("refusing key c"));
        }
        other => panic!("expected a worker failure, got {other:?}"),
    }
    Ok(())
}

#[test]
fn panicking_reducer_surfaces_on_checked_receive() -> Result<()> {
    let input = from_vec(sample_counts())?;
    // drains everything first so the map stage finishes cleanly
    let explode = |input: RecordStream<u64>, _out: &RecordSender<u64>| -> Result<()> {
        let b_records = input.filter(|r| r.key() == "b").count();
        if b_records > 0 {
            panic!("reducer blew up on b ({b_records} records)");
        }
        Ok(())
    };

    let mut out = map_reduce(input, identity(), 2, explode, 1)?;
    let err = out.recv_checked().unwrap_err();
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::WorkerFailed { worker, message }) => {
            assert_eq!(*worker, WorkerId::new(Stage::Reduce, 0));
            assert!(message.contains("blew up"));
        }
        other => panic!("expected a worker failure, got {other:?}"),
    }
    // the failure sticks
    assert!(out.recv_checked().is_err());
    Ok(())
}

#[test]
fn sorted_run_reports_worker_failure() -> Result<()> {
    let input = from_vec(sample_counts())?;
    let fail = |_: Record<u64>, _: &RecordSender<u64>| -> Result<()> { bail!("nope") };
    let err = sorted_map_reduce(input, fail, 1, sum_values(), 1, by_key).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::WorkerFailed { .. })
    ));
    Ok(())
}

#[test]
fn dropped_output_stops_the_input_side() -> Result<()> {
    let (tx, input) = channel::<u64>(0);
    let out = map_reduce(input, identity(), 2, passthrough(), 3)?;
    drop(out);

    // distinct keys so every partition notices the closed output
    let mut rejected = false;
    for i in 0..1_000_000u64 {
        if tx.emit(format!("key-{i}"), i).is_err() {
            rejected = true;
            break;
        }
    }
    assert!(rejected, "input kept accepting records after the output was dropped");
    Ok(())
}
