use anyhow::{Result, bail};
use kvflow::testing::*;
use kvflow::*;

#[test]
fn every_input_record_is_mapped_once() -> Result<()> {
    let records = RecordsBuilder::new().add_cycled(&["a", "b", "c"], 90, |i| i as u64).build();
    let (tx, rx) = channel::<u64>(0);

    let handle = run_map_stage(from_vec(records.clone())?, identity(), 4, tx)?;
    assert_eq!(handle.stage(), Stage::Map);
    assert_eq!(handle.worker_count(), 4);

    let out: Vec<_> = rx.collect();
    handle.join()?;
    assert_records_unordered_equal(&out, &records);
    Ok(())
}

#[test]
fn single_worker_preserves_input_order() -> Result<()> {
    let records: Vec<_> = (0..50).map(|i| Record::new(format!("k{}", i % 7), i)).collect();
    let (tx, rx) = channel::<i32>(2);

    let handle = run_map_stage(from_vec(records.clone())?, identity(), 1, tx)?;
    let out: Vec<_> = rx.collect();
    handle.join()?;
    assert_records_equal(&out, &records);
    Ok(())
}

#[test]
fn fan_out_and_filtering() -> Result<()> {
    let (tx, rx) = channel::<u64>(0);
    let spread = |record: Record<u64>, out: &RecordSender<u64>| -> Result<()> {
        // odd values are dropped, even values emitted three times
        if record.value() % 2 == 0 {
            for n in 0..3 {
                out.emit(format!("{}-{n}", record.key()), *record.value())?;
            }
        }
        Ok(())
    };

    let input = from_vec((0..10u64).map(|i| Record::new(format!("r{i}"), i)).collect())?;
    let handle = MapStage::new(3)?.with_channel_capacity(4).run(input, spread, tx)?;
    let out: Vec<_> = rx.collect();
    handle.join()?;

    assert_eq!(out.len(), 15);
    assert_all_records(&out, |r| r.value() % 2 == 0);
    Ok(())
}

#[test]
fn empty_input_closes_output() -> Result<()> {
    let (tx, rx) = channel::<u8>(0);
    let handle = run_map_stage(from_vec(Vec::new())?, identity(), 5, tx)?;
    assert_eq!(rx.count(), 0);
    handle.join()
}

#[test]
fn zero_workers_are_rejected() {
    let err = MapStage::new(0).err().unwrap();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::InvalidWorkerCount { stage: Stage::Map, count: 0 })
    ));
}

#[test]
fn failed_transform_shows_up_on_join() -> Result<()> {
    let (tx, rx) = channel::<u64>(0);
    let picky = |record: Record<u64>, _out: &RecordSender<u64>| -> Result<()> {
        if record.key() == "c" {
            bail!("cannot map {}", record.key());
        }
        Ok(())
    };

    let handle = run_map_stage(from_vec(sample_counts())?, picky, 2, tx)?;
    let err = handle.join().unwrap_err();
    match err.downcast_ref::<EngineError>() {
        Some(EngineError::WorkerFailed { worker, message }) => {
            assert_eq!(worker.stage(), Stage::Map);
            assert!(message.contains("cannot map c"));
        }
        other => panic!("expected a worker failure, got {other:?}"),
    }
    // the failed worker never signalled, so the output stays open
    assert_eq!(rx.try_recv(), TryRecv::Empty);
    Ok(())
}
