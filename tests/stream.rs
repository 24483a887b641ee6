use anyhow::Result;
use kvflow::{EngineError, Record, TryRecv, channel, from_vec, stream_from_iter};
use std::time::Duration;

#[test]
fn delivers_in_send_order() -> Result<()> {
    let (tx, rx) = channel::<i32>(8);
    for i in 0..5 {
        tx.emit("k", i)?;
    }
    drop(tx);
    let values: Vec<_> = rx.map(Record::into_value).collect();
    assert_eq!(values, vec![0, 1, 2, 3, 4]);
    Ok(())
}

#[test]
fn try_recv_reports_each_state() -> Result<()> {
    let (tx, rx) = channel::<i32>(1);
    assert_eq!(rx.try_recv(), TryRecv::Empty);
    tx.emit("a", 1)?;
    assert_eq!(rx.try_recv(), TryRecv::Record(Record::new("a", 1)));
    drop(tx);
    assert_eq!(rx.try_recv(), TryRecv::Closed);
    Ok(())
}

#[test]
fn send_after_consumer_dropped_fails() {
    let (tx, rx) = channel::<i32>(0);
    drop(rx);
    let err = tx.emit("a", 1).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::StreamClosed)
    ));
}

#[test]
fn recv_timeout_expires_on_idle_stream() {
    let (_tx, rx) = channel::<i32>(0);
    let err = rx.recv_timeout(Duration::from_millis(20)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::Timeout(_))
    ));
}

#[test]
fn recv_timeout_sees_close() -> Result<()> {
    let (tx, rx) = channel::<i32>(0);
    drop(tx);
    assert_eq!(rx.recv_timeout(Duration::from_secs(5))?, None);
    Ok(())
}

#[test]
fn from_vec_streams_everything_then_closes() -> Result<()> {
    let input = vec![Record::new("x", 1), Record::new("y", 2), Record::new("x", 3)];
    let out: Vec<_> = from_vec(input.clone())?.collect();
    assert_eq!(out, input);
    Ok(())
}

#[test]
fn collect_checked_without_failure_channel() -> Result<()> {
    let stream = stream_from_iter((0..10).map(|i| Record::new(format!("k{i}"), i)), 2)?;
    assert_eq!(stream.collect_checked()?.len(), 10);
    Ok(())
}

#[test]
fn dropping_stream_stops_source() -> Result<()> {
    // an endless source must not keep running once nobody reads
    let stream = stream_from_iter((0u64..).map(|i| Record::new("k", i)), 0)?;
    let first: Vec<_> = stream.take(3).collect();
    assert_eq!(first.len(), 3);
    Ok(())
}
