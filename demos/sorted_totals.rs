//! Per-customer order totals, ranked by amount.
//!
//! Demonstrates:
//! - Building input with the testing builders
//! - A map transform that re-keys records
//! - Sorting the reduced output with a custom comparator
//! - Watching a run with `recv_timeout`
//!
//! Run with: cargo run --example sorted_totals

use anyhow::Result;
use kvflow::testing::RecordsBuilder;
use kvflow::*;
use std::time::Duration;

/// `(customer, amount_in_cents)` keyed by order id.
fn orders() -> Vec<Record<(String, u64)>> {
    let customers = ["alice", "bob", "carol", "dave"];
    RecordsBuilder::new()
        .add_cycled(&["order"], 40, |i| {
            (customers[(i * 7) % customers.len()].to_string(), 250 + (i as u64 * 137) % 4000)
        })
        .build()
        .into_iter()
        .enumerate()
        .map(|(i, r)| Record::new(format!("{}-{i}", r.key()), r.into_value()))
        .collect()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let by_customer = |order: Record<(String, u64)>, out: &RecordSender<u64>| -> Result<()> {
        let (customer, cents) = order.into_value();
        out.emit(customer, cents)
    };
    let runner = Runner::default().with_map_workers(3).with_reduce_workers(2);

    // unsorted, watched with a timeout
    let out = runner.map_reduce(from_vec(orders())?, by_customer, sum_values())?;
    let mut seen = 0;
    while let Some(record) = out.recv_timeout(Duration::from_secs(5))? {
        println!("unsorted  {record}");
        seen += 1;
    }
    println!("{seen} customers\n");

    // ranked, largest total first
    let largest_first = |a: &Record<u64>, b: &Record<u64>| a.value() > b.value();
    let ranked = runner.sorted_map_reduce(from_vec(orders())?, by_customer, sum_values(), largest_first)?;
    for (rank, record) in ranked.enumerate() {
        println!("#{} {:<6} {:>8.2}", rank + 1, record.key(), *record.value() as f64 / 100.0);
    }
    Ok(())
}
