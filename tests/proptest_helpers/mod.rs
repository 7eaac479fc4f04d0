#![allow(dead_code)]

use chrono::{DateTime, NaiveDateTime};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};
use wprdc::{Snapshot, Table};

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Cell text including the characters CSV has to quote.
pub fn arb_cell() -> BoxedStrategy<String> {
    "[A-Za-z0-9 ,.\"'-]{1,12}".boxed()
}

pub fn arb_header() -> BoxedStrategy<String> {
    "[A-Z][A-Z0-9_]{0,10}".boxed()
}

/// A rectangular table with up to `max_columns` columns and `max_rows` rows.
pub fn arb_table(max_columns: usize, max_rows: usize) -> BoxedStrategy<Table> {
    prop::collection::vec(arb_header(), 1..=max_columns)
        .prop_flat_map(move |headers| {
            let width = headers.len();
            let rows =
                prop::collection::vec(prop::collection::vec(arb_cell(), width), 0..=max_rows);
            (Just(headers), rows)
        })
        .prop_map(|(headers, rows)| Table::new(headers, rows).expect("rectangular by construction"))
        .boxed()
}

/// Any instant between 2000 and 2100, down to the nanosecond.
pub fn arb_timestamp() -> BoxedStrategy<NaiveDateTime> {
    (946_684_800i64..4_102_444_800i64, 0u32..1_000_000_000)
        .prop_map(|(secs, nanos)| {
            DateTime::from_timestamp(secs, nanos)
                .expect("in range")
                .naive_utc()
        })
        .boxed()
}

pub fn arb_snapshot(max_columns: usize, max_rows: usize) -> BoxedStrategy<Snapshot> {
    (arb_timestamp(), arb_table(max_columns, max_rows))
        .prop_map(|(last_updated, table)| Snapshot {
            last_updated,
            table,
        })
        .boxed()
}
