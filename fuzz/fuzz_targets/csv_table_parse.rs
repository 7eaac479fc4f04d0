//! Fuzz target for CSV table parsing.
//!
//! Arbitrary bytes go straight to the CSV reader; anything it accepts must
//! also survive a write back out.

#![no_main]

use libfuzzer_sys::fuzz_target;
use wprdc::table::{from_csv_slice, to_csv_string};

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    if let Ok(table) = from_csv_slice(data, "<fuzz>") {
        let _ = to_csv_string(&table);
    }
});
