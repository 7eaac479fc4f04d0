//! Fuzz target for CKAN `package_show` responses, including the
//! `last_modified` timestamps of every listed resource.

#![no_main]

use libfuzzer_sys::fuzz_target;
use wprdc::catalog::fuzz_parse_package_show;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = fuzz_parse_package_show(data);
});
