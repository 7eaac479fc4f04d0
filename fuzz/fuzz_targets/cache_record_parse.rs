//! Fuzz target for cache record decoding.

#![no_main]

use libfuzzer_sys::fuzz_target;
use wprdc::cache::from_cache_slice;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_cache_slice(data);
});
