//! Fuzz target for canonical dataset JSON parsing.
//!
//! Deserialization runs every geometry and category invariant check, so
//! this exercises the validating representations as well as serde_json.

#![no_main]

use libfuzzer_sys::fuzz_target;
use annox::ir::io_json::from_json_slice;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_json_slice(data);
});
