//! Fuzz target for COCO JSON parsing.
//!
//! Feeds arbitrary bytes to the COCO reader, including the segmentation
//! shape dispatch and skeleton translation, looking for panics.
//!
//! Run with:
//!   cargo +nightly fuzz run coco_json_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use annox::ir::io_coco_json::{from_coco_slice, to_coco_string};

fuzz_target!(|data: &[u8]| {
    // 10MB is generous for JSON annotation files.
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    // Anything that loads must also dump.
    if let Ok(dataset) = from_coco_slice(data) {
        let _ = to_coco_string(&dataset);
    }
});
