//! Fuzz target for single VOC annotation documents.
//!
//! Run with:
//!   cargo +nightly fuzz run voc_xml_parse

#![no_main]

use dataset_analyzer::ir::io_voc_xml::from_voc_xml_slice;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = from_voc_xml_slice(data);
});
