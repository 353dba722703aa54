//! Fuzz target for COCO annotation documents.
//!
//! Feeds arbitrary bytes through the in-memory COCO reader, including the
//! per-entry skipping and box normalization that follow a successful parse.
//!
//! Run with:
//!   cargo +nightly fuzz run coco_json_parse

#![no_main]

use dataset_analyzer::ir::io_coco_json::from_coco_slice;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // 10MB is generous for a single annotation file.
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    if let Ok(dataset) = from_coco_slice(data) {
        for image in dataset.images() {
            assert!(image.width > 0 && image.height > 0);
            for ann in &image.annotations {
                assert!(ann.x >= 0.0 && ann.y >= 0.0);
                assert!(ann.width >= 0.0 && ann.height >= 0.0);
            }
        }
    }
});
