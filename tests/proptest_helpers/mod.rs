#![allow(dead_code)]

use dataset_analyzer::ir::{BBoxXYWH, BoundingBox, ImageInfo, Normalized};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub const CLASS_POOL: [&str; 4] = ["person", "car", "dog", "bicycle"];

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

/// A normalized box that stays inside the unit square.
pub fn arb_box() -> BoxedStrategy<BoundingBox> {
    (0.0f64..0.95, 0.0f64..0.95, 0usize..CLASS_POOL.len())
        .prop_flat_map(|(x, y, class)| {
            (
                Just(x),
                Just(y),
                0.001f64..=(1.0 - x),
                0.001f64..=(1.0 - y),
                Just(class),
            )
        })
        .prop_map(|(x, y, w, h, class)| {
            BoundingBox::new(
                BBoxXYWH::<Normalized>::from_xywh(x, y, w, h),
                CLASS_POOL[class],
            )
        })
        .boxed()
}

/// Images with positive dimensions and up to `max_boxes` boxes each.
pub fn arb_images(max_images: usize, max_boxes: usize) -> BoxedStrategy<Vec<ImageInfo>> {
    prop::collection::vec(
        (
            1u32..4000,
            1u32..4000,
            prop::collection::vec(arb_box(), 0..=max_boxes),
        ),
        0..=max_images,
    )
    .prop_map(|specs| {
        specs
            .into_iter()
            .enumerate()
            .map(|(idx, (width, height, annotations))| {
                let filename = format!("img_{idx}.jpg");
                let mut image = ImageInfo::new(
                    idx.to_string(),
                    filename.clone(),
                    format!("missing/{filename}"),
                    width,
                    height,
                );
                image.annotations = annotations;
                image
            })
            .collect()
    })
    .boxed()
}

pub fn box_count(images: &[ImageInfo]) -> usize {
    images.iter().map(|img| img.annotations.len()).sum()
}
