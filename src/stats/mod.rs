//! Dataset statistics.
//!
//! Four independent reports computed from a dataset's image list. Each
//! function is deterministic given the images and [`StatsOptions`]; only
//! [`compute_image_stats`] touches the filesystem (to decode sample images).

mod brightness;
mod histogram;
mod report;

pub use brightness::{sample_brightness, BrightnessSample, FALLBACK_BRIGHTNESS};
pub use histogram::{histogram_counts, histogram_percentages, histogram_percentages_within};
pub use report::{
    AnalysisReport, BoxStats, BoxesPerImage, ClassCount, DatasetStats, EdgeProximity, ImageStats,
    SpatialStats,
};

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::ir::ImageInfo;

/// Pixel area below which a box is small (32x32).
const SMALL_AREA: f64 = 32.0 * 32.0;
/// Pixel area below which a box is medium (96x96).
const MEDIUM_AREA: f64 = 96.0 * 96.0;
/// A box is tiny if either side is below this many pixels.
const TINY_SIDE: f64 = 16.0;

/// Options for dataset statistics.
#[derive(Clone, Debug, PartialEq)]
pub struct StatsOptions {
    /// Number of bins in the box area histogram.
    pub size_bins: usize,
    /// Number of bins in the aspect ratio histogram.
    pub aspect_ratio_bins: usize,
    /// Aspect ratios outside this inclusive range are left out of the histogram.
    pub aspect_ratio_range: (f64, f64),
    /// How many images (from the start of the list) are decoded for brightness.
    pub brightness_sample_size: usize,
    /// Heatmap grid is `grid_size` x `grid_size`.
    pub grid_size: usize,
    /// Edge proximity threshold, as a fraction of the image.
    pub edge_threshold: f64,
}

impl Default for StatsOptions {
    fn default() -> Self {
        Self {
            size_bins: 20,
            aspect_ratio_bins: 15,
            aspect_ratio_range: (0.0, 3.0),
            brightness_sample_size: 100,
            grid_size: 10,
            edge_threshold: 0.05,
        }
    }
}

/// Counts, averages and the class distribution.
pub fn compute_dataset_stats(images: &[ImageInfo]) -> DatasetStats {
    let total_annotations: usize = images.iter().map(|img| img.annotations.len()).sum();
    let empty_images = images
        .iter()
        .filter(|img| img.annotations.is_empty())
        .count();

    // Vec keeps first-seen order for tie-breaking.
    let mut class_distribution: Vec<ClassCount> = Vec::new();
    let mut slot_by_class: HashMap<&str, usize> = HashMap::new();
    for ann in images.iter().flat_map(|img| &img.annotations) {
        match slot_by_class.get(ann.class_name.as_str()) {
            Some(&slot) => class_distribution[slot].count += 1,
            None => {
                slot_by_class.insert(&ann.class_name, class_distribution.len());
                class_distribution.push(ClassCount {
                    class_name: ann.class_name.clone(),
                    count: 1,
                });
            }
        }
    }
    class_distribution.sort_by(|a, b| b.count.cmp(&a.count));

    let avg_boxes_per_image = if images.is_empty() {
        0.0
    } else {
        round_dp(total_annotations as f64 / images.len() as f64, 2)
    };

    DatasetStats {
        total_images: images.len(),
        total_annotations,
        total_classes: class_distribution.len(),
        avg_boxes_per_image,
        empty_images,
        class_distribution,
    }
}

/// Size buckets, histograms and boxes-per-image spread, in pixel units.
pub fn compute_box_stats(images: &[ImageInfo], opts: &StatsOptions) -> BoxStats {
    let mut stats = BoxStats::default();
    let mut areas = Vec::new();
    let mut aspect_ratios = Vec::new();
    let mut per_image = Vec::with_capacity(images.len());

    for img in images {
        per_image.push(img.annotations.len());

        for ann in &img.annotations {
            let pixel = ann
                .geometry()
                .to_pixel(f64::from(img.width), f64::from(img.height));
            let area = pixel.area();
            areas.push(area);

            if pixel.height > 0.0 {
                aspect_ratios.extend(pixel.aspect_ratio());
            }
            if pixel.width < TINY_SIDE || pixel.height < TINY_SIDE {
                stats.tiny_boxes += 1;
            }

            if area < SMALL_AREA {
                stats.small_count += 1;
            } else if area < MEDIUM_AREA {
                stats.medium_count += 1;
            } else {
                stats.large_count += 1;
            }
        }
    }

    stats.size_distribution = histogram_percentages(&areas, opts.size_bins);
    stats.aspect_ratio_distribution = histogram_percentages_within(
        &aspect_ratios,
        opts.aspect_ratio_bins,
        opts.aspect_ratio_range,
    );
    stats.boxes_per_image = summarize_counts(per_image);
    stats
}

/// Min, max, mean and truncated median; all zero for no images.
fn summarize_counts(mut counts: Vec<usize>) -> BoxesPerImage {
    if counts.is_empty() {
        return BoxesPerImage::default();
    }
    counts.sort_unstable();

    let n = counts.len();
    let mean = counts.iter().sum::<usize>() as f64 / n as f64;
    let median = if n % 2 == 1 {
        counts[n / 2]
    } else {
        (counts[n / 2 - 1] + counts[n / 2]) / 2
    };

    BoxesPerImage {
        min: counts[0],
        max: counts[n - 1],
        avg: round_dp(mean, 1),
        median,
    }
}

/// Dimension ranges, file formats and sampled brightness.
pub fn compute_image_stats(images: &[ImageInfo], opts: &StatsOptions) -> ImageStats {
    let mut formats: BTreeMap<String, usize> = BTreeMap::new();
    for img in images {
        let ext = Path::new(&img.filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        *formats.entry(ext).or_insert(0) += 1;
    }

    let sample = sample_brightness(images, opts.brightness_sample_size);

    let mean_of = |total: u64| {
        if images.is_empty() {
            0.0
        } else {
            round_dp(total as f64 / images.len() as f64, 1)
        }
    };

    ImageStats {
        min_width: images.iter().map(|img| img.width).min().unwrap_or(0),
        max_width: images.iter().map(|img| img.width).max().unwrap_or(0),
        min_height: images.iter().map(|img| img.height).min().unwrap_or(0),
        max_height: images.iter().map(|img| img.height).max().unwrap_or(0),
        avg_width: mean_of(images.iter().map(|img| u64::from(img.width)).sum()),
        avg_height: mean_of(images.iter().map(|img| u64::from(img.height)).sum()),
        formats,
        color_modes: sample.color_modes,
        brightness_mean: round_dp(sample.mean, 1),
        brightness_std: round_dp(sample.std, 1),
    }
}

/// Box center heatmaps and edge proximity shares.
pub fn compute_spatial_stats(images: &[ImageInfo], opts: &StatsOptions) -> SpatialStats {
    let grid = opts.grid_size;
    let threshold = opts.edge_threshold;

    let mut heatmap = vec![vec![0.0; grid]; grid];
    let mut per_class: BTreeMap<String, Vec<Vec<f64>>> = BTreeMap::new();
    let mut edge_counts = [0usize; 5];
    let mut total_boxes = 0usize;

    for ann in images.iter().flat_map(|img| &img.annotations) {
        total_boxes += 1;

        let bucket = if ann.y < threshold {
            0
        } else if ann.y + ann.height > 1.0 - threshold {
            1
        } else if ann.x < threshold {
            2
        } else if ann.x + ann.width > 1.0 - threshold {
            3
        } else {
            4
        };
        edge_counts[bucket] += 1;

        if grid == 0 {
            continue;
        }
        let center = ann.geometry().center();
        let col = grid_cell(center.x, grid);
        let row = grid_cell(center.y, grid);

        heatmap[row][col] += 1.0;
        per_class
            .entry(ann.class_name.clone())
            .or_insert_with(|| vec![vec![0.0; grid]; grid])[row][col] += 1.0;
    }

    normalize_grid(&mut heatmap);
    for class_grid in per_class.values_mut() {
        normalize_grid(class_grid);
    }

    let pct = |count: usize| {
        if total_boxes == 0 {
            0.0
        } else {
            round_dp(count as f64 / total_boxes as f64 * 100.0, 1)
        }
    };

    SpatialStats {
        heatmap,
        edge_proximity: EdgeProximity {
            top: pct(edge_counts[0]),
            bottom: pct(edge_counts[1]),
            left: pct(edge_counts[2]),
            right: pct(edge_counts[3]),
            center: pct(edge_counts[4]),
        },
        per_class_heatmaps: per_class,
    }
}

/// Cell index for a normalized coordinate; values at or past 1.0 land in the
/// last cell.
#[inline]
fn grid_cell(coord: f64, grid: usize) -> usize {
    ((coord * grid as f64).max(0.0) as usize).min(grid - 1)
}

/// Divides every cell by the grid's maximum, if that maximum is positive.
fn normalize_grid(grid: &mut [Vec<f64>]) {
    let max = grid.iter().flatten().copied().fold(0.0, f64::max);
    if max > 0.0 {
        grid.iter_mut().flatten().for_each(|cell| *cell /= max);
    }
}

/// Rounds to `places` decimal places from the exact binary value.
pub(crate) fn round_dp(value: f64, places: usize) -> f64 {
    if !value.is_finite() {
        return value;
    }
    format!("{value:.places$}").parse().unwrap_or(value)
}
