//! Stats report types and terminal formatting.
//!
//! This module provides the four structured dataset reports. Each can be
//! rendered as text (Display) or serialized as JSON.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Inner width of a rendered section box, in characters.
const BOX_WIDTH: usize = 59;
const BAR_WIDTH: usize = 20;
/// Heatmap shades from empty to full.
const SHADES: [char; 5] = [' ', '░', '▒', '▓', '█'];

/// Dataset-level counts.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DatasetStats {
    pub total_images: usize,
    pub total_annotations: usize,
    /// Distinct class names that appear in at least one annotation.
    pub total_classes: usize,
    /// Rounded to 2 decimal places.
    pub avg_boxes_per_image: f64,
    /// Images with no annotations.
    pub empty_images: usize,
    /// Sorted by count descending; ties keep first-seen order.
    pub class_distribution: Vec<ClassCount>,
}

/// A single entry in the class distribution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassCount {
    pub class_name: String,
    pub count: usize,
}

/// Bounding box size and shape statistics, measured in pixels.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BoxStats {
    /// Box area histogram, each bin as a 0-100 share of the fullest bin.
    pub size_distribution: Vec<u32>,
    /// Aspect ratio (width / height) histogram over ratios in range.
    pub aspect_ratio_distribution: Vec<u32>,
    /// Area below 32x32.
    pub small_count: usize,
    /// Area below 96x96.
    pub medium_count: usize,
    pub large_count: usize,
    /// Width or height below 16, regardless of size bucket.
    pub tiny_boxes: usize,
    pub boxes_per_image: BoxesPerImage,
}

/// Spread of annotation counts across images.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct BoxesPerImage {
    pub min: usize,
    pub max: usize,
    /// Rounded to 1 decimal place.
    pub avg: f64,
    /// Truncated to an integer.
    pub median: usize,
}

/// Image dimension, file format and brightness statistics.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ImageStats {
    pub min_width: u32,
    pub max_width: u32,
    pub min_height: u32,
    pub max_height: u32,
    pub avg_width: f64,
    pub avg_height: f64,
    /// Lower-cased file extension to image count.
    pub formats: BTreeMap<String, usize>,
    /// Colour mode to count, over the sampled images only.
    pub color_modes: BTreeMap<String, usize>,
    pub brightness_mean: f64,
    pub brightness_std: f64,
}

/// Where box centers fall and how close boxes sit to the image edges.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SpatialStats {
    /// Row-major grid (`heatmap[row][col]`), scaled so the hottest cell is 1.0.
    pub heatmap: Vec<Vec<f64>>,
    pub edge_proximity: EdgeProximity,
    /// One independently scaled grid per class.
    pub per_class_heatmaps: BTreeMap<String, Vec<Vec<f64>>>,
}

/// Percentage of boxes in each edge bucket. Buckets are exclusive.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct EdgeProximity {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
    pub center: f64,
}

/// All four reports together.
#[derive(Clone, Debug, Serialize)]
pub struct AnalysisReport {
    pub overview: DatasetStats,
    pub boxes: BoxStats,
    pub images: ImageStats,
    pub spatial: SpatialStats,
}

impl fmt::Display for AnalysisReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(
            f,
            "╭─────────────────────────────────────────────────────────────╮"
        )?;
        writeln!(
            f,
            "│                📊  Dataset Analysis Report                  │"
        )?;
        writeln!(
            f,
            "╰─────────────────────────────────────────────────────────────╯"
        )?;
        writeln!(f)?;

        write!(f, "{}", self.overview)?;
        writeln!(f)?;
        write!(f, "{}", self.boxes)?;
        writeln!(f)?;
        write!(f, "{}", self.images)?;
        writeln!(f)?;
        write!(f, "{}", self.spatial)
    }
}

impl fmt::Display for DatasetStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_header(f, "Overview")?;
        fmt_row(f, &format!("Images:        {:>8}", format_number(self.total_images)))?;
        fmt_row(
            f,
            &format!("Annotations:   {:>8}", format_number(self.total_annotations)),
        )?;
        fmt_row(f, &format!("Classes:       {:>8}", format_number(self.total_classes)))?;
        fmt_row(f, &format!("Boxes/image:   {:>8.2}", self.avg_boxes_per_image))?;
        fmt_row(
            f,
            &format!(
                "Empty images:  {:>8} ({})",
                format_number(self.empty_images),
                fmt_percent(self.empty_images, self.total_images)
            ),
        )?;
        fmt_blank(f)?;

        if self.class_distribution.is_empty() {
            fmt_row(f, "No annotations found.")?;
        } else {
            let max_count = self
                .class_distribution
                .iter()
                .map(|entry| entry.count)
                .max()
                .unwrap_or(1);
            for entry in &self.class_distribution {
                fmt_row(
                    f,
                    &format!(
                        "{:<16} {:>7} {:>6}  {}",
                        truncate_label(&entry.class_name, 16),
                        format_number(entry.count),
                        fmt_percent(entry.count, self.total_annotations),
                        render_bar(entry.count, max_count, BAR_WIDTH)
                    ),
                )?;
            }
        }
        fmt_footer(f)
    }
}

impl fmt::Display for BoxStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total = self.small_count + self.medium_count + self.large_count;

        fmt_header(f, "Bounding Boxes")?;
        if total == 0 {
            fmt_row(f, "No bounding boxes found.")?;
            return fmt_footer(f);
        }

        for (label, count) in [
            ("Small  (<32²)", self.small_count),
            ("Medium (<96²)", self.medium_count),
            ("Large", self.large_count),
            ("Tiny   (<16px)", self.tiny_boxes),
        ] {
            fmt_row(
                f,
                &format!(
                    "{:<16} {:>7} {:>6}  {}",
                    label,
                    format_number(count),
                    fmt_percent(count, total),
                    render_bar(count, total, BAR_WIDTH)
                ),
            )?;
        }
        fmt_blank(f)?;

        let bpi = &self.boxes_per_image;
        fmt_row(
            f,
            &format!(
                "Boxes/image:    min {}  max {}  avg {:.1}  median {}",
                bpi.min, bpi.max, bpi.avg, bpi.median
            ),
        )?;
        fmt_blank(f)?;
        fmt_row(
            f,
            &format!("Area:          {}", render_sparkline(&self.size_distribution)),
        )?;
        fmt_row(
            f,
            &format!(
                "Aspect ratio:  {}",
                render_sparkline(&self.aspect_ratio_distribution)
            ),
        )?;
        fmt_footer(f)
    }
}

impl fmt::Display for ImageStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_header(f, "Images")?;
        fmt_row(
            f,
            &format!(
                "Width  (px):   min {:>6}  max {:>6}  avg {:>8.1}",
                self.min_width, self.max_width, self.avg_width
            ),
        )?;
        fmt_row(
            f,
            &format!(
                "Height (px):   min {:>6}  max {:>6}  avg {:>8.1}",
                self.min_height, self.max_height, self.avg_height
            ),
        )?;
        fmt_blank(f)?;
        fmt_row(f, &format!("Formats:       {}", join_counts(&self.formats)))?;
        fmt_row(f, &format!("Color modes:   {}", join_counts(&self.color_modes)))?;
        fmt_row(
            f,
            &format!(
                "Brightness:    mean {:.1}  std {:.1}",
                self.brightness_mean, self.brightness_std
            ),
        )?;
        fmt_footer(f)
    }
}

impl fmt::Display for SpatialStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_header(f, "Spatial")?;
        fmt_row(f, "Box center heatmap:")?;
        for row in &self.heatmap {
            let cells: String = row.iter().flat_map(|&v| [shade(v), shade(v)]).collect();
            fmt_row(f, &format!("  │{cells}│"))?;
        }
        fmt_blank(f)?;

        let edge = &self.edge_proximity;
        fmt_row(f, "Edge proximity:")?;
        for (label, pct) in [
            ("top", edge.top),
            ("bottom", edge.bottom),
            ("left", edge.left),
            ("right", edge.right),
            ("center", edge.center),
        ] {
            fmt_row(f, &format!("  {:<8} {:>5.1}%", label, pct))?;
        }

        if !self.per_class_heatmaps.is_empty() {
            fmt_blank(f)?;
            fmt_row(
                f,
                &format!("Per-class heatmaps: {}", self.per_class_heatmaps.len()),
            )?;
        }
        fmt_footer(f)
    }
}

fn fmt_header(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    let used = title.chars().count() + 3;
    writeln!(
        f,
        "┌─ {} {}┐",
        title,
        "─".repeat(BOX_WIDTH.saturating_sub(used))
    )?;
    fmt_blank(f)
}

fn fmt_footer(f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fmt_blank(f)?;
    writeln!(f, "└{}┘", "─".repeat(BOX_WIDTH))
}

fn fmt_blank(f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "│{}│", " ".repeat(BOX_WIDTH))
}

/// Writes one indented row, padded to the box width.
fn fmt_row(f: &mut fmt::Formatter<'_>, content: &str) -> fmt::Result {
    let padding = BOX_WIDTH.saturating_sub(content.chars().count() + 3);
    writeln!(f, "│   {}{}│", content, " ".repeat(padding))
}

/// Format a number with thousands separators.
fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Format a percentage, handling zero denominators.
fn fmt_percent(numerator: usize, denominator: usize) -> String {
    if denominator == 0 {
        "n/a".to_string()
    } else {
        format!("{:.1}%", (numerator as f64 / denominator as f64) * 100.0)
    }
}

/// Render a horizontal bar using Unicode block characters.
fn render_bar(count: usize, max_count: usize, width: usize) -> String {
    if max_count == 0 || width == 0 {
        return String::new();
    }

    let filled = ((count * width) / max_count).min(width);
    "█".repeat(filled) + &"░".repeat(width - filled)
}

/// One character per histogram bin, height from the 0-100 bin value.
fn render_sparkline(bins: &[u32]) -> String {
    const LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    bins.iter()
        .map(|&v| LEVELS[(v.min(100) as usize * (LEVELS.len() - 1)) / 100])
        .collect()
}

fn shade(value: f64) -> char {
    let scaled = (value.clamp(0.0, 1.0) * (SHADES.len() - 1) as f64).round() as usize;
    SHADES[scaled.min(SHADES.len() - 1)]
}

fn join_counts(counts: &BTreeMap<String, usize>) -> String {
    if counts.is_empty() {
        return "-".to_string();
    }
    counts
        .iter()
        .map(|(key, count)| {
            let key = if key.is_empty() { "(none)" } else { key };
            format!("{key} {}", format_number(*count))
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Truncate a label to fit in the display column.
fn truncate_label(label: &str, max_len: usize) -> String {
    if label.chars().count() <= max_len {
        label.to_string()
    } else {
        let head: String = label.chars().take(max_len - 1).collect();
        format!("{head}…")
    }
}
