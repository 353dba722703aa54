//! Sampled pixel statistics.
//!
//! The first `sample_size` images are decoded to collect colour modes and the
//! grayscale brightness distribution of their pooled pixels. Images that
//! fail to open or decode are skipped.
//!
//! Indexed (palette) PNGs are reported as mode `P`. The decoder expands them
//! to RGB(A) before we see the pixels, so the mode comes from the file's
//! `IHDR` header instead. Palette BMPs are expanded the same way and are
//! reported as `RGB`.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use image::{ColorType, DynamicImage, ImageReader};
use tracing::{debug, warn};

use crate::error::AnalyzerError;
use crate::ir::ImageInfo;

/// Brightness reported when no sampled image could be decoded.
pub const FALLBACK_BRIGHTNESS: f64 = 128.0;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'];
/// Signature, IHDR length and tag, width, height, bit depth, then colour type.
const PNG_COLOR_TYPE_OFFSET: usize = 25;
const PNG_COLOR_TYPE_INDEXED: u8 = 3;

/// Result of the sampled pass.
#[derive(Clone, Debug, PartialEq)]
pub struct BrightnessSample {
    pub color_modes: BTreeMap<String, usize>,
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
    pub decoded_images: usize,
}

/// Decodes up to `sample_size` images, in list order.
pub fn sample_brightness(images: &[ImageInfo], sample_size: usize) -> BrightnessSample {
    let mut color_modes = BTreeMap::new();
    let mut gray = GrayAccumulator::default();
    let mut decoded_images = 0;

    for info in images.iter().take(sample_size) {
        let decoded = match decode_image(&info.filepath) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!("skipping brightness sample for '{}': {err}", info.id);
                continue;
            }
        };

        let mode = if is_indexed_png(&info.filepath) {
            "P"
        } else {
            color_mode_name(decoded.color())
        };
        *color_modes.entry(mode.to_string()).or_insert(0) += 1;
        accumulate_gray(&decoded, &mut gray);
        decoded_images += 1;
    }

    debug!(
        "sampled {decoded_images} image(s), {} grayscale pixel(s)",
        gray.count
    );

    let (mean, std) = gray.mean_std().unwrap_or((FALLBACK_BRIGHTNESS, 0.0));
    BrightnessSample {
        color_modes,
        mean,
        std,
        decoded_images,
    }
}

fn decode_image(path: &Path) -> Result<DynamicImage, AnalyzerError> {
    ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(AnalyzerError::Io)?
        .decode()
        .map_err(|source| AnalyzerError::ImageDecode {
            path: path.to_path_buf(),
            source,
        })
}

/// True if `path` is a PNG whose header declares a palette.
fn is_indexed_png(path: &Path) -> bool {
    let mut header = [0u8; PNG_COLOR_TYPE_OFFSET + 1];
    let read = File::open(path).and_then(|mut file| file.read_exact(&mut header));
    read.is_ok()
        && header[..8] == PNG_SIGNATURE
        && &header[12..16] == b"IHDR"
        && header[PNG_COLOR_TYPE_OFFSET] == PNG_COLOR_TYPE_INDEXED
}

/// Short mode names as used by common imaging tools (`L`, `RGB`, ...).
fn color_mode_name(color: ColorType) -> &'static str {
    match color {
        ColorType::L8 => "L",
        ColorType::L16 => "I;16",
        ColorType::La8 | ColorType::La16 => "LA",
        ColorType::Rgba8 | ColorType::Rgba16 | ColorType::Rgba32F => "RGBA",
        _ => "RGB",
    }
}

/// Luma from 8-bit RGB using ITU-R 601-2 weights in 16.16 fixed point.
#[inline]
fn luma_601(r: u8, g: u8, b: u8) -> u8 {
    ((u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471 + 0x8000) >> 16) as u8
}

fn accumulate_gray(image: &DynamicImage, gray: &mut GrayAccumulator) {
    match image {
        DynamicImage::ImageLuma8(buf) => buf.pixels().for_each(|p| gray.push(p.0[0])),
        DynamicImage::ImageLumaA8(buf) => buf.pixels().for_each(|p| gray.push(p.0[0])),
        // 16-bit grayscale saturates rather than rescales.
        DynamicImage::ImageLuma16(buf) => buf
            .pixels()
            .for_each(|p| gray.push(p.0[0].min(255) as u8)),
        other => other
            .to_rgb8()
            .pixels()
            .for_each(|p| gray.push(luma_601(p.0[0], p.0[1], p.0[2]))),
    }
}

/// Exact running sums over 8-bit samples.
#[derive(Debug, Default)]
struct GrayAccumulator {
    count: u128,
    sum: u128,
    sum_sq: u128,
}

impl GrayAccumulator {
    #[inline]
    fn push(&mut self, value: u8) {
        let value = u128::from(value);
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
    }

    fn mean_std(&self) -> Option<(f64, f64)> {
        if self.count == 0 {
            return None;
        }
        let n = self.count as f64;
        let mean = self.sum as f64 / n;
        // n * sum_sq - sum^2 is n^2 times the variance, computed exactly.
        let scaled_var = self.count * self.sum_sq - self.sum * self.sum;
        let std = (scaled_var as f64).sqrt() / n;
        Some((mean, std))
    }
}
