//! COCO-style dataset reader.
//!
//! A COCO dataset directory holds one or more JSON annotation files, either
//! under `annotations/` or at the top level. Each file becomes one split,
//! named after the file stem with the conventional `instances_` and
//! `_annotations` affixes removed.
//!
//! # COCO Format Reference
//!
//! COCO bounding boxes use `[x, y, width, height]` where `(x, y)` is the
//! top-left corner in absolute pixels. The reader divides each component by
//! the owning image's width or height.
//!
//! A file that fails to open or parse is skipped, as is any single image,
//! category or annotation entry that lacks required fields. The rest of the
//! dataset still loads.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::format::DatasetFormat;
use super::model::{BoundingBox, Dataset, ImageInfo};
use super::{BBoxXYWH, Pixel};
use crate::error::AnalyzerError;

const ANNOTATIONS_DIR: &str = "annotations";
const JSON_EXTENSION: &str = "json";
const IMAGE_DIR_CANDIDATES: [&str; 6] = ["images", "train", "val", "test", "train2017", "val2017"];
const SPLIT_AFFIXES: [&str; 2] = ["instances_", "_annotations"];
const UNKNOWN_CLASS: &str = "unknown";

// ============================================================================
// COCO Schema Types (internal to this module)
// ============================================================================

/// Top-level COCO file. Entries stay as raw JSON so that one malformed entry
/// costs only itself.
#[derive(Debug, Deserialize)]
struct CocoFile {
    #[serde(default)]
    images: Vec<serde_json::Value>,

    #[serde(default)]
    annotations: Vec<serde_json::Value>,

    #[serde(default)]
    categories: Vec<serde_json::Value>,
}

/// COCO ids are usually integers, but string ids show up in exported data.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(untagged)]
enum CocoId {
    Int(i64),
    Text(String),
}

impl fmt::Display for CocoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CocoId::Int(id) => write!(f, "{id}"),
            CocoId::Text(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CocoCategory {
    id: CocoId,
    name: String,
}

#[derive(Debug, Deserialize)]
struct CocoImage {
    id: CocoId,
    file_name: String,
    width: f64,
    height: f64,
}

#[derive(Debug, Deserialize)]
struct CocoAnnotation {
    image_id: CocoId,
    category_id: CocoId,

    /// COCO bbox format: [x, y, width, height] with (x,y) as top-left corner
    bbox: [f64; 4],

    /// Score/confidence for detection results
    #[serde(default)]
    score: Option<f64>,
}

// ============================================================================
// Public API
// ============================================================================

/// Returns true if `root` looks like a COCO dataset.
///
/// When `annotations/` exists only its contents are considered; otherwise
/// any top-level `*.json` entry matches.
pub fn detect_coco_dir(root: &Path) -> bool {
    let annotations_dir = root.join(ANNOTATIONS_DIR);
    if annotations_dir.exists() {
        return dir_has_extension(&annotations_dir, JSON_EXTENSION);
    }
    dir_has_extension(root, JSON_EXTENSION)
}

/// Reads a COCO dataset directory.
///
/// # Errors
/// Returns an error only if the directory holding the annotation files
/// cannot be listed. Bad files and entries are logged and skipped.
pub fn read_coco_dir(root: &Path) -> Result<Dataset, AnalyzerError> {
    let annotation_files = find_annotation_files(root)?;
    let images_dir = find_images_dir(root);
    let image_subdirs = list_subdirectories(&images_dir);

    let mut dataset = Dataset::new(root, DatasetFormat::Coco);
    let mut category_names: HashMap<CocoId, String> = HashMap::new();

    for ann_path in annotation_files {
        let coco = match read_coco_file(&ann_path) {
            Ok(coco) => coco,
            Err(err) => {
                warn!("skipping annotation file {}: {err}", ann_path.display());
                continue;
            }
        };

        let split = split_name(&ann_path);
        dataset.register_split(&split);

        let layout = ImageLayout {
            images_dir: &images_dir,
            subdirs: &image_subdirs,
            split: &split,
        };
        merge_coco_file(&mut dataset, &mut category_names, coco, &ann_path, &layout);
    }

    info!(
        "read COCO dataset {}: {} image(s), {} annotation(s)",
        root.display(),
        dataset.images().len(),
        dataset.total_annotations()
    );

    Ok(dataset)
}

/// Reads a single COCO annotation document from a string.
///
/// Image paths are resolved against the current directory and the split is
/// named `memory`. Useful for testing without a dataset tree.
pub fn from_coco_str(json: &str) -> Result<Dataset, AnalyzerError> {
    from_coco_slice(json.as_bytes())
}

/// Reads a single COCO annotation document from bytes.
pub fn from_coco_slice(bytes: &[u8]) -> Result<Dataset, AnalyzerError> {
    let memory_path = Path::new("<memory>");
    let coco: CocoFile =
        serde_json::from_slice(bytes).map_err(|source| AnalyzerError::CocoJsonParse {
            path: memory_path.to_path_buf(),
            source,
        })?;

    let mut dataset = Dataset::new(".", DatasetFormat::Coco);
    dataset.register_split("memory");
    let layout = ImageLayout {
        images_dir: Path::new(""),
        subdirs: &[],
        split: "memory",
    };
    merge_coco_file(
        &mut dataset,
        &mut HashMap::new(),
        coco,
        memory_path,
        &layout,
    );
    Ok(dataset)
}

// ============================================================================
// Conversion: COCO -> normalized model
// ============================================================================

/// Where to look for the image files referenced by one annotation file.
struct ImageLayout<'a> {
    images_dir: &'a Path,
    subdirs: &'a [PathBuf],
    split: &'a str,
}

fn read_coco_file(path: &Path) -> Result<CocoFile, AnalyzerError> {
    let file = File::open(path).map_err(AnalyzerError::Io)?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).map_err(|source| AnalyzerError::CocoJsonParse {
        path: path.to_path_buf(),
        source,
    })
}

fn merge_coco_file(
    dataset: &mut Dataset,
    category_names: &mut HashMap<CocoId, String>,
    coco: CocoFile,
    ann_path: &Path,
    layout: &ImageLayout<'_>,
) {
    // Categories accumulate across files; later files may rename an id.
    for category in parse_entries::<CocoCategory>(coco.categories, ann_path, "category") {
        dataset.register_class(&category.name);
        category_names.insert(category.id, category.name);
    }

    let mut images: Vec<ImageInfo> = Vec::new();
    let mut image_index: HashMap<CocoId, usize> = HashMap::new();

    for image in parse_entries::<CocoImage>(coco.images, ann_path, "image") {
        let (Some(width), Some(height)) = (dimension(image.width), dimension(image.height)) else {
            warn!(
                "skipping image {} in {}: invalid size {}x{}",
                image.id,
                ann_path.display(),
                image.width,
                image.height
            );
            continue;
        };

        let filepath = resolve_image_path(layout, &image.file_name);
        let info = ImageInfo::new(image.id.to_string(), image.file_name, filepath, width, height)
            .with_split(Some(layout.split.to_string()));

        image_index.insert(image.id, images.len());
        images.push(info);
    }

    for ann in parse_entries::<CocoAnnotation>(coco.annotations, ann_path, "annotation") {
        let Some(&idx) = image_index.get(&ann.image_id) else {
            debug!(
                "annotation in {} references unknown image {}",
                ann_path.display(),
                ann.image_id
            );
            continue;
        };
        let image = &mut images[idx];

        let [x, y, w, h] = ann.bbox;
        let bbox = BBoxXYWH::<Pixel>::from_xywh(x, y, w, h)
            .to_normalized(image.width as f64, image.height as f64);

        let class_name = category_names
            .get(&ann.category_id)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_CLASS.to_string());

        image
            .annotations
            .push(BoundingBox::new(bbox, class_name).with_confidence(ann.score));
    }

    for image in images {
        dataset.insert_image(image);
    }
}

fn parse_entries<T: DeserializeOwned>(
    raw: Vec<serde_json::Value>,
    path: &Path,
    kind: &str,
) -> Vec<T> {
    raw.into_iter()
        .filter_map(|value| match serde_json::from_value::<T>(value) {
            Ok(entry) => Some(entry),
            Err(source) => {
                warn!("skipping malformed {kind} in {}: {source}", path.display());
                None
            }
        })
        .collect()
}

/// Accepts whole, positive pixel sizes (`640` or `640.0`).
fn dimension(raw: f64) -> Option<u32> {
    let valid = raw.is_finite() && raw >= 1.0 && raw.fract() == 0.0 && raw <= u32::MAX as f64;
    valid.then_some(raw as u32)
}

fn split_name(ann_path: &Path) -> String {
    let stem = ann_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    SPLIT_AFFIXES
        .iter()
        .fold(stem, |name, affix| name.replace(affix, ""))
}

// ============================================================================
// Layout discovery
// ============================================================================

fn find_annotation_files(root: &Path) -> Result<Vec<PathBuf>, AnalyzerError> {
    let annotations_dir = root.join(ANNOTATIONS_DIR);
    let search_dir = if annotations_dir.exists() {
        annotations_dir
    } else {
        root.to_path_buf()
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(&search_dir).map_err(AnalyzerError::Io)? {
        let path = entry.map_err(AnalyzerError::Io)?.path();
        if path.is_file() && has_extension(&path, JSON_EXTENSION) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn find_images_dir(root: &Path) -> PathBuf {
    IMAGE_DIR_CANDIDATES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.exists())
        .unwrap_or_else(|| root.to_path_buf())
}

/// Candidate order: images root, split-named subdirectory, then every
/// immediate subdirectory. Falls back to the images-root path even when it
/// does not exist.
fn resolve_image_path(layout: &ImageLayout<'_>, file_name: &str) -> PathBuf {
    let direct = layout.images_dir.join(file_name);

    let candidates = [direct.clone(), layout.images_dir.join(layout.split).join(file_name)]
        .into_iter()
        .chain(layout.subdirs.iter().map(|dir| dir.join(file_name)));

    first_existing(candidates).unwrap_or(direct)
}

fn first_existing(candidates: impl IntoIterator<Item = PathBuf>) -> Option<PathBuf> {
    candidates.into_iter().find(|candidate| candidate.exists())
}

fn list_subdirectories(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut subdirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_dir())
        .collect();
    subdirs.sort();
    subdirs
}

fn dir_has_extension(dir: &Path, extension: &str) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries
        .filter_map(|entry| entry.ok())
        .any(|entry| has_extension(&entry.path(), extension))
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext == extension)
        .unwrap_or(false)
}

// ============================================================================
// Tests
// ============================================================================
