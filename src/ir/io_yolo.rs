//! Ultralytics-style YOLO reader.
//!
//! This module handles directory-based YOLO datasets with a `labels/` tree,
//! images under `images/` (or the dataset root), and a class list from
//! `classes.txt` or the `names:` key of a sibling YAML file.
//!
//! Label rows are `class_id cx cy w h [confidence]`, normalized and
//! center-relative. They are converted to the top-left form of the model.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::format::DatasetFormat;
use super::model::{BoundingBox, Dataset, ImageInfo};
use super::{BBoxXYWH, Normalized};
use crate::error::AnalyzerError;

const LABELS_DIR: &str = "labels";
const IMAGES_DIR: &str = "images";
const CLASSES_TXT: &str = "classes.txt";
const YAML_EXTENSIONS: [&str; 2] = ["yaml", "yml"];
const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const LABEL_EXTENSION: &str = "txt";
const DEFAULT_SPLIT: &str = "default";
const NAMES_KEY: &str = "names:";

/// Returns true if `root` has a `labels` entry plus a class source
/// (`classes.txt` or any top-level `*.yaml`/`*.yml`).
pub fn detect_yolo_dir(root: &Path) -> bool {
    let has_yaml = !yaml_files(root).is_empty();
    let has_classes = root.join(CLASSES_TXT).exists();
    let has_labels = root.join(LABELS_DIR).exists();
    has_labels && (has_yaml || has_classes)
}

/// Read a YOLO dataset directory.
///
/// Each immediate subdirectory of the images root is a split. When the images
/// root has no subdirectories it is scanned itself and its images get no
/// split. Images whose dimensions cannot be read are skipped; a missing label
/// file means zero annotations.
pub fn read_yolo_dir(root: &Path) -> Result<Dataset, AnalyzerError> {
    let mut dataset = Dataset::new(root, DatasetFormat::Yolo);
    dataset.set_classes(read_class_names(root));

    let labels_dir = root.join(LABELS_DIR);
    let images_dir = {
        let candidate = root.join(IMAGES_DIR);
        if candidate.exists() {
            candidate
        } else {
            root.to_path_buf()
        }
    };

    let mut split_dirs = list_subdirectories(&images_dir)?;
    if split_dirs.is_empty() {
        split_dirs.push(images_dir.clone());
    }

    for split_dir in split_dirs {
        let split_name = if split_dir == images_dir {
            DEFAULT_SPLIT.to_string()
        } else {
            file_name_string(&split_dir)
        };
        if split_name != IMAGES_DIR {
            dataset.register_split(&split_name);
        }

        for image_path in collect_image_files(&split_dir)? {
            let (width, height) = match read_image_dimensions(&image_path) {
                Ok(dims) => dims,
                Err(err) => {
                    warn!("skipping image: {err}");
                    continue;
                }
            };

            let id = image_path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            let split = (split_name != DEFAULT_SPLIT).then(|| split_name.clone());
            let mut image = ImageInfo::new(
                id,
                file_name_string(&image_path),
                image_path.clone(),
                width,
                height,
            )
            .with_split(split);

            if let Some(label_path) = find_label_file(&labels_dir, &image_path, &split_name) {
                read_label_file(&label_path, &mut image, &mut dataset);
            }

            dataset.insert_image(image);
        }
    }

    info!(
        "read YOLO dataset {}: {} image(s), {} annotation(s), {} class(es)",
        root.display(),
        dataset.images().len(),
        dataset.total_annotations(),
        dataset.classes().len()
    );

    Ok(dataset)
}

#[derive(Debug, PartialEq)]
struct YoloLabelRow {
    class_id: usize,
    cx: f64,
    cy: f64,
    w: f64,
    h: f64,
    confidence: Option<f64>,
}

// ============================================================================
// Class list
// ============================================================================

/// `classes.txt` wins; otherwise the first YAML file with a usable `names:`
/// key. An empty result means names are made up from ids while reading.
fn read_class_names(root: &Path) -> Vec<String> {
    let classes_txt = root.join(CLASSES_TXT);
    if classes_txt.exists() {
        match fs::read_to_string(&classes_txt) {
            Ok(data) => {
                return data
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(ToOwned::to_owned)
                    .collect();
            }
            Err(err) => warn!("cannot read {}: {err}", classes_txt.display()),
        }
    }

    for yaml_path in yaml_files(root) {
        let content = match fs::read_to_string(&yaml_path) {
            Ok(content) => content,
            Err(err) => {
                warn!("cannot read {}: {err}", yaml_path.display());
                continue;
            }
        };
        if !content.contains(NAMES_KEY) {
            continue;
        }

        if let Some(names) = parse_inline_names(&content) {
            return names;
        }
        let names = parse_dash_list_names(&content);
        if !names.is_empty() {
            return names;
        }
    }

    Vec::new()
}

/// Matches `names:` followed by optional whitespace and a bracketed list
/// that closes on the same line, e.g. `names: ['cat', "dog"]`.
fn parse_inline_names(content: &str) -> Option<Vec<String>> {
    let mut search_from = 0;
    while let Some(offset) = content[search_from..].find(NAMES_KEY) {
        let key_start = search_from + offset;
        let after_key = content[key_start + NAMES_KEY.len()..].trim_start();

        if let Some(list) = after_key.strip_prefix('[') {
            if let Some(end) = list.find(['\n', ']']) {
                if list[end..].starts_with(']') {
                    let names = list[..end].split(',').map(str::trim).map(strip_quotes);
                    return Some(fill_blank_names(names));
                }
            }
        }

        search_from = key_start + 1;
    }
    None
}

/// Reads the indented `- name` lines that follow a `names:` line, stopping at
/// the next unindented, non-empty line.
fn parse_dash_list_names(content: &str) -> Vec<String> {
    let mut in_names = false;
    let mut names = Vec::new();

    for line in content.split('\n') {
        if line.contains(NAMES_KEY) {
            in_names = true;
            continue;
        }
        if !in_names {
            continue;
        }

        let stripped = line.trim();
        if stripped.starts_with('-') {
            let name = stripped.trim_start_matches(|c| c == '-' || c == ' ');
            names.push(strip_quotes(name));
        } else if !stripped.is_empty() && !line.starts_with(' ') {
            break;
        }
    }

    fill_blank_names(names.into_iter())
}

fn strip_quotes(raw: &str) -> &str {
    raw.trim_matches(|c| c == '\'' || c == '"')
}

/// Blank entries keep their index but get a `class_{id}` name.
fn fill_blank_names<'a>(names: impl Iterator<Item = &'a str>) -> Vec<String> {
    names
        .enumerate()
        .map(|(index, name)| {
            if name.is_empty() {
                placeholder_class(index)
            } else {
                name.to_string()
            }
        })
        .collect()
}

fn placeholder_class(class_id: usize) -> String {
    format!("class_{}", class_id)
}

// ============================================================================
// Labels
// ============================================================================

/// Candidate order: `labels/<split>/`, `labels/`, `labels/<split>/` next to
/// the image's grandparent, then beside the image itself.
fn find_label_file(labels_dir: &Path, image_path: &Path, split: &str) -> Option<PathBuf> {
    let stem = image_path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    let label_name = format!("{stem}.{LABEL_EXTENSION}");

    let mut candidates = vec![
        labels_dir.join(split).join(&label_name),
        labels_dir.join(&label_name),
    ];
    if let Some(grandparent) = image_path.parent().and_then(Path::parent) {
        candidates.push(grandparent.join(LABELS_DIR).join(split).join(&label_name));
    }
    candidates.push(image_path.with_extension(LABEL_EXTENSION));

    candidates.into_iter().find(|candidate| candidate.exists())
}

fn read_label_file(label_path: &Path, image: &mut ImageInfo, dataset: &mut Dataset) {
    let content = match fs::read_to_string(label_path) {
        Ok(content) => content,
        Err(err) => {
            warn!("cannot read label file {}: {err}", label_path.display());
            return;
        }
    };

    for (line_idx, line) in content.lines().enumerate() {
        let row = match parse_label_line(line, label_path, line_idx + 1) {
            Ok(Some(row)) => row,
            Ok(None) => continue,
            Err(err) => {
                warn!("skipping label row: {err}");
                continue;
            }
        };

        // Ids past the declared list are appended under a placeholder name,
        // so later rows with the next id resolve to that placeholder.
        let class_name = dataset
            .classes()
            .get(row.class_id)
            .cloned()
            .unwrap_or_else(|| placeholder_class(row.class_id));
        dataset.register_class(&class_name);

        let bbox = BBoxXYWH::<Normalized>::from_cxcywh(row.cx, row.cy, row.w, row.h);
        image
            .annotations
            .push(BoundingBox::new(bbox, class_name).with_confidence(row.confidence));
    }
}

/// Rows with fewer than five fields are ignored. Unparseable or non-finite
/// numbers are an error for that row only.
fn parse_label_line(
    line: &str,
    file_path: &Path,
    line_num: usize,
) -> Result<Option<YoloLabelRow>, AnalyzerError> {
    // Take at most 6 tokens so pathological inputs do not allocate unbounded memory.
    let tokens: Vec<&str> = line.split_whitespace().take(6).collect();
    if tokens.len() < 5 {
        return Ok(None);
    }

    let class_id = tokens[0]
        .parse::<usize>()
        .map_err(|_| AnalyzerError::YoloLabelParse {
            path: file_path.to_path_buf(),
            line: line_num,
            message: format!(
                "invalid class_id '{}'; expected non-negative integer",
                tokens[0]
            ),
        })?;

    let cx = parse_f64_token(tokens[1], "x_center", file_path, line_num)?;
    let cy = parse_f64_token(tokens[2], "y_center", file_path, line_num)?;
    let w = parse_f64_token(tokens[3], "width", file_path, line_num)?;
    let h = parse_f64_token(tokens[4], "height", file_path, line_num)?;
    let confidence = tokens
        .get(5)
        .map(|raw| parse_f64_token(raw, "confidence", file_path, line_num))
        .transpose()?;

    Ok(Some(YoloLabelRow {
        class_id,
        cx,
        cy,
        w,
        h,
        confidence,
    }))
}

/// Fuzz-only entrypoint for YOLO single-line parsing.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_label_line(input: &str) -> Result<(), AnalyzerError> {
    let _ = parse_label_line(input, Path::new("<fuzz>"), 1)?;
    Ok(())
}

fn parse_f64_token(
    raw: &str,
    field_name: &str,
    file_path: &Path,
    line_num: usize,
) -> Result<f64, AnalyzerError> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| AnalyzerError::YoloLabelParse {
            path: file_path.to_path_buf(),
            line: line_num,
            message: format!("invalid {field_name} '{raw}'; expected finite number"),
        })
}

// ============================================================================
// Filesystem helpers
// ============================================================================

fn read_image_dimensions(path: &Path) -> Result<(u32, u32), AnalyzerError> {
    let size = imagesize::size(path).map_err(|source| AnalyzerError::ImageDimensionRead {
        path: path.to_path_buf(),
        source,
    })?;

    let width: u32 = size.width.try_into().unwrap_or(0);
    let height: u32 = size.height.try_into().unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(AnalyzerError::ImageDimensionRead {
            path: path.to_path_buf(),
            source: imagesize::ImageError::CorruptedImage,
        });
    }

    Ok((width, height))
}

/// All `*.jpg`, then `*.jpeg`, then `*.png` directly inside `dir`, each group
/// sorted by name.
fn collect_image_files(dir: &Path) -> Result<Vec<PathBuf>, AnalyzerError> {
    let mut entries: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).map_err(AnalyzerError::Io)? {
        let path = entry.map_err(AnalyzerError::Io)?.path();
        if path.is_file() {
            entries.push(path);
        }
    }
    entries.sort();

    let mut files = Vec::with_capacity(entries.len());
    for ext in IMAGE_EXTENSIONS {
        files.extend(
            entries
                .iter()
                .filter(|path| extension_str(path) == Some(ext))
                .cloned(),
        );
    }
    Ok(files)
}

fn yaml_files(root: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(root) else {
        return Vec::new();
    };
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file())
        .collect();
    paths.sort();

    YAML_EXTENSIONS
        .iter()
        .flat_map(|ext| {
            paths
                .iter()
                .filter(move |path| extension_str(path) == Some(ext))
                .cloned()
        })
        .collect()
}

fn list_subdirectories(dir: &Path) -> Result<Vec<PathBuf>, AnalyzerError> {
    let mut subdirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(AnalyzerError::Io)? {
        let path = entry.map_err(AnalyzerError::Io)?.path();
        if path.is_dir() {
            subdirs.push(path);
        }
    }
    subdirs.sort();
    Ok(subdirs)
}

fn extension_str(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(path: &Path, width: u32, height: u32) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        image::RgbImage::new(width, height)
            .save(path)
            .expect("write png file");
    }

    fn create_basic_layout(root: &Path) {
        fs::create_dir_all(root.join("images/train")).expect("create images dir");
        fs::create_dir_all(root.join("labels/train")).expect("create labels dir");
    }

    #[test]
    fn parse_label_line_accepts_valid_rows() {
        let parsed = parse_label_line("2 0.5 0.25 0.3 0.1", Path::new("a.txt"), 1)
            .expect("parse should succeed")
            .expect("line should produce a row");

        assert_eq!(
            parsed,
            YoloLabelRow {
                class_id: 2,
                cx: 0.5,
                cy: 0.25,
                w: 0.3,
                h: 0.1,
                confidence: None,
            }
        );
    }

    #[test]
    fn parse_label_line_reads_confidence() {
        let parsed = parse_label_line("0 0.5 0.5 0.2 0.2 0.9", Path::new("a.txt"), 1)
            .expect("parse should succeed")
            .expect("line should produce a row");
        assert_eq!(parsed.confidence, Some(0.9));
    }

    #[test]
    fn parse_label_line_skips_short_rows() {
        let parsed = parse_label_line("0 0.1 0.2", Path::new("a.txt"), 3).expect("no error");
        assert!(parsed.is_none());

        let parsed = parse_label_line("   ", Path::new("a.txt"), 2).expect("no error");
        assert!(parsed.is_none());
    }

    #[test]
    fn parse_label_line_rejects_bad_numbers() {
        let err = parse_label_line("x 0.1 0.2 0.3 0.4", Path::new("a.txt"), 4).unwrap_err();
        assert!(matches!(err, AnalyzerError::YoloLabelParse { line: 4, .. }));

        let err = parse_label_line("0 nan 0.2 0.3 0.4", Path::new("a.txt"), 5).unwrap_err();
        assert!(matches!(err, AnalyzerError::YoloLabelParse { .. }));
    }

    #[test]
    fn inline_names_are_parsed() {
        let yaml = "path: ../data\nnames: ['cat', \"dog\", bird]\nnc: 3\n";
        assert_eq!(
            parse_inline_names(yaml),
            Some(vec!["cat".to_string(), "dog".to_string(), "bird".to_string()])
        );
    }

    #[test]
    fn inline_names_must_close_on_one_line() {
        let yaml = "names: [cat,\n  dog]\n";
        assert_eq!(parse_inline_names(yaml), None);
    }

    #[test]
    fn dash_list_names_stop_at_next_key() {
        let yaml = "train: images/train\nnames:\n  - cat\n  - 'dog'\n\n  - \"bird\"\nnc: 3\n  - ignored\n";
        assert_eq!(parse_dash_list_names(yaml), vec!["cat", "dog", "bird"]);
    }

    #[test]
    fn blank_names_get_placeholders() {
        let yaml = "names: [cat, '', dog]";
        assert_eq!(
            parse_inline_names(yaml),
            Some(vec![
                "cat".to_string(),
                "class_1".to_string(),
                "dog".to_string()
            ])
        );
    }

    #[test]
    fn classes_txt_wins_over_yaml() {
        let temp = tempfile::tempdir().expect("create temp dir");
        fs::write(temp.path().join("data.yaml"), "names: [a, b]\n").expect("write yaml");
        fs::write(temp.path().join("classes.txt"), "person\n\nbicycle\n").expect("write classes");

        assert_eq!(read_class_names(temp.path()), vec!["person", "bicycle"]);
    }

    #[test]
    fn detect_requires_labels_and_class_source() {
        let temp = tempfile::tempdir().expect("create temp dir");
        fs::write(temp.path().join("data.yml"), "names: [a]\n").expect("write yaml");
        assert!(!detect_yolo_dir(temp.path()));

        fs::create_dir_all(temp.path().join("labels")).expect("create labels");
        assert!(detect_yolo_dir(temp.path()));
    }

    #[test]
    fn find_label_file_prefers_split_dir() {
        let temp = tempfile::tempdir().expect("create temp dir");
        create_basic_layout(temp.path());
        let labels_dir = temp.path().join("labels");
        let image_path = temp.path().join("images/train/a.jpg");

        fs::write(temp.path().join("images/train/a.txt"), "").expect("write sibling");
        assert_eq!(
            find_label_file(&labels_dir, &image_path, "train"),
            Some(temp.path().join("images/train/a.txt"))
        );

        fs::write(labels_dir.join("a.txt"), "").expect("write flat");
        assert_eq!(
            find_label_file(&labels_dir, &image_path, "train"),
            Some(labels_dir.join("a.txt"))
        );

        fs::write(labels_dir.join("train/a.txt"), "").expect("write split");
        assert_eq!(
            find_label_file(&labels_dir, &image_path, "train"),
            Some(labels_dir.join("train/a.txt"))
        );
    }

    #[test]
    fn read_yolo_dir_converts_center_boxes() {
        let temp = tempfile::tempdir().expect("create temp dir");
        create_basic_layout(temp.path());
        write_png(&temp.path().join("images/train/a.png"), 20, 10);
        fs::write(temp.path().join("classes.txt"), "cat\n").expect("write classes");
        fs::write(
            temp.path().join("labels/train/a.txt"),
            "0 0.5 0.5 0.2 0.2\n3 0.5 0.5 0.5 0.5\n",
        )
        .expect("write labels");

        let dataset = read_yolo_dir(temp.path()).expect("read yolo dataset");

        assert_eq!(dataset.splits(), ["train"]);
        assert_eq!(dataset.classes(), ["cat", "class_3"]);

        let image = dataset.image("a").expect("image present");
        assert_eq!((image.width, image.height), (20, 10));
        assert_eq!(image.split.as_deref(), Some("train"));
        assert_eq!(image.annotations.len(), 2);

        let first = &image.annotations[0];
        assert!((first.x - 0.4).abs() < 1e-12);
        assert!((first.y - 0.4).abs() < 1e-12);
        assert_eq!(first.width, 0.2);
        assert_eq!(first.height, 0.2);
        assert_eq!(first.class_name, "cat");
        assert_eq!(first.confidence, None);
        assert_eq!(image.annotations[1].class_name, "class_3");
    }

    #[test]
    fn read_yolo_dir_without_subdirs_uses_default_split() {
        let temp = tempfile::tempdir().expect("create temp dir");
        fs::create_dir_all(temp.path().join("images")).expect("create images");
        fs::create_dir_all(temp.path().join("labels")).expect("create labels");
        write_png(&temp.path().join("images/a.jpg"), 8, 8);
        fs::write(temp.path().join("images/broken.png"), b"not an image").expect("write junk");
        fs::write(temp.path().join("data.yaml"), "names:\n  - cat\n").expect("write yaml");

        let dataset = read_yolo_dir(temp.path()).expect("read yolo dataset");

        assert_eq!(dataset.splits(), ["default"]);
        assert_eq!(dataset.images().len(), 1);
        let image = dataset.image("a").expect("image present");
        assert_eq!(image.split, None);
        assert!(image.annotations.is_empty());
    }
}
