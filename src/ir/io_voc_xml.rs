//! Pascal VOC XML reader.
//!
//! This module supports the common VOC layout with an `Annotations/` directory
//! containing one XML file per image, an image directory (`JPEGImages/`,
//! `images/` or `imgs/`) and optional split lists under `ImageSets/Main/`.
//! Corner boxes in pixels are normalized to the model's top-left form.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::Node;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::format::DatasetFormat;
use super::model::{BoundingBox, Dataset, ImageInfo};
use super::{BBoxXYWH, Pixel};
use crate::error::AnalyzerError;

const VOC_XML_EXTENSION: &str = "xml";
const ANNOTATIONS_DIR: &str = "Annotations";
const IMAGE_DIR_CANDIDATES: [&str; 3] = ["JPEGImages", "images", "imgs"];
const SPLIT_LIST_DIR: [&str; 2] = ["ImageSets", "Main"];
const KNOWN_SPLITS: [&str; 4] = ["train", "val", "test", "trainval"];
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];
const UNKNOWN_CLASS: &str = "unknown";
/// Declared encodings whose bytes map one-to-one onto Unicode code points.
const LATIN1_LABELS: [&str; 5] = ["iso-8859-1", "iso8859-1", "latin-1", "latin1", "l1"];

/// Returns true if `root` has an `Annotations/` directory holding `*.xml`
/// files, or (without one) any `*.xml` file anywhere below it.
pub fn detect_voc_dir(root: &Path) -> bool {
    if !root.is_dir() {
        return false;
    }
    let annotations_dir = root.join(ANNOTATIONS_DIR);
    if annotations_dir.exists() {
        return fs::read_dir(&annotations_dir)
            .map(|entries| {
                entries
                    .filter_map(Result::ok)
                    .any(|entry| has_xml_extension(&entry.path()))
            })
            .unwrap_or(false);
    }

    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .any(|entry| entry.file_type().is_file() && has_xml_extension(entry.path()))
}

/// Read a Pascal VOC dataset directory.
///
/// XML files are read from `Annotations/` when present, otherwise from the
/// root itself (non-recursive), in file name order. Files that fail to parse
/// or carry no usable `<size>` are skipped with a warning.
pub fn read_voc_dir(root: &Path) -> Result<Dataset, AnalyzerError> {
    let mut dataset = Dataset::new(root, DatasetFormat::Voc);

    let annotations_dir = {
        let candidate = root.join(ANNOTATIONS_DIR);
        if candidate.exists() {
            candidate
        } else {
            root.to_path_buf()
        }
    };
    let images_dir = find_images_dir(root);
    let split_by_id = load_split_lists(root, &mut dataset);

    for xml_path in collect_xml_files(&annotations_dir)? {
        let parsed = match parse_voc_xml(&xml_path) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!("skipping annotation file: {err}");
                continue;
            }
        };

        let id = xml_path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let filepath = resolve_image_path(&images_dir, &parsed.filename, &id);
        let split = split_by_id.get(&id).cloned();

        let mut image = ImageInfo::new(
            id,
            parsed.filename,
            filepath,
            parsed.width,
            parsed.height,
        )
        .with_split(split);

        for object in parsed.objects {
            dataset.register_class(&object.name);
            let Some([xmin, ymin, xmax, ymax]) = object.corners else {
                continue;
            };
            let bbox = BBoxXYWH::<Pixel>::from_xyxy(xmin, ymin, xmax, ymax)
                .to_normalized(f64::from(parsed.width), f64::from(parsed.height));
            image.annotations.push(BoundingBox::new(bbox, object.name));
        }

        dataset.insert_image(image);
    }

    info!(
        "read VOC dataset {}: {} image(s), {} annotation(s), {} class(es)",
        root.display(),
        dataset.images().len(),
        dataset.total_annotations(),
        dataset.classes().len()
    );

    Ok(dataset)
}

/// Parse a single VOC XML document from a string (for fuzzing/testing).
pub fn from_voc_xml_str(xml: &str) -> Result<(), AnalyzerError> {
    let _ = parse_voc_xml_str(xml, Path::new("<memory>"))?;
    Ok(())
}

/// Parse a single VOC XML document from bytes (for fuzzing/testing).
///
/// Input must be UTF-8 or declare a Latin-1 encoding; anything else is
/// rejected with a [`AnalyzerError::VocXmlParse`] error.
pub fn from_voc_xml_slice(bytes: &[u8]) -> Result<(), AnalyzerError> {
    let path = Path::new("<memory>");
    let xml = decode_xml_bytes(bytes, path)?;
    let _ = parse_voc_xml_str(&xml, path)?;
    Ok(())
}

#[derive(Debug)]
struct ParsedVocAnnotation {
    filename: String,
    width: u32,
    height: u32,
    objects: Vec<ParsedVocObject>,
}

#[derive(Debug)]
struct ParsedVocObject {
    name: String,
    /// `None` when the object has no `<bndbox>` or a coordinate is not a number.
    corners: Option<[f64; 4]>,
}

fn find_images_dir(root: &Path) -> PathBuf {
    IMAGE_DIR_CANDIDATES
        .iter()
        .map(|name| root.join(name))
        .find(|path| path.exists())
        .unwrap_or_else(|| root.to_path_buf())
}

/// Maps image id to split name. Lists are read in file name order, so an id
/// listed in several files ends up in the last one.
fn load_split_lists(root: &Path, dataset: &mut Dataset) -> HashMap<String, String> {
    let list_dir = SPLIT_LIST_DIR
        .iter()
        .fold(root.to_path_buf(), |path, part| path.join(part));
    let mut split_by_id = HashMap::new();

    let Ok(entries) = fs::read_dir(&list_dir) else {
        return split_by_id;
    };
    let mut list_files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some("txt"))
        .collect();
    list_files.sort();

    for list_path in list_files {
        let Some(split_name) = list_path.file_stem().and_then(|stem| stem.to_str()) else {
            continue;
        };
        if !KNOWN_SPLITS.contains(&split_name) {
            continue;
        }

        let content = match fs::read_to_string(&list_path) {
            Ok(content) => content,
            Err(err) => {
                warn!("cannot read split list {}: {err}", list_path.display());
                continue;
            }
        };

        dataset.register_split(split_name);
        for image_id in content.lines().filter_map(|line| line.split_whitespace().next()) {
            split_by_id.insert(image_id.to_string(), split_name.to_string());
        }
        debug!("loaded split list {}", list_path.display());
    }

    split_by_id
}

/// Literal filename first, then `<id>` with each known image extension, then
/// a best-guess path that may not exist.
fn resolve_image_path(images_dir: &Path, filename: &str, id: &str) -> PathBuf {
    let direct = (!filename.is_empty()).then(|| images_dir.join(filename));
    let by_id = IMAGE_EXTENSIONS
        .iter()
        .map(|ext| images_dir.join(format!("{id}.{ext}")));

    direct
        .clone()
        .into_iter()
        .chain(by_id)
        .find(|candidate| candidate.exists())
        .unwrap_or_else(|| direct.unwrap_or_else(|| images_dir.join(format!("{id}.jpg"))))
}

fn collect_xml_files(dir: &Path) -> Result<Vec<PathBuf>, AnalyzerError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|err| AnalyzerError::DirectoryTraversal {
        path: dir.to_path_buf(),
        message: err.to_string(),
    })? {
        let path = entry.map_err(AnalyzerError::Io)?.path();
        if path.is_file() && has_xml_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn parse_voc_xml(path: &Path) -> Result<ParsedVocAnnotation, AnalyzerError> {
    let bytes = fs::read(path).map_err(|err| AnalyzerError::VocXmlParse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;
    let xml = decode_xml_bytes(&bytes, path)?;
    parse_voc_xml_str(&xml, path)
}

/// UTF-8 passes through; Latin-1 (by declaration) is widened byte by byte.
fn decode_xml_bytes<'a>(bytes: &'a [u8], path: &Path) -> Result<Cow<'a, str>, AnalyzerError> {
    let utf8_err = match std::str::from_utf8(bytes) {
        Ok(xml) => return Ok(Cow::Borrowed(xml)),
        Err(err) => err,
    };

    match declared_encoding(bytes) {
        Some(encoding) if LATIN1_LABELS.contains(&encoding.to_ascii_lowercase().as_str()) => {
            Ok(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect()))
        }
        Some(encoding) => Err(AnalyzerError::VocXmlParse {
            path: path.to_path_buf(),
            message: format!("unsupported encoding '{encoding}' ({utf8_err})"),
        }),
        None => Err(AnalyzerError::VocXmlParse {
            path: path.to_path_buf(),
            message: format!("input is not valid UTF-8 and declares no encoding: {utf8_err}"),
        }),
    }
}

/// The `encoding` pseudo-attribute of a leading `<?xml ...?>` declaration.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(256)]);
    let decl = head.strip_prefix("<?xml")?;
    let decl = &decl[..decl.find("?>")?];
    let value = decl[decl.find("encoding")? + "encoding".len()..]
        .trim_start()
        .strip_prefix('=')?
        .trim_start();
    let quote = value.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &value[1..];
    Some(value[..value.find(quote)?].to_string())
}

fn parse_voc_xml_str(xml: &str, path: &Path) -> Result<ParsedVocAnnotation, AnalyzerError> {
    let document =
        roxmltree::Document::parse(xml).map_err(|source| AnalyzerError::VocXmlParse {
            path: path.to_path_buf(),
            message: source.to_string(),
        })?;

    let annotation = document.root_element();
    let filename = optional_child_text(annotation, "filename").unwrap_or_default();

    let size = child_element(annotation, "size").ok_or_else(|| AnalyzerError::VocXmlParse {
        path: path.to_path_buf(),
        message: "missing <size> element".to_string(),
    })?;
    let width = parse_dimension(size, "width", path)?;
    let height = parse_dimension(size, "height", path)?;
    if width == 0 || height == 0 {
        return Err(AnalyzerError::VocXmlParse {
            path: path.to_path_buf(),
            message: format!("image size {width}x{height} has a zero dimension"),
        });
    }

    let mut objects = Vec::new();
    for object in annotation
        .children()
        .filter(|node| node.is_element() && node.tag_name().name() == "object")
    {
        let name =
            optional_child_text(object, "name").unwrap_or_else(|| UNKNOWN_CLASS.to_string());
        let corners = child_element(object, "bndbox").and_then(|bndbox| {
            let corners = parse_corners(bndbox);
            if corners.is_none() {
                warn!(
                    "skipping <object> '{name}' in {}: invalid <bndbox> coordinate",
                    path.display()
                );
            }
            corners
        });
        objects.push(ParsedVocObject { name, corners });
    }

    Ok(ParsedVocAnnotation {
        filename,
        width,
        height,
        objects,
    })
}

/// Missing dimension tags read as zero.
fn parse_dimension(size: Node<'_, '_>, tag: &str, path: &Path) -> Result<u32, AnalyzerError> {
    let Some(raw) = optional_child_text(size, tag) else {
        return Ok(0);
    };
    raw.parse::<u32>().map_err(|_| AnalyzerError::VocXmlParse {
        path: path.to_path_buf(),
        message: format!("invalid <{tag}> value '{raw}' in <size>; expected u32"),
    })
}

/// Missing coordinate tags read as zero; unparseable ones void the box.
fn parse_corners(bndbox: Node<'_, '_>) -> Option<[f64; 4]> {
    let mut corners = [0.0; 4];
    for (slot, tag) in corners.iter_mut().zip(["xmin", "ymin", "xmax", "ymax"]) {
        if let Some(raw) = optional_child_text(bndbox, tag) {
            *slot = raw.parse::<f64>().ok().filter(|value| value.is_finite())?;
        }
    }
    Some(corners)
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}

fn has_xml_extension(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some(VOC_XML_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_XML: &str = r#"
<annotation>
  <filename>img1.jpg</filename>
  <size><width>100</width><height>100</height><depth>3</depth></size>
  <object>
    <name>person</name>
    <bndbox><xmin>10</xmin><ymin>10</ymin><xmax>50</xmax><ymax>60</ymax></bndbox>
  </object>
  <object>
    <name>dog</name>
  </object>
  <object>
    <bndbox><xmin>0</xmin><ymin>0</ymin><xmax>1</xmax><ymax>1</ymax></bndbox>
  </object>
</annotation>
"#;

    fn write_xml(dir: &Path, stem: &str, xml: &str) {
        fs::create_dir_all(dir).expect("create annotations dir");
        fs::write(dir.join(format!("{stem}.xml")), xml).expect("write xml");
    }

    #[test]
    fn parse_voc_xml_reads_objects() {
        let parsed = parse_voc_xml_str(SAMPLE_XML, Path::new("sample.xml")).expect("parse xml");

        assert_eq!(parsed.filename, "img1.jpg");
        assert_eq!((parsed.width, parsed.height), (100, 100));
        assert_eq!(parsed.objects.len(), 3);
        assert_eq!(parsed.objects[0].corners, Some([10.0, 10.0, 50.0, 60.0]));
        assert_eq!(parsed.objects[1].name, "dog");
        assert_eq!(parsed.objects[1].corners, None);
        assert_eq!(parsed.objects[2].name, "unknown");
    }

    #[test]
    fn parse_voc_xml_rejects_missing_or_zero_size() {
        let no_size = "<annotation><filename>a.jpg</filename></annotation>";
        assert!(parse_voc_xml_str(no_size, Path::new("a.xml")).is_err());

        let zero = "<annotation><size><width>0</width><height>10</height></size></annotation>";
        assert!(parse_voc_xml_str(zero, Path::new("a.xml")).is_err());

        let missing_height = "<annotation><size><width>10</width></size></annotation>";
        assert!(parse_voc_xml_str(missing_height, Path::new("a.xml")).is_err());
    }

    #[test]
    fn parse_corners_voids_box_on_bad_number() {
        let xml = "<bndbox><xmin>abc</xmin><ymin>0</ymin><xmax>1</xmax><ymax>1</ymax></bndbox>";
        let doc = roxmltree::Document::parse(xml).expect("parse xml");
        assert_eq!(parse_corners(doc.root_element()), None);

        let xml = "<bndbox><xmax>4</xmax><ymax>2</ymax></bndbox>";
        let doc = roxmltree::Document::parse(xml).expect("parse xml");
        assert_eq!(parse_corners(doc.root_element()), Some([0.0, 0.0, 4.0, 2.0]));
    }

    #[test]
    fn from_voc_xml_slice_rejects_invalid_utf8() {
        let err = from_voc_xml_slice(&[0xff, 0xfe]).unwrap_err();
        assert!(matches!(err, AnalyzerError::VocXmlParse { .. }));
    }

    #[test]
    fn latin1_declaration_is_decoded() {
        let mut xml = b"<?xml version='1.0' encoding='ISO-8859-1'?>\n<annotation><filename>caf".to_vec();
        xml.push(0xe9);
        xml.extend_from_slice(b".jpg</filename><size><width>4</width><height>4</height></size></annotation>");

        let decoded = decode_xml_bytes(&xml, Path::new("a.xml")).expect("decode latin-1");
        let parsed = parse_voc_xml_str(&decoded, Path::new("a.xml")).expect("parse");
        assert_eq!(parsed.filename, "caf\u{e9}.jpg");
    }

    #[test]
    fn other_declared_encodings_are_named_in_the_error() {
        let mut xml = b"<?xml version=\"1.0\" encoding=\"windows-1252\"?><annotation>".to_vec();
        xml.push(0x93);
        xml.extend_from_slice(b"</annotation>");

        let err = decode_xml_bytes(&xml, Path::new("a.xml")).unwrap_err();
        assert!(err.to_string().contains("unsupported encoding 'windows-1252'"));
    }

    #[test]
    fn detect_is_false_for_a_plain_file() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let file = temp.path().join("one.xml");
        fs::write(&file, SAMPLE_XML).expect("write xml");
        assert!(!detect_voc_dir(&file));
        assert!(detect_voc_dir(temp.path()));
    }

    #[test]
    fn detect_checks_annotations_dir_only_when_present() {
        let temp = tempfile::tempdir().expect("create temp dir");
        fs::create_dir_all(temp.path().join("Annotations")).expect("create annotations");
        fs::create_dir_all(temp.path().join("other")).expect("create other");
        fs::write(temp.path().join("other/a.xml"), "<annotation/>").expect("write xml");
        assert!(!detect_voc_dir(temp.path()));

        fs::remove_dir(temp.path().join("Annotations")).expect("remove annotations");
        assert!(detect_voc_dir(temp.path()));
    }

    #[test]
    fn resolve_image_path_order() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let images = temp.path();

        assert_eq!(
            resolve_image_path(images, "", "a"),
            images.join("a.jpg")
        );
        assert_eq!(
            resolve_image_path(images, "missing.jpg", "a"),
            images.join("missing.jpg")
        );

        fs::write(images.join("a.png"), b"").expect("write png");
        assert_eq!(
            resolve_image_path(images, "missing.jpg", "a"),
            images.join("a.png")
        );

        fs::write(images.join("missing.jpg"), b"").expect("write jpg");
        assert_eq!(
            resolve_image_path(images, "missing.jpg", "a"),
            images.join("missing.jpg")
        );
    }

    #[test]
    fn read_voc_dir_normalizes_and_assigns_splits() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let root = temp.path();
        write_xml(&root.join("Annotations"), "img1", SAMPLE_XML);
        write_xml(&root.join("Annotations"), "broken", "<annotation>");
        fs::create_dir_all(root.join("JPEGImages")).expect("create images");
        fs::create_dir_all(root.join("ImageSets/Main")).expect("create splits");
        fs::write(root.join("ImageSets/Main/train.txt"), "img1\n").expect("write train");
        fs::write(root.join("ImageSets/Main/val.txt"), "img1 1\n\n").expect("write val");
        fs::write(root.join("ImageSets/Main/aeroplane_train.txt"), "img1 1\n")
            .expect("write class list");

        let dataset = read_voc_dir(root).expect("read voc dataset");

        assert_eq!(dataset.images().len(), 1);
        assert_eq!(dataset.splits(), ["train", "val"]);
        assert_eq!(dataset.classes(), ["person", "dog", "unknown"]);

        let image = dataset.image("img1").expect("image present");
        assert_eq!(image.split.as_deref(), Some("val"));
        assert_eq!(image.filepath, root.join("JPEGImages/img1.jpg"));
        assert_eq!(image.annotations.len(), 2);

        let person = &image.annotations[0];
        assert!((person.x - 0.1).abs() < 1e-12);
        assert!((person.y - 0.1).abs() < 1e-12);
        assert!((person.width - 0.4).abs() < 1e-12);
        assert!((person.height - 0.5).abs() < 1e-12);
    }
}
