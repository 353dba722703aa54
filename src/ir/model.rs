//! Normalized dataset model.
//!
//! Every format reader produces this representation and every statistic
//! consumes it. Boxes are stored as fractions of their image's size with the
//! origin at the top-left corner, whatever the source file used.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use super::bbox::BBoxXYWH;
use super::format::DatasetFormat;
use super::ids::ImageId;
use super::space::Normalized;

/// One annotated object instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge as a fraction of image width.
    pub x: f64,
    /// Top edge as a fraction of image height.
    pub y: f64,
    /// Width as a fraction of image width.
    pub width: f64,
    /// Height as a fraction of image height.
    pub height: f64,
    /// Object category.
    pub class_name: String,
    /// Detection score, when the source carries one.
    #[serde(default)]
    pub confidence: Option<f64>,
}

impl BoundingBox {
    /// Creates a box from normalized geometry.
    ///
    /// A box poking past the top or left edge (a YOLO center box near the
    /// border) is clipped there: its far edge stays put and the size shrinks.
    /// Negative sizes (a VOC box with swapped corners) become zero. `x + width`
    /// may still exceed 1.0.
    pub fn new(bbox: BBoxXYWH<Normalized>, class_name: impl Into<String>) -> Self {
        let (x, width) = clip_to_origin(bbox.x, bbox.width);
        let (y, height) = clip_to_origin(bbox.y, bbox.height);
        Self {
            x,
            y,
            width,
            height,
            class_name: class_name.into(),
            confidence: None,
        }
    }

    /// Attaches a detection score.
    pub fn with_confidence(mut self, confidence: Option<f64>) -> Self {
        self.confidence = confidence;
        self
    }

    /// Returns the box geometry in normalized space.
    #[inline]
    pub fn geometry(&self) -> BBoxXYWH<Normalized> {
        BBoxXYWH::from_xywh(self.x, self.y, self.width, self.height)
    }
}

/// Clips a 1-D span `[start, start + len)` at zero.
#[inline]
fn clip_to_origin(start: f64, len: f64) -> (f64, f64) {
    if start < 0.0 {
        (0.0, (len + start).max(0.0))
    } else {
        (start, len.max(0.0))
    }
}

/// One dataset image with its annotations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageInfo {
    /// Unique within the loaded dataset.
    pub id: ImageId,

    /// Logical file name as recorded by the annotation source.
    pub filename: String,

    /// Best-guess location on disk. The file is not guaranteed to exist.
    pub filepath: PathBuf,

    /// Width of the image in pixels.
    pub width: u32,

    /// Height of the image in pixels.
    pub height: u32,

    /// Split the image belongs to, if the format has that concept.
    #[serde(default)]
    pub split: Option<String>,

    /// Boxes in parse order.
    #[serde(default)]
    pub annotations: Vec<BoundingBox>,
}

impl ImageInfo {
    /// Creates an image with no split and no annotations.
    pub fn new(
        id: impl Into<ImageId>,
        filename: impl Into<String>,
        filepath: impl Into<PathBuf>,
        width: u32,
        height: u32,
    ) -> Self {
        Self {
            id: id.into(),
            filename: filename.into(),
            filepath: filepath.into(),
            width,
            height,
            split: None,
            annotations: Vec::new(),
        }
    }

    /// Sets the split for this image.
    pub fn with_split(mut self, split: Option<String>) -> Self {
        self.split = split;
        self
    }

    /// Returns true if any annotation carries `class_name`.
    pub fn has_class(&self, class_name: &str) -> bool {
        self.annotations
            .iter()
            .any(|ann| ann.class_name == class_name)
    }
}

/// Summary of a loaded dataset.
#[derive(Clone, Debug, Serialize)]
pub struct DatasetInfo {
    pub name: String,
    pub path: PathBuf,
    pub format: DatasetFormat,
    pub total_images: usize,
    pub total_annotations: usize,
    pub classes: Vec<String>,
    pub splits: Vec<String>,
}

impl fmt::Display for DatasetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |items: &[String]| {
            if items.is_empty() {
                "-".to_string()
            } else {
                items.join(", ")
            }
        };

        writeln!(f, "Dataset:      {}", self.name)?;
        writeln!(f, "Path:         {}", self.path.display())?;
        writeln!(f, "Format:       {}", self.format)?;
        writeln!(f, "Images:       {}", self.total_images)?;
        writeln!(f, "Annotations:  {}", self.total_annotations)?;
        writeln!(f, "Classes ({}):  {}", self.classes.len(), join(&self.classes))?;
        writeln!(f, "Splits:       {}", join(&self.splits))
    }
}

/// A complete parsed dataset: classes, splits and images.
///
/// Images keep their first-insertion position. Inserting an image whose id is
/// already present replaces the earlier record in place, which is how
/// duplicate ids across COCO annotation files resolve.
#[derive(Clone, Debug)]
pub struct Dataset {
    root: PathBuf,
    format: DatasetFormat,
    classes: Vec<String>,
    splits: Vec<String>,
    images: Vec<ImageInfo>,
    index: HashMap<ImageId, usize>,
}

impl Dataset {
    /// Creates an empty dataset rooted at `root`.
    pub fn new(root: impl Into<PathBuf>, format: DatasetFormat) -> Self {
        Self {
            root: root.into(),
            format,
            classes: Vec::new(),
            splits: Vec::new(),
            images: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn format(&self) -> DatasetFormat {
        self.format
    }

    /// Class names, first-seen order unless the format declares its own.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Split names in first-seen order.
    pub fn splits(&self) -> &[String] {
        &self.splits
    }

    /// All images in insertion order.
    pub fn images(&self) -> &[ImageInfo] {
        &self.images
    }

    /// Looks up one image by id.
    pub fn image(&self, id: &str) -> Option<&ImageInfo> {
        self.index.get(id).map(|&idx| &self.images[idx])
    }

    /// Total number of boxes across all images.
    pub fn total_annotations(&self) -> usize {
        self.images.iter().map(|img| img.annotations.len()).sum()
    }

    /// Replaces the class list wholesale (declared class files).
    pub(crate) fn set_classes(&mut self, classes: Vec<String>) {
        self.classes = classes;
    }

    /// Appends `name` to the class list unless already present.
    pub(crate) fn register_class(&mut self, name: &str) {
        if !self.classes.iter().any(|existing| existing == name) {
            self.classes.push(name.to_string());
        }
    }

    /// Appends `name` to the split list unless already present.
    pub(crate) fn register_split(&mut self, name: &str) {
        if !self.splits.iter().any(|existing| existing == name) {
            self.splits.push(name.to_string());
        }
    }

    /// Inserts an image, replacing any earlier image with the same id.
    pub(crate) fn insert_image(&mut self, image: ImageInfo) {
        match self.index.get(&image.id) {
            Some(&idx) => self.images[idx] = image,
            None => {
                self.index.insert(image.id.clone(), self.images.len());
                self.images.push(image);
            }
        }
    }

    /// Builds the summary for this dataset.
    pub fn summary(&self) -> DatasetInfo {
        let name = self
            .root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        DatasetInfo {
            name,
            path: self.root.clone(),
            format: self.format,
            total_images: self.images.len(),
            total_annotations: self.total_annotations(),
            classes: self.classes.clone(),
            splits: self.splits.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_image_replaces_in_place() {
        let mut dataset = Dataset::new("/data/coco", DatasetFormat::Coco);
        dataset.insert_image(ImageInfo::new("1", "a.jpg", "/data/a.jpg", 10, 10));
        dataset.insert_image(ImageInfo::new("2", "b.jpg", "/data/b.jpg", 10, 10));
        dataset.insert_image(ImageInfo::new("1", "c.jpg", "/data/c.jpg", 20, 20));

        assert_eq!(dataset.images().len(), 2);
        assert_eq!(dataset.images()[0].filename, "c.jpg");
        assert_eq!(dataset.images()[1].filename, "b.jpg");
        assert_eq!(dataset.image("1").map(|img| img.width), Some(20));
    }

    #[test]
    fn test_register_class_keeps_first_seen_order() {
        let mut dataset = Dataset::new("/data/voc", DatasetFormat::Voc);
        dataset.register_class("dog");
        dataset.register_class("cat");
        dataset.register_class("dog");
        assert_eq!(dataset.classes(), ["dog", "cat"]);
    }

    #[test]
    fn test_bounding_box_clips_at_origin() {
        let bbox = BoundingBox::new(BBoxXYWH::from_cxcywh(0.05, 0.5, 0.2, 0.2), "cat");
        assert_eq!(bbox.x, 0.0);
        assert!((bbox.y - 0.4).abs() < 1e-12);
        // Right edge stays at 0.15.
        assert!((bbox.width - 0.15).abs() < 1e-12);
        assert_eq!(bbox.height, 0.2);

        let outside = BoundingBox::new(BBoxXYWH::from_xywh(-0.5, -0.3, 0.2, 0.4), "cat");
        assert_eq!((outside.x, outside.width), (0.0, 0.0));
        assert!((outside.height - 0.1).abs() < 1e-12);

        let swapped = BoundingBox::new(BBoxXYWH::from_xyxy(0.5, 0.5, 0.4, 0.6), "cat");
        assert_eq!(swapped.width, 0.0);
    }

    #[test]
    fn test_summary_uses_directory_name() {
        let mut dataset = Dataset::new("/data/my_set", DatasetFormat::Yolo);
        let mut image = ImageInfo::new("a", "a.png", "/data/my_set/a.png", 4, 4);
        image.annotations.push(BoundingBox::new(
            BBoxXYWH::from_xywh(0.1, 0.1, 0.2, 0.2),
            "cat",
        ));
        dataset.insert_image(image);

        let info = dataset.summary();
        assert_eq!(info.name, "my_set");
        assert_eq!(info.total_images, 1);
        assert_eq!(info.total_annotations, 1);

        let text = info.to_string();
        assert!(text.contains("Format:       YOLO"));
        assert!(text.contains("Classes (0):  -"));
    }
}
