//! Dataset format tags and format detection.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use super::model::Dataset;
use super::{io_coco_json, io_voc_xml, io_yolo};
use crate::error::AnalyzerError;

/// The on-disk annotation conventions this crate understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFormat {
    /// COCO-style JSON annotation files.
    Coco,
    /// YOLO-style `labels/` text files with a class list.
    Yolo,
    /// Pascal VOC-style per-image XML files.
    Voc,
}

impl DatasetFormat {
    /// Detection priority. A directory matching several conventions resolves
    /// to the first entry here.
    pub const DETECTION_ORDER: [DatasetFormat; 3] =
        [DatasetFormat::Coco, DatasetFormat::Yolo, DatasetFormat::Voc];

    /// Lower-case tag, as used in serialized output.
    pub fn name(&self) -> &'static str {
        match self {
            DatasetFormat::Coco => "coco",
            DatasetFormat::Yolo => "yolo",
            DatasetFormat::Voc => "voc",
        }
    }

    /// Returns true if `root` looks like a dataset in this format.
    ///
    /// Only existence checks and directory listings; no file is parsed.
    pub fn detect(&self, root: &Path) -> bool {
        match self {
            DatasetFormat::Coco => io_coco_json::detect_coco_dir(root),
            DatasetFormat::Yolo => io_yolo::detect_yolo_dir(root),
            DatasetFormat::Voc => io_voc_xml::detect_voc_dir(root),
        }
    }

    /// Parses the dataset at `root` with this format's reader.
    pub fn read(&self, root: &Path) -> Result<Dataset, AnalyzerError> {
        match self {
            DatasetFormat::Coco => io_coco_json::read_coco_dir(root),
            DatasetFormat::Yolo => io_yolo::read_yolo_dir(root),
            DatasetFormat::Voc => io_voc_xml::read_voc_dir(root),
        }
    }
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name().to_ascii_uppercase())
    }
}

/// Returns the first format whose detection predicate matches `root`.
pub fn detect_format(root: &Path) -> Option<DatasetFormat> {
    DatasetFormat::DETECTION_ORDER
        .into_iter()
        .find(|format| format.detect(root))
}
