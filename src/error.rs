use std::path::PathBuf;
use thiserror::Error;

/// The main error type for dataset-analyzer operations.
///
/// Only `Io`, `PathNotFound`, `FormatUndetected`, `DirectoryTraversal`,
/// `NoDatasetLoaded`, `ImageNotFound`, `ImageFileMissing`, `InvalidQuery` and
/// `JsonOutput` ever reach a caller. The parse variants describe a single bad
/// item; the readers log them and move on to the next file, line or image.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Path does not exist: {}", path.display())]
    PathNotFound { path: PathBuf },

    #[error("Could not detect dataset format at {}", path.display())]
    FormatUndetected { path: PathBuf },

    #[error("Failed while traversing {}: {message}", path.display())]
    DirectoryTraversal { path: PathBuf, message: String },

    #[error("No dataset loaded")]
    NoDatasetLoaded,

    #[error("Image not found: {id}")]
    ImageNotFound { id: String },

    #[error("Image file not found for '{id}': {}", path.display())]
    ImageFileMissing { id: String, path: PathBuf },

    #[error("Invalid query: {message}")]
    InvalidQuery { message: String },

    #[error("Failed to write JSON output: {0}")]
    JsonOutput(#[source] serde_json::Error),

    #[error("Failed to parse COCO JSON from {}: {source}", path.display())]
    CocoJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse VOC XML {}: {message}", path.display())]
    VocXmlParse { path: PathBuf, message: String },

    #[error("Failed to parse YOLO label {}:{line}: {message}", path.display())]
    YoloLabelParse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Failed to read image dimensions from {}: {source}", path.display())]
    ImageDimensionRead {
        path: PathBuf,
        #[source]
        source: imagesize::ImageError,
    },

    #[error("Failed to decode image {}: {source}", path.display())]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}
