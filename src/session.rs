//! The active dataset and its cached reports.
//!
//! A [`Session`] owns at most one loaded dataset snapshot. Loading replaces
//! the snapshot together with every cached report; reports are computed on
//! first request and reused until the next load.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::AnalyzerError;
use crate::ir::{detect_format, Dataset, DatasetInfo, ImageInfo};
use crate::stats::{
    self, AnalysisReport, BoxStats, DatasetStats, ImageStats, SpatialStats, StatsOptions,
};

/// Filters and pagination for [`Session::list_images`].
///
/// Filters apply in field order: class, split, then the inclusive box count
/// bounds. An empty class or split string means no filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImageQuery {
    /// 1-based page number. Page 0 is always empty.
    pub page: usize,
    /// Page size; must be positive.
    pub limit: usize,
    pub class_filter: Option<String>,
    pub split_filter: Option<String>,
    pub min_boxes: Option<usize>,
    pub max_boxes: Option<usize>,
}

impl Default for ImageQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 50,
            class_filter: None,
            split_filter: None,
            min_boxes: None,
            max_boxes: None,
        }
    }
}

impl ImageQuery {
    fn matches(&self, image: &ImageInfo) -> bool {
        if let Some(class) = non_empty(&self.class_filter) {
            if !image.has_class(class) {
                return false;
            }
        }
        if let Some(split) = non_empty(&self.split_filter) {
            if image.split.as_deref() != Some(split) {
                return false;
            }
        }
        let boxes = image.annotations.len();
        if self.min_boxes.is_some_and(|min| boxes < min) {
            return false;
        }
        if self.max_boxes.is_some_and(|max| boxes > max) {
            return false;
        }
        true
    }
}

fn non_empty(filter: &Option<String>) -> Option<&str> {
    filter.as_deref().filter(|value| !value.is_empty())
}

/// One page of a filtered image listing.
#[derive(Clone, Debug, Serialize)]
pub struct ImagePage<'a> {
    pub images: Vec<&'a ImageInfo>,
    /// Matching images across all pages.
    pub total: usize,
    pub page: usize,
    pub limit: usize,
    /// `ceil(total / limit)`.
    pub pages: usize,
}

#[derive(Debug)]
struct Snapshot {
    dataset: Dataset,
    dataset_stats: OnceLock<DatasetStats>,
    box_stats: OnceLock<BoxStats>,
    image_stats: OnceLock<ImageStats>,
    spatial_stats: OnceLock<SpatialStats>,
}

impl Snapshot {
    fn new(dataset: Dataset) -> Self {
        Self {
            dataset,
            dataset_stats: OnceLock::new(),
            box_stats: OnceLock::new(),
            image_stats: OnceLock::new(),
            spatial_stats: OnceLock::new(),
        }
    }
}

/// Holds the loaded dataset and memoized statistics.
#[derive(Debug, Default)]
pub struct Session {
    options: StatsOptions,
    snapshot: Option<Snapshot>,
}

impl Session {
    /// Creates an empty session with default statistics options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty session with custom statistics options.
    pub fn with_options(options: StatsOptions) -> Self {
        Self {
            options,
            snapshot: None,
        }
    }

    /// Detects the format at `path`, parses it, and makes it the active
    /// dataset.
    ///
    /// On failure the previously loaded dataset (if any) stays active.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<DatasetInfo, AnalyzerError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AnalyzerError::PathNotFound {
                path: path.to_path_buf(),
            });
        }
        let root = fs::canonicalize(path)?;

        let format = detect_format(&root).ok_or_else(|| AnalyzerError::FormatUndetected {
            path: root.clone(),
        })?;
        debug!("detected {format} dataset at {}", root.display());

        let dataset = format.read(&root)?;
        let summary = dataset.summary();
        info!(
            "loaded {} ({format}): {} image(s), {} annotation(s)",
            summary.name, summary.total_images, summary.total_annotations
        );

        self.snapshot = Some(Snapshot::new(dataset));
        Ok(summary)
    }

    pub fn is_loaded(&self) -> bool {
        self.snapshot.is_some()
    }

    /// The loaded dataset.
    pub fn dataset(&self) -> Result<&Dataset, AnalyzerError> {
        self.snapshot()
            .map(|snapshot| &snapshot.dataset)
    }

    /// Summary of the loaded dataset.
    pub fn info(&self) -> Result<DatasetInfo, AnalyzerError> {
        self.dataset().map(Dataset::summary)
    }

    pub fn classes(&self) -> Result<&[String], AnalyzerError> {
        self.dataset().map(Dataset::classes)
    }

    pub fn splits(&self) -> Result<&[String], AnalyzerError> {
        self.dataset().map(Dataset::splits)
    }

    /// Filters the image list and returns the requested page.
    pub fn list_images(&self, query: &ImageQuery) -> Result<ImagePage<'_>, AnalyzerError> {
        if query.limit == 0 {
            return Err(AnalyzerError::InvalidQuery {
                message: "limit must be at least 1".to_string(),
            });
        }
        let dataset = self.dataset()?;

        let matching: Vec<&ImageInfo> = dataset
            .images()
            .iter()
            .filter(|image| query.matches(image))
            .collect();
        let total = matching.len();

        let images = match query.page.checked_sub(1) {
            Some(page_index) => matching
                .into_iter()
                .skip(page_index.saturating_mul(query.limit))
                .take(query.limit)
                .collect(),
            None => Vec::new(),
        };

        Ok(ImagePage {
            images,
            total,
            page: query.page,
            limit: query.limit,
            pages: total.div_ceil(query.limit),
        })
    }

    /// Looks up an image by id. `None` if absent or nothing is loaded.
    pub fn get_image(&self, id: &str) -> Option<&ImageInfo> {
        self.snapshot
            .as_ref()
            .and_then(|snapshot| snapshot.dataset.image(id))
    }

    /// Resolved on-disk path of an image, verified to exist.
    pub fn image_file(&self, id: &str) -> Result<&Path, AnalyzerError> {
        let image = self
            .dataset()?
            .image(id)
            .ok_or_else(|| AnalyzerError::ImageNotFound { id: id.to_string() })?;

        if !image.filepath.is_file() {
            return Err(AnalyzerError::ImageFileMissing {
                id: id.to_string(),
                path: image.filepath.clone(),
            });
        }
        Ok(&image.filepath)
    }

    pub fn dataset_stats(&self) -> Result<&DatasetStats, AnalyzerError> {
        let snapshot = self.snapshot()?;
        Ok(snapshot.dataset_stats.get_or_init(|| {
            debug!("computing dataset stats");
            stats::compute_dataset_stats(snapshot.dataset.images())
        }))
    }

    pub fn box_stats(&self) -> Result<&BoxStats, AnalyzerError> {
        let snapshot = self.snapshot()?;
        Ok(snapshot.box_stats.get_or_init(|| {
            debug!("computing box stats");
            stats::compute_box_stats(snapshot.dataset.images(), &self.options)
        }))
    }

    /// Decodes up to `brightness_sample_size` images on first call.
    pub fn image_stats(&self) -> Result<&ImageStats, AnalyzerError> {
        let snapshot = self.snapshot()?;
        Ok(snapshot.image_stats.get_or_init(|| {
            debug!("computing image stats");
            stats::compute_image_stats(snapshot.dataset.images(), &self.options)
        }))
    }

    pub fn spatial_stats(&self) -> Result<&SpatialStats, AnalyzerError> {
        let snapshot = self.snapshot()?;
        Ok(snapshot.spatial_stats.get_or_init(|| {
            debug!("computing spatial stats");
            stats::compute_spatial_stats(snapshot.dataset.images(), &self.options)
        }))
    }

    /// All four reports, computing whichever are not cached yet.
    pub fn report(&self) -> Result<AnalysisReport, AnalyzerError> {
        Ok(AnalysisReport {
            overview: self.dataset_stats()?.clone(),
            boxes: self.box_stats()?.clone(),
            images: self.image_stats()?.clone(),
            spatial: self.spatial_stats()?.clone(),
        })
    }

    fn snapshot(&self) -> Result<&Snapshot, AnalyzerError> {
        self.snapshot.as_ref().ok_or(AnalyzerError::NoDatasetLoaded)
    }
}
