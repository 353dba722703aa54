//! Bounding box geometry in top-left XYWH form.

use std::marker::PhantomData;

use super::coord::Coord;
use super::{Normalized, Pixel};

/// An axis-aligned box stored as top-left corner plus size.
///
/// The `TSpace` parameter should be either [`Pixel`] or [`Normalized`].
/// Each format reader builds its box in the space the file uses and then
/// converts it with [`BBoxXYWH::to_normalized`]; the stats engine goes the
/// other way with [`BBoxXYWH::to_pixel`].
///
/// Nothing here enforces a positive size. A VOC file with `xmax < xmin`
/// produces a negative width, and it is up to the caller to decide what to
/// do with it.
#[derive(Clone, Copy, PartialEq)]
pub struct BBoxXYWH<TSpace> {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> BBoxXYWH<TSpace> {
    /// Creates a box from its top-left corner and size.
    #[inline]
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
            _space: PhantomData,
        }
    }

    /// Creates a box from corner coordinates (xmin, ymin, xmax, ymax).
    ///
    /// This is the layout Pascal VOC uses.
    #[inline]
    pub fn from_xyxy(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self::from_xywh(xmin, ymin, xmax - xmin, ymax - ymin)
    }

    /// Creates a box from its center and size.
    ///
    /// This is the layout YOLO label files use.
    #[inline]
    pub fn from_cxcywh(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self::from_xywh(cx - width / 2.0, cy - height / 2.0, width, height)
    }

    /// Returns the center point of the box.
    #[inline]
    pub fn center(&self) -> Coord<TSpace> {
        Coord::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Returns `width * height`.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Returns `width / height`, or `None` when the height is zero.
    #[inline]
    pub fn aspect_ratio(&self) -> Option<f64> {
        (self.height != 0.0).then(|| self.width / self.height)
    }
}

impl<TSpace> std::fmt::Debug for BBoxXYWH<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BBoxXYWH")
            .field("x", &self.x)
            .field("y", &self.y)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl BBoxXYWH<Pixel> {
    /// Converts pixel coordinates to fractions of the image size.
    ///
    /// Each component is divided independently, so `x / w` is exactly what a
    /// reader would compute by hand.
    pub fn to_normalized(&self, image_width: f64, image_height: f64) -> BBoxXYWH<Normalized> {
        BBoxXYWH::from_xywh(
            self.x / image_width,
            self.y / image_height,
            self.width / image_width,
            self.height / image_height,
        )
    }
}

impl BBoxXYWH<Normalized> {
    /// Converts fractions of the image size back to pixels.
    pub fn to_pixel(&self, image_width: f64, image_height: f64) -> BBoxXYWH<Pixel> {
        BBoxXYWH::from_xywh(
            self.x * image_width,
            self.y * image_height,
            self.width * image_width,
            self.height * image_height,
        )
    }
}
