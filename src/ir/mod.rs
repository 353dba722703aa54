//! Dataset model and format readers.
//!
//! Every supported annotation convention is read into the same
//! [`Dataset`] representation, so the statistics engine and the session never
//! need to know which format a dataset came from.
//!
//! # Design Principles
//!
//! 1. **Type Safety**: Marker types keep pixel and normalized geometry apart
//!    at compile time. A reader builds its box in the space the file uses and
//!    converts exactly once.
//!
//! 2. **Canonical Form**: Stored boxes are top-left XYWH, normalized to the
//!    owning image's size.
//!
//! 3. **Lenient Reading**: A malformed file, line or entry is logged and
//!    skipped. Only an unreadable dataset root fails the whole load.
//!
//! # Example
//!
//! ```
//! use dataset_analyzer::ir::{BBoxXYWH, BoundingBox, Pixel};
//!
//! let pixels = BBoxXYWH::<Pixel>::from_xywh(10.0, 20.0, 30.0, 40.0);
//! let bbox = BoundingBox::new(pixels.to_normalized(100.0, 200.0), "person");
//! assert_eq!(bbox.width, 0.3);
//! ```

mod bbox;
mod coord;
pub mod format;
mod ids;
pub mod io_coco_json;
pub mod io_voc_xml;
pub mod io_yolo;
mod model;
mod space;

// Re-export core types for convenient access
pub use bbox::BBoxXYWH;
pub use coord::Coord;
pub use format::{detect_format, DatasetFormat};
pub use ids::ImageId;
pub use model::{BoundingBox, Dataset, DatasetInfo, ImageInfo};
pub use space::{Normalized, Pixel};
