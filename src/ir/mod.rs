//! Canonical intermediate representation (IR) for annox.
//!
//! Every format adapter converts its on-disk representation into this model
//! and back, so N formats need 2N conversions rather than N×M.
//!
//! # Design Principles
//!
//! 1. **Valid by construction**: geometry values and categories check their
//!    invariants when built or deserialized; an invalid value never exists.
//!
//! 2. **Lazy cross-checks**: relations between values (unique ids, keypoint
//!    counts against a category's schema) are checked in one validation pass,
//!    so datasets can be assembled incrementally.
//!
//! 3. **No back-pointers**: items hold category ids, not categories. Checks
//!    that need a category receive a [`CategoryIndex`] explicitly.
//!
//! # Example
//!
//! ```
//! use annox::ir::{Annotation, BBox, Category, Dataset, Image, Item};
//!
//! let dataset = Dataset {
//!     categories: vec![Category::new(1u64, "person")],
//!     items: vec![
//!         Item::new("1", Image::new("image.jpg", 640, 480)).with_annotation(
//!             Annotation::bbox(1u64, BBox::new(10.0, 20.0, 90.0, 180.0)?).with_category(1u64),
//!         ),
//!     ],
//!     ..Default::default()
//! };
//! assert_eq!(dataset.annotation_count(), 1);
//! # Ok::<(), annox::error::GeometryError>(())
//! ```

mod geometry;
mod ids;
pub mod io_coco_json;
pub mod io_json;
pub mod io_yolo;
mod model;

// Re-export core types for convenient access
pub use geometry::{bounding_xywh, shoelace_area, BBox, Keypoints, Polygon, Rle, RleCounts};
pub use ids::{AnnotationId, CategoryId, ItemId};
pub use model::{
    skeleton_from_one_based, skeleton_to_one_based, Annotation, AnnotationKind, Category,
    CategoryIndex, Dataset, Image, Item, License, MaskSource, SkeletonEdge, SplitInfo, SplitName,
    SCHEMA_VERSION,
};
