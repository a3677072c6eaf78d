//! Format adapter contract.
//!
//! An adapter converts between one on-disk format and the canonical
//! [`Dataset`]. The rest of the crate only talks to formats through
//! [`FormatAdapter`], and finds them through the [`AdapterRegistry`].

mod registry;

pub use registry::{AdapterRegistry, RegistryEntry};

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use crate::error::AdapterError;
use crate::ir::{AnnotationKind, Dataset};

/// A bidirectional converter between one on-disk format and the IR.
pub trait FormatAdapter: Send + Sync {
    /// Registry name of the format.
    fn name(&self) -> &'static str;

    /// Reads a dataset from `path`.
    ///
    /// # Errors
    /// `NotFound` when the expected file/directory layout is absent,
    /// `Malformed` when required fields are missing or of the wrong shape.
    fn load(&self, path: &Path) -> Result<Dataset, AdapterError>;

    /// Writes `dataset` to `path`, creating parent directories as needed.
    ///
    /// Output is assembled fully in memory before anything touches disk, so
    /// a failure never leaves a half-written file behind.
    fn dump(&self, dataset: &Dataset, path: &Path) -> Result<(), AdapterError>;

    /// Which annotation features the format can carry.
    fn capabilities(&self) -> Capabilities {
        Capabilities::base()
    }
}

/// Feature flags an adapter declares.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    /// Bounding boxes.
    pub det: bool,
    /// Polygon segmentation.
    pub segm_poly: bool,
    /// Run-length mask segmentation.
    pub segm_rle: bool,
    pub panoptic: bool,
    pub keypoints: bool,
    /// Free-form annotation attributes.
    pub attributes: bool,
}

impl Capabilities {
    /// The starting point for adapters: nothing but attributes.
    pub const fn base() -> Self {
        Self {
            det: false,
            segm_poly: false,
            segm_rle: false,
            panoptic: false,
            keypoints: false,
            attributes: true,
        }
    }

    /// Feature-name → flag mapping, in a stable order.
    pub fn to_map(&self) -> BTreeMap<&'static str, bool> {
        BTreeMap::from([
            ("det", self.det),
            ("segm_poly", self.segm_poly),
            ("segm_rle", self.segm_rle),
            ("panoptic", self.panoptic),
            ("keypoints", self.keypoints),
            ("attributes", self.attributes),
        ])
    }

    /// Whether annotations of this kind survive a dump in this format.
    ///
    /// Masks stored as external files count as RLE-capable; adapters that
    /// cannot carry a file reference drop the payload either way.
    pub fn supports(&self, kind: &AnnotationKind) -> bool {
        match kind {
            AnnotationKind::BBox { .. } => self.det,
            AnnotationKind::Polygon { .. } => self.segm_poly,
            AnnotationKind::Mask(_) => self.segm_rle,
            AnnotationKind::Keypoints { .. } => self.keypoints,
            AnnotationKind::PanopticSegment { .. } => self.panoptic,
        }
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::base()
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, flag)) in self.to_map().into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {flag}")?;
        }
        f.write_str("}")
    }
}
