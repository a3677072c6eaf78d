//! Canonical dataset model.
//!
//! A [`Dataset`] owns its categories and items; each [`Item`] owns its
//! annotations. Category references from annotations are plain ids resolved
//! through a [`CategoryIndex`] built on demand, so no item ever holds a
//! pointer back into the dataset.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::geometry::{BBox, Keypoints, Polygon, Rle};
use super::ids::{AnnotationId, CategoryId, ItemId};
use crate::error::{ConsistencyError, SchemaError};

/// Version tag written into every canonical dataset.
pub const SCHEMA_VERSION: &str = "1.0";

/// A skeleton edge as a pair of 0-based indices into `keypoint_names`.
pub type SkeletonEdge = [u32; 2];

/// Translates 1-based skeleton edges (COCO convention) to 0-based ones.
pub fn skeleton_from_one_based(edges: &[[i64; 2]]) -> Result<Vec<SkeletonEdge>, SchemaError> {
    let shift = |v: i64| -> Result<u32, SchemaError> {
        u32::try_from(v - 1).map_err(|_| SchemaError::SkeletonIndexNotOneBased(v))
    };
    edges
        .iter()
        .map(|&[a, b]| Ok([shift(a)?, shift(b)?]))
        .collect()
}

/// Translates 0-based skeleton edges back to the 1-based convention.
pub fn skeleton_to_one_based(edges: &[SkeletonEdge]) -> Vec<[u64; 2]> {
    edges
        .iter()
        .map(|&[a, b]| [u64::from(a) + 1, u64::from(b) + 1])
        .collect()
}

/// A complete dataset in canonical form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub licenses: Vec<License>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub splits: Vec<SplitInfo>,

    #[serde(default)]
    pub categories: Vec<Category>,

    #[serde(default)]
    pub items: Vec<Item>,
}

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

impl Default for Dataset {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            licenses: Vec::new(),
            splits: Vec::new(),
            categories: Vec::new(),
            items: Vec::new(),
        }
    }
}

impl Dataset {
    /// Builds a dataset around a list of items with no dataset-level
    /// metadata, as when reading a line-delimited item stream.
    pub fn from_items(items: Vec<Item>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    /// Builds the category-id lookup used by consistency checks.
    ///
    /// The index borrows from the dataset, so it has to be rebuilt after the
    /// category list changes.
    pub fn category_index(&self) -> CategoryIndex<'_> {
        CategoryIndex::new(&self.categories)
    }

    /// Total number of annotations across all items.
    pub fn annotation_count(&self) -> usize {
        self.items.iter().map(|item| item.annotations.len()).sum()
    }
}

/// A license that applies to (some of) the dataset.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl License {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: None,
        }
    }
}

/// Named dataset split.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitName {
    Train,
    Val,
    Test,
    Unlabeled,
    Other,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SplitInfo {
    pub name: SplitName,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A category (class label).
///
/// When both `keypoint_names` and `skeleton` are present, every skeleton
/// edge references a valid keypoint index. The check runs in the
/// constructor and during deserialization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "CategoryRepr", into = "CategoryRepr")]
pub struct Category {
    id: CategoryId,
    name: String,
    supercategory: Option<String>,
    keypoint_names: Option<Vec<String>>,
    skeleton: Option<Vec<SkeletonEdge>>,
}

#[derive(Serialize, Deserialize)]
struct CategoryRepr {
    id: CategoryId,
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    supercategory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    keypoint_names: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    skeleton: Option<Vec<SkeletonEdge>>,
}

impl Category {
    /// Creates a plain category without keypoint schema.
    pub fn new(id: impl Into<CategoryId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            supercategory: None,
            keypoint_names: None,
            skeleton: None,
        }
    }

    /// Creates a category with every optional field, checking skeleton indices.
    pub fn try_new(
        id: impl Into<CategoryId>,
        name: impl Into<String>,
        supercategory: Option<String>,
        keypoint_names: Option<Vec<String>>,
        skeleton: Option<Vec<SkeletonEdge>>,
    ) -> Result<Self, SchemaError> {
        let name = name.into();
        if let (Some(names), Some(edges)) = (&keypoint_names, &skeleton) {
            let len = names.len();
            for &[a, b] in edges {
                if a as usize >= len || b as usize >= len {
                    return Err(SchemaError::SkeletonOutOfRange {
                        category: name,
                        a,
                        b,
                        len,
                    });
                }
            }
        }
        Ok(Self {
            id: id.into(),
            name,
            supercategory,
            keypoint_names,
            skeleton,
        })
    }

    pub fn with_supercategory(mut self, supercategory: impl Into<String>) -> Self {
        self.supercategory = Some(supercategory.into());
        self
    }

    pub fn id(&self) -> CategoryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn supercategory(&self) -> Option<&str> {
        self.supercategory.as_deref()
    }

    pub fn keypoint_names(&self) -> Option<&[String]> {
        self.keypoint_names.as_deref()
    }

    /// 0-based skeleton edges.
    pub fn skeleton(&self) -> Option<&[SkeletonEdge]> {
        self.skeleton.as_deref()
    }
}

impl TryFrom<CategoryRepr> for Category {
    type Error = SchemaError;

    fn try_from(r: CategoryRepr) -> Result<Self, Self::Error> {
        Category::try_new(r.id, r.name, r.supercategory, r.keypoint_names, r.skeleton)
    }
}

impl From<Category> for CategoryRepr {
    fn from(c: Category) -> Self {
        CategoryRepr {
            id: c.id,
            name: c.name,
            supercategory: c.supercategory,
            keypoint_names: c.keypoint_names,
            skeleton: c.skeleton,
        }
    }
}

/// Category-id lookup handed to consistency checks alongside each item.
#[derive(Clone, Debug, Default)]
pub struct CategoryIndex<'a> {
    by_id: HashMap<CategoryId, &'a Category>,
}

impl<'a> CategoryIndex<'a> {
    pub fn new(categories: &'a [Category]) -> Self {
        Self {
            by_id: categories.iter().map(|c| (c.id, c)).collect(),
        }
    }

    pub fn get(&self, id: CategoryId) -> Option<&'a Category> {
        self.by_id.get(&id).copied()
    }

    pub fn contains(&self, id: CategoryId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// The raster an item's annotations are drawn against.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub file_name: String,
    pub width: u32,
    pub height: u32,
}

impl Image {
    pub fn new(file_name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            file_name: file_name.into(),
            width,
            height,
        }
    }
}

/// One image together with its annotations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub image: Image,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Item {
    pub fn new(id: impl Into<ItemId>, image: Image) -> Self {
        Self {
            id: id.into(),
            image,
            annotations: Vec::new(),
        }
    }

    pub fn with_annotation(mut self, annotation: Annotation) -> Self {
        self.annotations.push(annotation);
        self
    }

    /// Next id in a per-item sequence that starts at 1.
    ///
    /// Only meaningful while every annotation of the item was allocated
    /// through this sequence, as adapters do while loading.
    pub fn next_annotation_id(&self) -> AnnotationId {
        AnnotationId::new(self.annotations.len() as u64 + 1)
    }
}

/// Where a mask's pixels live.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MaskRepr", into = "MaskRepr")]
pub enum MaskSource {
    /// Run-length payload carried inline.
    Rle(Rle),
    /// Path to an external mask image.
    File(String),
}

#[derive(Serialize, Deserialize)]
struct MaskRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rle: Option<Rle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    png_path: Option<String>,
}

impl MaskSource {
    /// Builds a mask source from optional fields; exactly one must be set.
    pub fn try_new(rle: Option<Rle>, png_path: Option<String>) -> Result<Self, SchemaError> {
        match (rle, png_path) {
            (Some(rle), None) => Ok(MaskSource::Rle(rle)),
            (None, Some(path)) => Ok(MaskSource::File(path)),
            (None, None) => Err(SchemaError::MaskSourceMissing),
            (Some(_), Some(_)) => Err(SchemaError::MaskSourceAmbiguous),
        }
    }

    pub fn rle(&self) -> Option<&Rle> {
        match self {
            MaskSource::Rle(rle) => Some(rle),
            MaskSource::File(_) => None,
        }
    }
}

impl TryFrom<MaskRepr> for MaskSource {
    type Error = SchemaError;

    fn try_from(r: MaskRepr) -> Result<Self, Self::Error> {
        MaskSource::try_new(r.rle, r.png_path)
    }
}

impl From<MaskSource> for MaskRepr {
    fn from(m: MaskSource) -> Self {
        match m {
            MaskSource::Rle(rle) => MaskRepr {
                rle: Some(rle),
                png_path: None,
            },
            MaskSource::File(path) => MaskRepr {
                rle: None,
                png_path: Some(path),
            },
        }
    }
}

/// The geometry carried by an annotation, tagged by `type` on disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnnotationKind {
    #[serde(rename = "bbox")]
    BBox { bbox: BBox },
    Polygon { polygons: Vec<Polygon> },
    Mask(MaskSource),
    Keypoints { keypoints: Keypoints },
    PanopticSegment { segment_id: u64, area: u64 },
}

impl AnnotationKind {
    /// The `type` tag of this kind.
    pub fn name(&self) -> &'static str {
        match self {
            AnnotationKind::BBox { .. } => "bbox",
            AnnotationKind::Polygon { .. } => "polygon",
            AnnotationKind::Mask(_) => "mask",
            AnnotationKind::Keypoints { .. } => "keypoints",
            AnnotationKind::PanopticSegment { .. } => "panoptic_segment",
        }
    }
}

/// An annotation on an item.
///
/// Deserialization rejects a panoptic segment without `category_id`. Values
/// built in code are checked by [`Annotation::validate_consistency`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AnnotationRepr")]
pub struct Annotation {
    pub id: AnnotationId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,

    /// Free-form attributes (e.g. "occluded", "truncated").
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, serde_json::Value>,

    #[serde(flatten)]
    pub kind: AnnotationKind,
}

#[derive(Deserialize)]
struct AnnotationRepr {
    id: AnnotationId,
    #[serde(default)]
    category_id: Option<CategoryId>,
    #[serde(default)]
    attributes: BTreeMap<String, serde_json::Value>,
    #[serde(flatten)]
    kind: AnnotationKind,
}

impl TryFrom<AnnotationRepr> for Annotation {
    type Error = SchemaError;

    fn try_from(r: AnnotationRepr) -> Result<Self, Self::Error> {
        if let (AnnotationKind::PanopticSegment { segment_id, .. }, None) = (&r.kind, r.category_id) {
            return Err(SchemaError::PanopticWithoutCategory {
                segment_id: *segment_id,
            });
        }
        Ok(Self {
            id: r.id,
            category_id: r.category_id,
            attributes: r.attributes,
            kind: r.kind,
        })
    }
}

impl Annotation {
    pub fn new(id: impl Into<AnnotationId>, kind: AnnotationKind) -> Self {
        Self {
            id: id.into(),
            category_id: None,
            attributes: BTreeMap::new(),
            kind,
        }
    }

    pub fn bbox(id: impl Into<AnnotationId>, bbox: BBox) -> Self {
        Self::new(id, AnnotationKind::BBox { bbox })
    }

    pub fn polygon(id: impl Into<AnnotationId>, polygons: Vec<Polygon>) -> Self {
        Self::new(id, AnnotationKind::Polygon { polygons })
    }

    pub fn mask(id: impl Into<AnnotationId>, source: MaskSource) -> Self {
        Self::new(id, AnnotationKind::Mask(source))
    }

    pub fn keypoints(id: impl Into<AnnotationId>, keypoints: Keypoints) -> Self {
        Self::new(id, AnnotationKind::Keypoints { keypoints })
    }

    /// Panoptic segments always carry a category.
    pub fn panoptic_segment(
        id: impl Into<AnnotationId>,
        segment_id: u64,
        category_id: impl Into<CategoryId>,
        area: u64,
    ) -> Self {
        Self::new(id, AnnotationKind::PanopticSegment { segment_id, area })
            .with_category(category_id)
    }

    pub fn with_category(mut self, category_id: impl Into<CategoryId>) -> Self {
        self.category_id = Some(category_id.into());
        self
    }

    pub fn with_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Checks this annotation against its owning item and the dataset's
    /// categories.
    ///
    /// Pixel boxes reaching past the right/bottom image edge pass; see
    /// [`BBox::exceeds_canvas`] to detect them separately.
    pub fn validate_consistency(
        &self,
        item: &Item,
        categories: &CategoryIndex<'_>,
    ) -> Result<(), ConsistencyError> {
        match &self.kind {
            AnnotationKind::BBox { bbox } => {
                if !bbox.is_normalized() && (bbox.x() < 0.0 || bbox.y() < 0.0) {
                    return Err(ConsistencyError::NegativeBBoxOrigin {
                        item: item.id.to_string(),
                        x: bbox.x(),
                        y: bbox.y(),
                    });
                }
                Ok(())
            }
            AnnotationKind::Keypoints { keypoints } => {
                let Some(category) = self.category_id.and_then(|id| categories.get(id)) else {
                    return Ok(());
                };
                let Some(names) = category.keypoint_names() else {
                    return Ok(());
                };
                let expected = names.len() * 3;
                if keypoints.points().len() != expected {
                    return Err(ConsistencyError::KeypointCountMismatch {
                        actual: keypoints.points().len(),
                        expected,
                        category: category.name().to_string(),
                    });
                }
                Ok(())
            }
            AnnotationKind::PanopticSegment { segment_id, .. } => {
                if self.category_id.is_none() {
                    return Err(ConsistencyError::PanopticWithoutCategory {
                        item: item.id.to_string(),
                        segment_id: *segment_id,
                    });
                }
                Ok(())
            }
            AnnotationKind::Polygon { .. } | AnnotationKind::Mask(_) => Ok(()),
        }
    }
}
