//! COCO JSON format reader and writer.
//!
//! This module provides bidirectional conversion between COCO JSON format
//! and the annox IR.
//!
//! # COCO Format Reference
//!
//! COCO bounding boxes use `[x, y, width, height]` with `(x, y)` the top-left
//! corner in absolute pixels. A single COCO annotation may carry a box, a
//! segmentation (polygons or RLE) and keypoints at once; the IR splits such a
//! record into sibling annotations on the same item, one per geometry.
//!
//! Skeletons are 1-based in COCO and 0-based in the IR.
//!
//! # Ids
//!
//! On load, annotation ids restart at 1 inside every item; the source's
//! global annotation ids are not kept. On dump, annotation ids are assigned
//! globally in output order, and image ids come from numeric item ids where
//! possible (see [`allocate_image_ids`]).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use super::geometry::{bounding_xywh, BBox, Keypoints, Polygon, Rle, RleCounts};
use super::io_json::{read_json_file, write_json_atomic};
use super::model::{
    skeleton_from_one_based, skeleton_to_one_based, Annotation, AnnotationKind, Category,
    Dataset, Image, Item, License, MaskSource,
};
use super::{CategoryId, ItemId};
use crate::adapter::{Capabilities, FormatAdapter};
use crate::error::AdapterError;

const FORMAT: &str = "coco";
const DIR_DOCUMENT: &str = "annotations.json";
const IN_MEMORY: &str = "<memory>";

// ============================================================================
// COCO Schema Types (internal to this module)
// ============================================================================

/// Top-level COCO dataset structure.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CocoDataset {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    info: Option<Value>,

    #[serde(default)]
    licenses: Vec<CocoLicense>,

    #[serde(default)]
    images: Vec<CocoImage>,

    #[serde(default)]
    annotations: Vec<CocoAnnotation>,

    #[serde(default)]
    categories: Vec<CocoCategory>,
}

/// COCO license entry.
#[derive(Debug, Serialize, Deserialize)]
struct CocoLicense {
    #[serde(default)]
    id: u64,

    #[serde(default)]
    name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
}

/// COCO image entry.
#[derive(Debug, Serialize, Deserialize)]
struct CocoImage {
    id: u64,

    #[serde(default)]
    file_name: Option<String>,

    #[serde(default, deserialize_with = "deserialize_dimension")]
    width: u32,

    #[serde(default, deserialize_with = "deserialize_dimension")]
    height: u32,
}

/// COCO category entry. `skeleton` is 1-based.
#[derive(Debug, Serialize, Deserialize)]
struct CocoCategory {
    id: u64,

    #[serde(default)]
    name: Option<String>,

    #[serde(default)]
    supercategory: Option<String>,

    #[serde(default)]
    keypoints: Option<Vec<String>>,

    #[serde(default)]
    skeleton: Option<Vec<[i64; 2]>>,
}

/// COCO annotation entry.
#[derive(Debug, Serialize, Deserialize)]
struct CocoAnnotation {
    #[serde(default)]
    id: u64,

    image_id: u64,

    #[serde(default)]
    category_id: Option<u64>,

    /// COCO bbox format: [x, y, width, height] with (x,y) as top-left corner
    #[serde(default)]
    bbox: Option<[f64; 4]>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    area: Option<f64>,

    #[serde(
        default,
        deserialize_with = "deserialize_iscrowd",
        skip_serializing_if = "Option::is_none"
    )]
    iscrowd: Option<u8>,

    /// Polygons (`[[x, y, ...], ...]`), RLE (`{counts, size}`) or empty.
    #[serde(default)]
    segmentation: Value,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    keypoints: Option<Vec<f64>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    num_keypoints: Option<u64>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, Value>,
}

/// RLE payload as it appears under `segmentation`.
#[derive(Debug, Deserialize)]
struct CocoRle {
    counts: RleCounts,
    #[serde(default)]
    size: [u32; 2],
}

/// Some exporters write `iscrowd` as a boolean.
fn deserialize_iscrowd<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum IsCrowd {
        Bool(bool),
        Int(u8),
    }
    Ok(Option::<IsCrowd>::deserialize(deserializer)?.map(|v| match v {
        IsCrowd::Bool(b) => u8::from(b),
        IsCrowd::Int(i) => i,
    }))
}

/// Image sizes sometimes arrive as floats (`640.0`); the fraction is dropped.
fn deserialize_dimension<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Dimension {
        Int(u32),
        Float(f64),
    }
    match Dimension::deserialize(deserializer)? {
        Dimension::Int(v) => Ok(v),
        Dimension::Float(v) if v.is_finite() && (0.0..=f64::from(u32::MAX)).contains(&v) => {
            Ok(v.trunc() as u32)
        }
        Dimension::Float(v) => Err(serde::de::Error::custom(format!(
            "image dimension {v} is not a valid size"
        ))),
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Adapter for COCO-style JSON.
///
/// `load` accepts a JSON file or a directory containing `annotations.json`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CocoAdapter;

impl FormatAdapter for CocoAdapter {
    fn name(&self) -> &'static str {
        FORMAT
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            det: true,
            segm_poly: true,
            segm_rle: true,
            panoptic: false,
            keypoints: true,
            ..Capabilities::base()
        }
    }

    fn load(&self, path: &Path) -> Result<Dataset, AdapterError> {
        read_coco_json(path)
    }

    fn dump(&self, dataset: &Dataset, path: &Path) -> Result<(), AdapterError> {
        write_coco_json(path, dataset)
    }
}

/// Reads a dataset from a COCO JSON file or a directory holding
/// `annotations.json`.
///
/// # Errors
/// `NotFound` if neither exists, `Malformed` if the document does not have
/// the COCO shape or holds invalid geometry.
pub fn read_coco_json(path: &Path) -> Result<Dataset, AdapterError> {
    let json_path = if path.is_dir() {
        let doc = path.join(DIR_DOCUMENT);
        if !doc.is_file() {
            return Err(AdapterError::not_found(
                FORMAT,
                path,
                format!("expected {DIR_DOCUMENT} in directory"),
            ));
        }
        doc
    } else {
        path.to_path_buf()
    };

    let coco: CocoDataset = read_json_file(FORMAT, &json_path)?;
    let dataset =
        coco_to_ir(coco).map_err(|message| AdapterError::malformed(FORMAT, &json_path, message))?;

    tracing::info!(
        path = %json_path.display(),
        items = dataset.items.len(),
        categories = dataset.categories.len(),
        annotations = dataset.annotation_count(),
        "loaded COCO dataset"
    );
    Ok(dataset)
}

/// Writes a dataset as a COCO JSON file, atomically.
pub fn write_coco_json(path: &Path, dataset: &Dataset) -> Result<(), AdapterError> {
    let coco = ir_to_coco(dataset);
    write_json_atomic(FORMAT, path, &coco)?;

    tracing::info!(
        path = %path.display(),
        images = coco.images.len(),
        annotations = coco.annotations.len(),
        "wrote COCO dataset"
    );
    Ok(())
}

/// Reads a dataset from a COCO JSON string.
///
/// Useful for testing without file I/O.
pub fn from_coco_str(json: &str) -> Result<Dataset, AdapterError> {
    from_coco_slice(json.as_bytes())
}

/// Reads a dataset from a COCO JSON byte slice.
///
/// Useful for fuzzing and processing raw bytes without UTF-8 validation overhead.
pub fn from_coco_slice(bytes: &[u8]) -> Result<Dataset, AdapterError> {
    let coco: CocoDataset = serde_json::from_slice(bytes)
        .map_err(|source| AdapterError::malformed(FORMAT, IN_MEMORY, source.to_string()))?;
    coco_to_ir(coco).map_err(|message| AdapterError::malformed(FORMAT, IN_MEMORY, message))
}

/// Writes a dataset to a COCO JSON string.
///
/// Useful for testing without file I/O.
pub fn to_coco_string(dataset: &Dataset) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&ir_to_coco(dataset))
}

// ============================================================================
// Conversion: COCO -> IR
// ============================================================================

fn coco_to_ir(coco: CocoDataset) -> Result<Dataset, String> {
    let licenses = coco
        .licenses
        .into_iter()
        .map(|l| License {
            name: l.name,
            url: l.url,
        })
        .collect();

    let categories = coco
        .categories
        .into_iter()
        .map(|cat| {
            let skeleton = cat
                .skeleton
                .as_deref()
                .map(skeleton_from_one_based)
                .transpose()
                .map_err(|e| format!("category {}: {e}", cat.id))?;
            Category::try_new(
                cat.id,
                cat.name.unwrap_or_else(|| cat.id.to_string()),
                cat.supercategory,
                cat.keypoints,
                skeleton,
            )
            .map_err(|e| format!("category {}: {e}", cat.id))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut items = Vec::with_capacity(coco.images.len());
    let mut by_image_id: HashMap<u64, usize> = HashMap::with_capacity(coco.images.len());
    for img in coco.images {
        let file_name = img.file_name.unwrap_or_else(|| format!("{}.jpg", img.id));
        if by_image_id.insert(img.id, items.len()).is_some() {
            tracing::warn!(image_id = img.id, "duplicate COCO image id; later entry receives its annotations");
        }
        items.push(Item::new(
            ItemId::from(img.id),
            Image::new(file_name, img.width, img.height),
        ));
    }

    let mut dropped = 0usize;
    for ann in coco.annotations {
        let Some(&index) = by_image_id.get(&ann.image_id) else {
            dropped += 1;
            continue;
        };
        let item = &mut items[index];
        let category_id = ann.category_id.map(CategoryId::new);
        let context = |e: &dyn std::fmt::Display| format!("annotation {}: {e}", ann.id);

        if let Some(kind) = segmentation_to_kind(&ann.segmentation).map_err(|e| context(&e))? {
            push_sibling(item, kind, category_id, &ann.attributes);
        }

        if let Some([x, y, w, h]) = ann.bbox {
            let bbox = BBox::new(x, y, w, h).map_err(|e| context(&e))?;
            push_sibling(item, AnnotationKind::BBox { bbox }, category_id, &ann.attributes);
        }

        if let Some(points) = ann.keypoints.filter(|k| !k.is_empty()) {
            let keypoints = Keypoints::new(points).map_err(|e| context(&e))?;
            push_sibling(
                item,
                AnnotationKind::Keypoints { keypoints },
                category_id,
                &ann.attributes,
            );
        }
    }

    if dropped > 0 {
        tracing::warn!(dropped, "dropped COCO annotations referencing unknown images");
    }

    Ok(Dataset {
        licenses,
        categories,
        items,
        ..Default::default()
    })
}

/// Appends an annotation with the item's next sequential id.
fn push_sibling(
    item: &mut Item,
    kind: AnnotationKind,
    category_id: Option<CategoryId>,
    attributes: &BTreeMap<String, Value>,
) {
    let mut annotation = Annotation::new(item.next_annotation_id(), kind);
    annotation.category_id = category_id;
    annotation.attributes = attributes.clone();
    item.annotations.push(annotation);
}

/// Dispatches on the shape of a `segmentation` value.
///
/// A non-empty array of coordinate arrays is a polygon set, a non-empty
/// object is an RLE payload, and null or empty values carry no geometry.
fn segmentation_to_kind(segmentation: &Value) -> Result<Option<AnnotationKind>, String> {
    match segmentation {
        Value::Null => Ok(None),
        Value::Array(polys) if polys.is_empty() => Ok(None),
        Value::Object(map) if map.is_empty() => Ok(None),
        Value::Array(polys) => {
            let polygons = polys
                .iter()
                .map(|poly| {
                    let points = Vec::<f64>::deserialize(poly)
                        .map_err(|e| format!("polygon segmentation: {e}"))?;
                    Polygon::new(points).map_err(|e| e.to_string())
                })
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(AnnotationKind::Polygon { polygons }))
        }
        Value::Object(_) => {
            let rle =
                CocoRle::deserialize(segmentation).map_err(|e| format!("RLE segmentation: {e}"))?;
            Ok(Some(AnnotationKind::Mask(MaskSource::Rle(Rle {
                counts: rle.counts,
                size: rle.size,
            }))))
        }
        other => Err(format!("unsupported segmentation value: {other}")),
    }
}

// ============================================================================
// Conversion: IR -> COCO
// ============================================================================

fn ir_to_coco(dataset: &Dataset) -> CocoDataset {
    let licenses = dataset
        .licenses
        .iter()
        .enumerate()
        .map(|(idx, l)| CocoLicense {
            id: idx as u64 + 1,
            name: l.name.clone(),
            url: l.url.clone(),
        })
        .collect();

    let categories = dataset
        .categories
        .iter()
        .map(|cat| CocoCategory {
            id: cat.id().as_u64(),
            name: Some(cat.name().to_string()),
            supercategory: cat.supercategory().map(str::to_string),
            keypoints: cat.keypoint_names().map(<[String]>::to_vec),
            skeleton: cat.skeleton().map(|edges| {
                skeleton_to_one_based(edges)
                    .into_iter()
                    .map(|[a, b]| [a as i64, b as i64])
                    .collect()
            }),
        })
        .collect();

    let image_ids = allocate_image_ids(&dataset.items);

    let images = dataset
        .items
        .iter()
        .zip(&image_ids)
        .map(|(item, &id)| CocoImage {
            id,
            file_name: Some(item.image.file_name.clone()),
            width: item.image.width,
            height: item.image.height,
        })
        .collect();

    let mut annotations = Vec::with_capacity(dataset.annotation_count());
    let mut skipped = 0usize;
    for (item, &image_id) in dataset.items.iter().zip(&image_ids) {
        for ann in &item.annotations {
            let next_id = annotations.len() as u64 + 1;
            match lower_annotation(ann, image_id, next_id) {
                Some(record) => annotations.push(record),
                None => skipped += 1,
            }
        }
    }
    if skipped > 0 {
        tracing::warn!(skipped, "COCO has no record for panoptic segments; skipped");
    }

    CocoDataset {
        info: Some(json!({ "description": "annox export" })),
        licenses,
        images,
        annotations,
        categories,
    }
}

/// Picks a unique COCO image id for every item, stable for one dump.
///
/// Numeric item ids are used verbatim (first occurrence wins). Every other
/// item gets its 1-based position, or, if that is already taken, the next
/// id above everything assigned so far.
pub fn allocate_image_ids(items: &[Item]) -> Vec<u64> {
    let mut used: HashSet<u64> = HashSet::with_capacity(items.len());
    let mut ids: Vec<Option<u64>> = items
        .iter()
        .map(|item| item.id.as_numeric().filter(|&n| used.insert(n)))
        .collect();

    // Wraps to 1 past u64::MAX; fewer ids are used than exist, so the
    // search below always terminates.
    let mut next_free = used
        .iter()
        .max()
        .and_then(|max| max.checked_add(1))
        .unwrap_or(1);
    for (idx, slot) in ids.iter_mut().enumerate() {
        if slot.is_some() {
            continue;
        }
        let position = idx as u64 + 1;
        let id = if used.insert(position) {
            position
        } else {
            while used.contains(&next_free) {
                next_free = next_free.checked_add(1).unwrap_or(1);
            }
            used.insert(next_free);
            next_free
        };
        *slot = Some(id);
    }

    ids.into_iter().flatten().collect()
}

/// Lowers one IR annotation to a COCO record. Panoptic segments have no
/// COCO detection counterpart and yield `None`.
fn lower_annotation(ann: &Annotation, image_id: u64, id: u64) -> Option<CocoAnnotation> {
    let empty = || Value::Array(Vec::new());

    let (bbox, area, iscrowd, segmentation, keypoints) = match &ann.kind {
        AnnotationKind::BBox { bbox } => (bbox.to_xywh(), bbox.area(), 0, empty(), None),
        AnnotationKind::Polygon { polygons } => {
            let bbox = bounding_xywh(polygons.iter().flat_map(Polygon::vertices))
                .unwrap_or([0.0; 4]);
            let area = polygons.iter().map(Polygon::area).sum();
            let segmentation = Value::Array(
                polygons
                    .iter()
                    .map(|p| Value::from(p.points().to_vec()))
                    .collect(),
            );
            (bbox, area, 0, segmentation, None)
        }
        // Mask pixels are not decoded: the box and area stay zero.
        AnnotationKind::Mask(source) => match source.rle() {
            Some(rle) => {
                let counts = match &rle.counts {
                    RleCounts::Compressed(s) => Value::from(s.as_str()),
                    RleCounts::Runs(runs) => Value::from(runs.clone()),
                };
                let segmentation = json!({ "counts": counts, "size": rle.size });
                ([0.0; 4], 0.0, 1, segmentation, None)
            }
            None => ([0.0; 4], 0.0, 0, empty(), None),
        },
        AnnotationKind::Keypoints { keypoints } => {
            let bbox = keypoints.bounds().unwrap_or([0.0; 4]);
            (bbox, bbox[2] * bbox[3], 0, empty(), Some(keypoints))
        }
        AnnotationKind::PanopticSegment { .. } => return None,
    };

    Some(CocoAnnotation {
        id,
        image_id,
        category_id: Some(ann.category_id.map_or(0, |c| c.as_u64())),
        bbox: Some(bbox),
        area: Some(area),
        iscrowd: Some(iscrowd),
        segmentation,
        keypoints: keypoints.map(|k| k.points().to_vec()),
        num_keypoints: keypoints.map(|k| k.len() as u64),
        attributes: ann.attributes.clone(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AdapterErrorKind;
    use crate::ir::AnnotationId;

    fn roundtrip_fixture() -> &'static str {
        r#"{
            "images": [
                {"id": 1, "file_name": "a.jpg", "width": 100, "height": 80}
            ],
            "categories": [
                {"id": 1, "name": "person", "keypoints": ["nose", "eye"], "skeleton": [[1, 2]]}
            ],
            "annotations": [
                {"id": 101, "image_id": 1, "category_id": 1, "bbox": [10, 20, 30, 40], "iscrowd": 0, "segmentation": []},
                {"id": 102, "image_id": 1, "category_id": 1, "segmentation": [[10, 20, 40, 20, 40, 60, 10, 60]], "iscrowd": 0},
                {"id": 103, "image_id": 1, "category_id": 1, "keypoints": [1, 2, 2, 5, 6, 2]}
            ]
        }"#
    }

    fn parse(json: &str) -> serde_json::Value {
        serde_json::from_str(json).expect("valid json")
    }

    #[test]
    fn test_load_splits_into_one_item_three_annotations() {
        let dataset = from_coco_str(roundtrip_fixture()).expect("parse failed");

        assert_eq!(dataset.items.len(), 1);
        assert_eq!(dataset.categories.len(), 1);
        let item = &dataset.items[0];
        assert_eq!(item.id, ItemId::from("1"));
        assert_eq!(item.annotations.len(), 3);

        let kinds: Vec<_> = item.annotations.iter().map(|a| a.kind.name()).collect();
        assert_eq!(kinds, vec!["bbox", "polygon", "keypoints"]);

        let ids: Vec<_> = item.annotations.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![AnnotationId(1), AnnotationId(2), AnnotationId(3)]);

        assert_eq!(dataset.categories[0].skeleton(), Some(&[[0u32, 1u32]][..]));
    }

    #[test]
    fn test_roundtrip_counts_and_skeleton() {
        let dataset = from_coco_str(roundtrip_fixture()).expect("parse failed");
        let out = parse(&to_coco_string(&dataset).expect("serialize failed"));

        assert_eq!(out["images"].as_array().unwrap().len(), 1);
        assert_eq!(out["annotations"].as_array().unwrap().len(), 3);
        assert_eq!(out["categories"].as_array().unwrap().len(), 1);
        assert_eq!(out["categories"][0]["skeleton"], json!([[1, 2]]));
        assert_eq!(out["categories"][0]["keypoints"], json!(["nose", "eye"]));
    }

    #[test]
    fn test_box_and_polygon_become_siblings() {
        let json = r#"{
            "images": [{"id": 7, "file_name": "b.jpg", "width": 50, "height": 50}],
            "annotations": [{
                "id": 1, "image_id": 7, "category_id": 3,
                "segmentation": [[0, 0, 4, 0, 4, 3, 0, 3]],
                "bbox": [0, 0, 4, 3],
                "keypoints": [1, 1, 2, 2, 2, 2],
                "attributes": {"occluded": true}
            }]
        }"#;
        let dataset = from_coco_str(json).expect("parse failed");
        let anns = &dataset.items[0].annotations;
        assert_eq!(anns.len(), 3);
        assert!(anns.iter().all(|a| a.category_id == Some(CategoryId(3))));
        assert!(anns
            .iter()
            .all(|a| a.attributes.get("occluded") == Some(&Value::Bool(true))));
    }

    #[test]
    fn test_annotation_ids_are_per_item() {
        let json = r#"{
            "images": [
                {"id": 1, "file_name": "a.jpg", "width": 10, "height": 10},
                {"id": 2, "file_name": "b.jpg", "width": 10, "height": 10}
            ],
            "annotations": [
                {"id": 50, "image_id": 1, "bbox": [0, 0, 1, 1]},
                {"id": 51, "image_id": 2, "bbox": [0, 0, 1, 1]},
                {"id": 52, "image_id": 1, "bbox": [0, 0, 1, 1]},
                {"id": 53, "image_id": 2, "bbox": [0, 0, 1, 1]}
            ]
        }"#;
        let dataset = from_coco_str(json).expect("parse failed");
        for item in &dataset.items {
            let ids: Vec<_> = item.annotations.iter().map(|a| a.id.as_u64()).collect();
            assert_eq!(ids, vec![1, 2]);
        }
    }

    #[test]
    fn test_unknown_image_annotations_dropped() {
        let json = r#"{
            "images": [{"id": 1, "file_name": "a.jpg", "width": 10, "height": 10}],
            "annotations": [
                {"id": 1, "image_id": 1, "bbox": [0, 0, 1, 1]},
                {"id": 2, "image_id": 99, "bbox": [0, 0, 1, 1]}
            ]
        }"#;
        let dataset = from_coco_str(json).expect("lenient load");
        assert_eq!(dataset.annotation_count(), 1);
    }

    #[test]
    fn test_rle_passes_through() {
        let json = r#"{
            "images": [{"id": 1, "file_name": "a.jpg", "width": 10, "height": 10}],
            "annotations": [
                {"id": 1, "image_id": 1, "segmentation": {"counts": "ab12", "size": [10, 10]}, "iscrowd": 1},
                {"id": 2, "image_id": 1, "segmentation": {"counts": [3, 4, 93], "size": [10, 10]}, "iscrowd": true}
            ]
        }"#;
        let dataset = from_coco_str(json).expect("parse failed");
        let anns = &dataset.items[0].annotations;
        assert_eq!(anns.len(), 2);
        match &anns[0].kind {
            AnnotationKind::Mask(MaskSource::Rle(rle)) => {
                assert_eq!(rle.counts, RleCounts::Compressed("ab12".into()));
                assert_eq!(rle.size, [10, 10]);
            }
            other => panic!("expected mask, got {other:?}"),
        }

        let out = parse(&to_coco_string(&dataset).unwrap());
        let first = &out["annotations"][0];
        assert_eq!(first["segmentation"], json!({"counts": "ab12", "size": [10, 10]}));
        assert_eq!(first["iscrowd"], 1);
        assert_eq!(first["bbox"], json!([0.0, 0.0, 0.0, 0.0]));
        assert_eq!(first["area"], 0.0);
        assert_eq!(out["annotations"][1]["segmentation"]["counts"], json!([3, 4, 93]));
    }

    #[test]
    fn test_mask_file_dumps_empty_segmentation() {
        let dataset = Dataset {
            items: vec![Item::new("1", Image::new("a.jpg", 10, 10)).with_annotation(
                Annotation::mask(1u64, MaskSource::File("m.png".into())).with_category(2u64),
            )],
            ..Default::default()
        };
        let out = parse(&to_coco_string(&dataset).unwrap());
        let ann = &out["annotations"][0];
        assert_eq!(ann["iscrowd"], 0);
        assert_eq!(ann["segmentation"], json!([]));
        assert_eq!(ann["category_id"], 2);
    }

    #[test]
    fn test_polygon_bbox_and_shoelace_area() {
        let polygons = vec![
            Polygon::new(vec![0.0, 0.0, 4.0, 0.0, 4.0, 3.0, 0.0, 3.0]).unwrap(),
            Polygon::new(vec![10.0, 10.0, 12.0, 10.0, 12.0, 12.0]).unwrap(),
        ];
        let dataset = Dataset {
            items: vec![Item::new("1", Image::new("a.jpg", 20, 20))
                .with_annotation(Annotation::polygon(1u64, polygons))],
            ..Default::default()
        };
        let out = parse(&to_coco_string(&dataset).unwrap());
        let ann = &out["annotations"][0];
        assert_eq!(ann["bbox"], json!([0.0, 0.0, 12.0, 12.0]));
        assert_eq!(ann["area"], 14.0);
        assert_eq!(ann["iscrowd"], 0);
        assert_eq!(ann["segmentation"].as_array().unwrap().len(), 2);
        assert_eq!(ann["category_id"], 0);
    }

    #[test]
    fn test_keypoints_bbox_ignores_visibility() {
        let dataset = Dataset {
            items: vec![Item::new("1", Image::new("a.jpg", 20, 20)).with_annotation(
                Annotation::keypoints(
                    1u64,
                    Keypoints::new(vec![1.0, 2.0, 2.0, 5.0, 6.0, 9.0]).unwrap(),
                ),
            )],
            ..Default::default()
        };
        let out = parse(&to_coco_string(&dataset).unwrap());
        let ann = &out["annotations"][0];
        assert_eq!(ann["bbox"], json!([1.0, 2.0, 4.0, 4.0]));
        assert_eq!(ann["area"], 16.0);
        assert_eq!(ann["num_keypoints"], 2);
        assert_eq!(ann["keypoints"], json!([1.0, 2.0, 2.0, 5.0, 6.0, 9.0]));
    }

    #[test]
    fn test_dump_ids_are_global_and_panoptic_skipped() {
        let bbox = BBox::new(0.0, 0.0, 2.0, 3.0).unwrap();
        let dataset = Dataset {
            items: vec![
                Item::new("5", Image::new("a.jpg", 10, 10))
                    .with_annotation(Annotation::bbox(1u64, bbox))
                    .with_annotation(Annotation::panoptic_segment(2u64, 9, 1u64, 40))
                    .with_annotation(Annotation::bbox(3u64, bbox)),
                Item::new("6", Image::new("b.jpg", 10, 10))
                    .with_annotation(Annotation::bbox(1u64, bbox)),
            ],
            ..Default::default()
        };
        let out = parse(&to_coco_string(&dataset).unwrap());
        let anns = out["annotations"].as_array().unwrap();
        let ids: Vec<_> = anns.iter().map(|a| a["id"].as_u64().unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        let image_ids: Vec<_> = anns.iter().map(|a| a["image_id"].as_u64().unwrap()).collect();
        assert_eq!(image_ids, vec![5, 5, 6]);
        assert_eq!(anns[0]["area"], 6.0);
    }

    #[test]
    fn test_image_id_allocation() {
        let items: Vec<Item> = ["3", "cat", "1", "3", "dog"]
            .iter()
            .map(|id| Item::new(*id, Image::new("x.jpg", 1, 1)))
            .collect();
        let ids = allocate_image_ids(&items);
        // Numeric ids claim themselves first; the rest fall back to position.
        assert_eq!(ids, vec![3, 2, 1, 4, 5]);

        let unique: HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn test_image_id_allocation_position_taken() {
        let items: Vec<Item> = ["2", "x"]
            .iter()
            .map(|id| Item::new(*id, Image::new("x.jpg", 1, 1)))
            .collect();
        // "x" would take position 2, which "2" already owns.
        assert_eq!(allocate_image_ids(&items), vec![2, 3]);
    }

    #[test]
    fn test_float_image_dimensions_are_accepted() {
        let json = r#"{"images": [{"id": 1, "file_name": "a.jpg", "width": 640.0, "height": 480.7}]}"#;
        let dataset = from_coco_str(json).expect("float sizes load");
        assert_eq!((dataset.items[0].image.width, dataset.items[0].image.height), (640, 480));

        let err = from_coco_str(r#"{"images": [{"id": 1, "width": -3.0, "height": 1}]}"#).unwrap_err();
        assert_eq!(err.kind(), AdapterErrorKind::Malformed);
    }

    #[test]
    fn test_image_id_allocation_at_u64_max() {
        let max = u64::MAX.to_string();
        let items: Vec<Item> = [max.as_str(), "x", "2"]
            .iter()
            .map(|id| Item::new(*id, Image::new("x.jpg", 1, 1)))
            .collect();
        // "x" loses position 2 to "2"; the search wraps past u64::MAX to 1.
        assert_eq!(allocate_image_ids(&items), vec![u64::MAX, 1, 2]);

        let dataset = Dataset::from_items(vec![Item::new(max.as_str(), Image::new("a.jpg", 4, 4))]);
        let json = parse(&to_coco_string(&dataset).unwrap());
        assert_eq!(json["images"][0]["id"], u64::MAX);
    }

    #[test]
    fn test_invalid_skeleton_is_malformed() {
        let json = r#"{"categories": [{"id": 1, "name": "p", "keypoints": ["a"], "skeleton": [[1, 2]]}]}"#;
        let err = from_coco_str(json).unwrap_err();
        assert_eq!(err.kind(), AdapterErrorKind::Malformed);
        assert!(err.to_string().contains("skeleton"));
    }

    #[test]
    fn test_negative_bbox_size_is_malformed() {
        let json = r#"{
            "images": [{"id": 1, "file_name": "a.jpg", "width": 10, "height": 10}],
            "annotations": [{"id": 4, "image_id": 1, "bbox": [0, 0, -1, 1]}]
        }"#;
        let err = from_coco_str(json).unwrap_err();
        assert_eq!(err.kind(), AdapterErrorKind::Malformed);
        assert!(err.to_string().contains("annotation 4"));
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        let err = from_coco_str(r#"{"images": {"id": 1}}"#).unwrap_err();
        assert_eq!(err.kind(), AdapterErrorKind::Malformed);

        let err = from_coco_str(r#"{"annotations": [{"id": 1}]}"#).unwrap_err();
        assert_eq!(err.kind(), AdapterErrorKind::Malformed);
    }

    #[test]
    fn test_load_from_directory_and_not_found() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let err = read_coco_json(temp.path()).unwrap_err();
        assert_eq!(err.kind(), AdapterErrorKind::NotFound);

        std::fs::write(temp.path().join(DIR_DOCUMENT), roundtrip_fixture()).unwrap();
        let dataset = read_coco_json(temp.path()).expect("load from directory");
        assert_eq!(dataset.items.len(), 1);

        let err = read_coco_json(&temp.path().join("nope.json")).unwrap_err();
        assert_eq!(err.kind(), AdapterErrorKind::NotFound);
    }

    #[test]
    fn test_dump_creates_parent_dirs() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let out = temp.path().join("a/b/out.json");
        let dataset = from_coco_str(roundtrip_fixture()).unwrap();
        CocoAdapter.dump(&dataset, &out).expect("dump");
        let reloaded = CocoAdapter.load(&out).expect("reload");
        assert_eq!(reloaded.annotation_count(), 3);
    }

    #[test]
    fn test_licenses_roundtrip() {
        let json = r#"{"licenses": [{"id": 9, "name": "CC BY 4.0", "url": "https://example.org"}]}"#;
        let dataset = from_coco_str(json).unwrap();
        assert_eq!(dataset.licenses[0].name, "CC BY 4.0");
        let out = parse(&to_coco_string(&dataset).unwrap());
        assert_eq!(out["licenses"][0]["id"], 1);
        assert_eq!(out["licenses"][0]["url"], "https://example.org");
        assert_eq!(out["info"]["description"], "annox export");
    }
}
