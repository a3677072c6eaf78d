//! Geometry value types: boxes, polygons, run-length masks and keypoints.
//!
//! Every constructor checks its invariants eagerly and returns a
//! [`GeometryError`] instead of building an invalid value. Deserialization
//! goes through the same constructors, so a value read from disk is as
//! trustworthy as one built in code.

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

fn is_false(b: &bool) -> bool {
    !*b
}

fn check_non_negative(field: &'static str, value: f64) -> Result<(), GeometryError> {
    // Written as a negated comparison so NaN is rejected too.
    if !(value >= 0.0) {
        return Err(GeometryError::Negative { field, value });
    }
    Ok(())
}

fn check_unit(field: &'static str, value: f64) -> Result<(), GeometryError> {
    if !(0.0..=1.0).contains(&value) {
        return Err(GeometryError::OutOfUnitRange { field, value });
    }
    Ok(())
}

/// Shoelace area of a flat `[x0, y0, x1, y1, ...]` vertex sequence.
///
/// Fewer than 3 vertices yields `0.0`. A trailing odd coordinate is ignored.
pub fn shoelace_area(points: &[f64]) -> f64 {
    let n = points.len() / 2;
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let (x1, y1) = (points[2 * i], points[2 * i + 1]);
        let j = (i + 1) % n;
        let (x2, y2) = (points[2 * j], points[2 * j + 1]);
        sum += x1 * y2 - x2 * y1;
    }
    sum.abs() / 2.0
}

/// Axis-aligned `[x, y, w, h]` box around a set of points, or `None` when
/// there are no points.
pub fn bounding_xywh(points: impl IntoIterator<Item = (f64, f64)>) -> Option<[f64; 4]> {
    let mut iter = points.into_iter();
    let (x0, y0) = iter.next()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (x0, y0, x0, y0);
    for (x, y) in iter {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }
    Some([min_x, min_y, max_x - min_x, max_y - min_y])
}

// ============================================================================
// BBox
// ============================================================================

/// An axis-aligned box in `x, y, w, h` form with `(x, y)` the top-left corner.
///
/// `w` and `h` are never negative. When `normalized` is set, all four fields
/// are fractions of the image size and lie in `[0, 1]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BBoxRepr", into = "BBoxRepr")]
pub struct BBox {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    normalized: bool,
}

#[derive(Serialize, Deserialize)]
struct BBoxRepr {
    x: f64,
    y: f64,
    w: f64,
    h: f64,
    #[serde(default, skip_serializing_if = "is_false")]
    normalized: bool,
}

impl BBox {
    /// Creates a pixel-space box.
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Result<Self, GeometryError> {
        Self::try_new(x, y, w, h, false)
    }

    /// Creates a normalized box; every field must lie in `[0, 1]`.
    pub fn normalized(x: f64, y: f64, w: f64, h: f64) -> Result<Self, GeometryError> {
        Self::try_new(x, y, w, h, true)
    }

    pub fn try_new(x: f64, y: f64, w: f64, h: f64, normalized: bool) -> Result<Self, GeometryError> {
        check_non_negative("w", w)?;
        check_non_negative("h", h)?;
        if normalized {
            check_unit("x", x)?;
            check_unit("y", y)?;
            check_unit("w", w)?;
            check_unit("h", h)?;
        }
        Ok(Self {
            x,
            y,
            w,
            h,
            normalized,
        })
    }

    /// Creates a normalized box from center form (`cx, cy, w, h`), as used
    /// by YOLO label files.
    pub fn from_normalized_center(cx: f64, cy: f64, w: f64, h: f64) -> Result<Self, GeometryError> {
        Self::normalized(cx - w / 2.0, cy - h / 2.0, w, h)
    }

    #[inline]
    pub fn x(&self) -> f64 {
        self.x
    }

    #[inline]
    pub fn y(&self) -> f64 {
        self.y
    }

    #[inline]
    pub fn w(&self) -> f64 {
        self.w
    }

    #[inline]
    pub fn h(&self) -> f64 {
        self.h
    }

    #[inline]
    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.w * self.h
    }

    /// Returns the box as `[x, y, w, h]`.
    #[inline]
    pub fn to_xywh(&self) -> [f64; 4] {
        [self.x, self.y, self.w, self.h]
    }

    /// Returns the box in normalized center form `(cx, cy, w, h)` relative
    /// to an image of the given size. Normalized boxes ignore the size.
    pub fn to_normalized_center(&self, image_width: f64, image_height: f64) -> (f64, f64, f64, f64) {
        let (x, y, w, h) = if self.normalized {
            (self.x, self.y, self.w, self.h)
        } else {
            (
                self.x / image_width,
                self.y / image_height,
                self.w / image_width,
                self.h / image_height,
            )
        };
        (x + w / 2.0, y + h / 2.0, w, h)
    }

    /// Scales a normalized box to pixel space. Pixel boxes are returned as-is.
    pub fn to_pixel(&self, image_width: f64, image_height: f64) -> Result<Self, GeometryError> {
        if !self.normalized {
            return Ok(*self);
        }
        Self::new(
            self.x * image_width,
            self.y * image_height,
            self.w * image_width,
            self.h * image_height,
        )
    }

    /// True when a pixel-space box reaches past the right or bottom edge of
    /// an image of the given size.
    pub fn exceeds_canvas(&self, image_width: u32, image_height: u32) -> bool {
        !self.normalized
            && (self.x + self.w > image_width as f64 || self.y + self.h > image_height as f64)
    }
}

impl TryFrom<BBoxRepr> for BBox {
    type Error = GeometryError;

    fn try_from(r: BBoxRepr) -> Result<Self, Self::Error> {
        BBox::try_new(r.x, r.y, r.w, r.h, r.normalized)
    }
}

impl From<BBox> for BBoxRepr {
    fn from(b: BBox) -> Self {
        BBoxRepr {
            x: b.x,
            y: b.y,
            w: b.w,
            h: b.h,
            normalized: b.normalized,
        }
    }
}

// ============================================================================
// Polygon
// ============================================================================

/// A closed polygon as a flat `[x0, y0, x1, y1, ...]` vertex sequence with
/// at least 3 vertices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PolygonRepr", into = "PolygonRepr")]
pub struct Polygon {
    points: Vec<f64>,
    normalized: bool,
}

#[derive(Serialize, Deserialize)]
struct PolygonRepr {
    points: Vec<f64>,
    #[serde(default, skip_serializing_if = "is_false")]
    normalized: bool,
}

impl Polygon {
    pub fn new(points: Vec<f64>) -> Result<Self, GeometryError> {
        Self::try_new(points, false)
    }

    pub fn try_new(points: Vec<f64>, normalized: bool) -> Result<Self, GeometryError> {
        if points.len() % 2 != 0 {
            return Err(GeometryError::OddCoordinateCount(points.len()));
        }
        if points.len() < 6 {
            return Err(GeometryError::TooFewVertices(points.len()));
        }
        if normalized {
            for &v in &points {
                check_unit("polygon coordinate", v)?;
            }
        }
        Ok(Self { points, normalized })
    }

    #[inline]
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    #[inline]
    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// Iterates over `(x, y)` vertices.
    pub fn vertices(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.chunks_exact(2).map(|p| (p[0], p[1]))
    }

    /// Shoelace area of the polygon.
    pub fn area(&self) -> f64 {
        shoelace_area(&self.points)
    }
}

impl TryFrom<PolygonRepr> for Polygon {
    type Error = GeometryError;

    fn try_from(r: PolygonRepr) -> Result<Self, Self::Error> {
        Polygon::try_new(r.points, r.normalized)
    }
}

impl From<Polygon> for PolygonRepr {
    fn from(p: Polygon) -> Self {
        PolygonRepr {
            points: p.points,
            normalized: p.normalized,
        }
    }
}

// ============================================================================
// RLE
// ============================================================================

/// Run lengths of a mask, either COCO-compressed or explicit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RleCounts {
    Compressed(String),
    Runs(Vec<u64>),
}

/// A run-length-encoded binary mask. `size` is `[height, width]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rle {
    pub counts: RleCounts,
    pub size: [u32; 2],
}

impl Rle {
    pub fn new(counts: RleCounts, height: u32, width: u32) -> Self {
        Self {
            counts,
            size: [height, width],
        }
    }

    pub fn height(&self) -> u32 {
        self.size[0]
    }

    pub fn width(&self) -> u32 {
        self.size[1]
    }
}

// ============================================================================
// Keypoints
// ============================================================================

/// Flat `(x, y, visibility)` triplets.
///
/// When `normalized` is set, x and y lie in `[0, 1]`; visibility is never
/// range-checked.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "KeypointsRepr", into = "KeypointsRepr")]
pub struct Keypoints {
    points: Vec<f64>,
    normalized: bool,
}

#[derive(Serialize, Deserialize)]
struct KeypointsRepr {
    points: Vec<f64>,
    #[serde(default, skip_serializing_if = "is_false")]
    normalized: bool,
}

impl Keypoints {
    pub fn new(points: Vec<f64>) -> Result<Self, GeometryError> {
        Self::try_new(points, false)
    }

    pub fn try_new(points: Vec<f64>, normalized: bool) -> Result<Self, GeometryError> {
        if points.len() % 3 != 0 {
            return Err(GeometryError::NotTriplets(points.len()));
        }
        if normalized {
            for (i, &v) in points.iter().enumerate() {
                if i % 3 == 2 {
                    continue;
                }
                check_unit("keypoint coordinate", v)?;
            }
        }
        Ok(Self { points, normalized })
    }

    #[inline]
    pub fn points(&self) -> &[f64] {
        &self.points
    }

    #[inline]
    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    /// Number of `(x, y, visibility)` triplets.
    pub fn len(&self) -> usize {
        self.points.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterates over `(x, y)` positions, skipping the visibility channel.
    pub fn positions(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.chunks_exact(3).map(|p| (p[0], p[1]))
    }

    /// Bounding `[x, y, w, h]` over all positions, or `None` without points.
    pub fn bounds(&self) -> Option<[f64; 4]> {
        bounding_xywh(self.positions())
    }
}

impl TryFrom<KeypointsRepr> for Keypoints {
    type Error = GeometryError;

    fn try_from(r: KeypointsRepr) -> Result<Self, Self::Error> {
        Keypoints::try_new(r.points, r.normalized)
    }
}

impl From<Keypoints> for KeypointsRepr {
    fn from(k: Keypoints) -> Self {
        KeypointsRepr {
            points: k.points,
            normalized: k.normalized,
        }
    }
}
