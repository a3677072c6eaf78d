use std::path::PathBuf;
use thiserror::Error;

use crate::validation::ValidationReport;

/// Invalid coordinate or shape when constructing a geometry value.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum GeometryError {
    #[error("{field} must be non-negative, got {value}")]
    Negative { field: &'static str, value: f64 },

    #[error("normalized {field} must be within [0,1], got {value}")]
    OutOfUnitRange { field: &'static str, value: f64 },

    #[error("polygon needs at least 3 vertices (6 coordinates), got {0} coordinate(s)")]
    TooFewVertices(usize),

    #[error("polygon coordinate count must be even, got {0}")]
    OddCoordinateCount(usize),

    #[error("keypoints length must be a multiple of 3, got {0}")]
    NotTriplets(usize),
}

/// Invalid cross-reference or missing required field when building schema values.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SchemaError {
    #[error(
        "skeleton edge [{a}, {b}] of category '{category}' must reference keypoint_names (0..{len})"
    )]
    SkeletonOutOfRange {
        category: String,
        a: u32,
        b: u32,
        len: usize,
    },

    #[error("skeleton index {0} is not a valid 1-based keypoint index")]
    SkeletonIndexNotOneBased(i64),

    #[error("mask must have an rle payload or a png_path")]
    MaskSourceMissing,

    #[error("mask must have exactly one of rle or png_path, got both")]
    MaskSourceAmbiguous,

    #[error("panoptic segment {segment_id} must have a category_id")]
    PanopticWithoutCategory { segment_id: u64 },
}

/// A per-annotation consistency violation found while validating an item.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ConsistencyError {
    #[error("bbox has negative coords ({x}, {y}) in item {item}")]
    NegativeBBoxOrigin { item: String, x: f64, y: f64 },

    #[error("keypoints length {actual} != expected {expected} for category {category}")]
    KeypointCountMismatch {
        actual: usize,
        expected: usize,
        category: String,
    },

    #[error("panoptic segment {segment_id} in item {item} has no category_id")]
    PanopticWithoutCategory { item: String, segment_id: u64 },
}

/// Which failure class an [`AdapterError`] belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdapterErrorKind {
    NotFound,
    Malformed,
    Io,
}

/// A failure at the boundary between an on-disk format and the canonical schema.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("{format}: {} not found: {message}", path.display())]
    NotFound {
        format: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("{format}: malformed input in {}: {message}", path.display())]
    Malformed {
        format: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("{format}: I/O error on {}: {source}", path.display())]
    Io {
        format: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AdapterError {
    pub fn kind(&self) -> AdapterErrorKind {
        match self {
            AdapterError::NotFound { .. } => AdapterErrorKind::NotFound,
            AdapterError::Malformed { .. } => AdapterErrorKind::Malformed,
            AdapterError::Io { .. } => AdapterErrorKind::Io,
        }
    }

    pub(crate) fn not_found(
        format: &'static str,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        AdapterError::NotFound {
            format,
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn malformed(
        format: &'static str,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
    ) -> Self {
        AdapterError::Malformed {
            format,
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn io(format: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AdapterError::Io {
            format,
            path: path.into(),
            source,
        }
    }
}

/// The main error type for annox operations.
#[derive(Debug, Error)]
pub enum AnnoxError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("Failed to parse dataset JSON from {path}: {source}")]
    DatasetParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse item on line {line} of {path}: {source}")]
    ItemParse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown format '{name}' (available: {available})")]
    UnknownFormat { name: String, available: String },

    #[error("Parallel execution failed: {0}")]
    Parallel(#[from] crate::parallel::ParallelError),

    #[error("Validation failed with {error_count} error(s) and {warning_count} warning(s)")]
    ValidationFailed {
        error_count: usize,
        warning_count: usize,
        report: ValidationReport,
    },
}
