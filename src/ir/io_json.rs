//! JSON I/O for the canonical annox format.
//!
//! A canonical file is either one JSON document holding a whole [`Dataset`],
//! or a line-delimited stream with one [`Item`] per line. The stream form has
//! no dataset-level fields and is meant for validating large item dumps.
//!
//! This module also holds the JSON helpers the other adapters share, most
//! importantly [`write_json_atomic`].

use std::fs::{self, File};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;

use super::model::{Dataset, Item};
use crate::adapter::{Capabilities, FormatAdapter};
use crate::error::{AdapterError, AnnoxError};

const FORMAT: &str = "annox";
const DIR_DOCUMENT: &str = "dataset.json";

/// Reads a dataset from a canonical JSON file.
///
/// # Errors
/// Returns an error if the file cannot be read, is not valid JSON, or holds
/// a value that violates a construction invariant (e.g. a negative box width).
pub fn read_dataset_json(path: &Path) -> Result<Dataset, AnnoxError> {
    let file = File::open(path).map_err(AnnoxError::Io)?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).map_err(|source| AnnoxError::DatasetParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads a line-delimited item stream. Blank lines are skipped.
///
/// # Errors
/// Returns [`AnnoxError::ItemParse`] with the 1-based line number of the
/// first line that does not hold a valid item.
pub fn read_items_jsonl(path: &Path) -> Result<Vec<Item>, AnnoxError> {
    let file = File::open(path).map_err(AnnoxError::Io)?;
    let reader = BufReader::new(file);

    let mut items = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(AnnoxError::Io)?;
        if line.trim().is_empty() {
            continue;
        }
        let item = serde_json::from_str(&line).map_err(|source| AnnoxError::ItemParse {
            path: path.to_path_buf(),
            line: idx + 1,
            source,
        })?;
        items.push(item);
    }
    Ok(items)
}

/// Writes a dataset to a canonical JSON file, atomically.
pub fn write_dataset_json(path: &Path, dataset: &Dataset) -> Result<(), AdapterError> {
    write_json_atomic(FORMAT, path, dataset)
}

/// Reads a dataset from a canonical JSON string.
///
/// Useful for testing without file I/O.
pub fn from_json_str(json: &str) -> Result<Dataset, serde_json::Error> {
    serde_json::from_str(json)
}

/// Reads a dataset from a canonical JSON byte slice.
pub fn from_json_slice(bytes: &[u8]) -> Result<Dataset, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Writes a dataset to a canonical JSON string.
///
/// Useful for testing without file I/O.
pub fn to_json_string(dataset: &Dataset) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(dataset)
}

/// Reads and deserializes a JSON document for the given adapter.
///
/// A missing path is `NotFound`; a document of the wrong shape is `Malformed`.
pub(crate) fn read_json_file<T: DeserializeOwned>(
    format: &'static str,
    path: &Path,
) -> Result<T, AdapterError> {
    if !path.is_file() {
        return Err(AdapterError::not_found(format, path, "expected a JSON file"));
    }
    let file = File::open(path).map_err(|source| AdapterError::io(format, path, source))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|source| AdapterError::malformed(format, path, source.to_string()))
}

/// Serializes `value` completely in memory, then replaces `path` with it in
/// one rename. Parent directories are created as needed.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(
    format: &'static str,
    path: &Path,
    value: &T,
) -> Result<(), AdapterError> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|source| AdapterError::io(format, path, source.into()))?;
    write_atomic(format, path, &bytes)
}

/// Writes `bytes` to a temporary file next to `path` and persists it over `path`.
pub(crate) fn write_atomic(
    format: &'static str,
    path: &Path,
    bytes: &[u8],
) -> Result<(), AdapterError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|source| AdapterError::io(format, &parent, source))?;

    let mut tmp =
        NamedTempFile::new_in(&parent).map_err(|source| AdapterError::io(format, &parent, source))?;
    tmp.write_all(bytes)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|source| AdapterError::io(format, path, source))?;
    tmp.persist(path)
        .map_err(|err| AdapterError::io(format, path, err.error))?;
    Ok(())
}

/// Adapter for the canonical format itself.
///
/// `load` accepts a dataset document, a `.jsonl` item stream, or a directory
/// containing `dataset.json`.
#[derive(Clone, Copy, Debug, Default)]
pub struct CanonicalAdapter;

impl FormatAdapter for CanonicalAdapter {
    fn name(&self) -> &'static str {
        FORMAT
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            det: true,
            segm_poly: true,
            segm_rle: true,
            panoptic: true,
            keypoints: true,
            attributes: true,
        }
    }

    fn load(&self, path: &Path) -> Result<Dataset, AdapterError> {
        let path = if path.is_dir() {
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

        if is_jsonl(&path) {
            if !path.is_file() {
                return Err(AdapterError::not_found(FORMAT, &path, "expected a JSONL file"));
            }
            return read_items_jsonl(&path)
                .map(Dataset::from_items)
                .map_err(|err| match err {
                    AnnoxError::Io(source) => AdapterError::io(FORMAT, &path, source),
                    other => AdapterError::malformed(FORMAT, &path, other.to_string()),
                });
        }

        let dataset: Dataset = read_json_file(FORMAT, &path)?;
        tracing::info!(
            path = %path.display(),
            items = dataset.items.len(),
            annotations = dataset.annotation_count(),
            "loaded canonical dataset"
        );
        Ok(dataset)
    }

    fn dump(&self, dataset: &Dataset, path: &Path) -> Result<(), AdapterError> {
        write_dataset_json(path, dataset)?;
        tracing::info!(path = %path.display(), items = dataset.items.len(), "wrote canonical dataset");
        Ok(())
    }
}

/// True when the path has a `.jsonl` extension (any case).
pub fn is_jsonl(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"))
}
