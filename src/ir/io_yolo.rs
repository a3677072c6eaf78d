//! YOLO detection reader and writer.
//!
//! A YOLO dataset here is a flat directory: one `<stem>.txt` label file per
//! image, next to the image itself, plus an optional `data.yaml` naming the
//! classes. Label lines are `class cx cy w h` in normalized center form; the
//! IR stores pixel-space boxes.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use walkdir::WalkDir;

use super::io_json::write_atomic;
use super::model::{Annotation, AnnotationKind, Category, Dataset, Image, Item};
use super::{BBox, CategoryId, ItemId};
use crate::adapter::{Capabilities, FormatAdapter};
use crate::error::AdapterError;

const FORMAT: &str = "yolo";
const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];
const LABEL_EXTENSION: &str = "txt";
const DATA_YAML: &str = "data.yaml";

/// Adapter for flat YOLO detection directories.
#[derive(Clone, Copy, Debug, Default)]
pub struct YoloAdapter;

impl FormatAdapter for YoloAdapter {
    fn name(&self) -> &'static str {
        FORMAT
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            det: true,
            attributes: false,
            ..Capabilities::base()
        }
    }

    fn load(&self, path: &Path) -> Result<Dataset, AdapterError> {
        read_yolo_dir(path)
    }

    fn dump(&self, dataset: &Dataset, path: &Path) -> Result<(), AdapterError> {
        write_yolo_dir(path, dataset)
    }
}

/// Read a YOLO directory into IR.
pub fn read_yolo_dir(path: &Path) -> Result<Dataset, AdapterError> {
    if !path.is_dir() {
        return Err(AdapterError::not_found(
            FORMAT,
            path,
            "expected a directory of label files",
        ));
    }

    let mut classes = match read_data_yaml_names(&path.join(DATA_YAML))? {
        Some(names) => ClassMap::Named(names),
        None => ClassMap::Inferred(Vec::new()),
    };

    let mut label_files = collect_files_with_extensions(path, &[LABEL_EXTENSION])?;
    label_files.sort();

    let mut items = Vec::with_capacity(label_files.len());
    for (index, label_path) in label_files.iter().enumerate() {
        let image_path = find_image_for_label(label_path).ok_or_else(|| {
            AdapterError::malformed(
                FORMAT,
                label_path,
                format!(
                    "no image found for label file (tried {})",
                    IMAGE_EXTENSIONS.join(", ")
                ),
            )
        })?;
        let (width, height) = read_image_dimensions(&image_path)?;
        let file_name = image_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut item = Item::new(
            ItemId::from(index as u64 + 1),
            Image::new(file_name, width, height),
        );

        let content = fs::read_to_string(label_path)
            .map_err(|source| AdapterError::io(FORMAT, label_path, source))?;
        for (line_idx, line) in content.lines().enumerate() {
            let line_num = line_idx + 1;
            let Some(row) = parse_label_line(line)
                .map_err(|message| line_error(label_path, line_num, message))?
            else {
                continue;
            };

            let category_id = classes
                .category_for(row.class_id)
                .map_err(|message| line_error(label_path, line_num, message))?;

            let bbox = BBox::from_normalized_center(row.cx, row.cy, row.w, row.h)
                .and_then(|b| b.to_pixel(f64::from(width), f64::from(height)))
                .map_err(|e| line_error(label_path, line_num, e.to_string()))?;

            let annotation =
                Annotation::bbox(item.next_annotation_id(), bbox).with_category(category_id);
            item.annotations.push(annotation);
        }
        items.push(item);
    }

    let categories = classes.into_categories();
    tracing::info!(
        path = %path.display(),
        items = items.len(),
        categories = categories.len(),
        "loaded YOLO directory"
    );

    Ok(Dataset {
        categories,
        items,
        ..Default::default()
    })
}

/// Write an IR dataset as a YOLO directory.
///
/// Writes `data.yaml` plus one label file per item. Only box annotations are
/// written, and image binaries are not copied.
pub fn write_yolo_dir(path: &Path, dataset: &Dataset) -> Result<(), AdapterError> {
    fs::create_dir_all(path).map_err(|source| AdapterError::io(FORMAT, path, source))?;

    let mut categories_sorted: Vec<&Category> = dataset.categories.iter().collect();
    categories_sorted.sort_by_key(|cat| cat.id());

    let category_to_class: HashMap<CategoryId, usize> = categories_sorted
        .iter()
        .enumerate()
        .map(|(idx, cat)| (cat.id(), idx))
        .collect();

    for item in &dataset.items {
        let stem = Path::new(&item.image.file_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| item.id.to_string());
        let label_path = path.join(format!("{stem}.{LABEL_EXTENSION}"));

        let mut body = String::new();
        for ann in &item.annotations {
            let AnnotationKind::BBox { bbox } = &ann.kind else {
                tracing::debug!(item = %item.id, kind = ann.kind.name(), "YOLO keeps boxes only; skipped");
                continue;
            };
            let Some(&class_id) = ann.category_id.and_then(|id| category_to_class.get(&id)) else {
                tracing::warn!(item = %item.id, annotation = %ann.id, "box without a known category; skipped");
                continue;
            };
            if !bbox.is_normalized() && (item.image.width == 0 || item.image.height == 0) {
                tracing::warn!(item = %item.id, "image size unknown; cannot normalize box");
                continue;
            }

            let (cx, cy, w, h) = bbox
                .to_normalized_center(f64::from(item.image.width), f64::from(item.image.height));
            body.push_str(&format!("{class_id} {cx:.6} {cy:.6} {w:.6} {h:.6}\n"));
        }

        write_atomic(FORMAT, &label_path, body.as_bytes())?;
    }

    write_data_yaml(path, &categories_sorted)?;

    tracing::info!(
        path = %path.display(),
        items = dataset.items.len(),
        classes = categories_sorted.len(),
        "wrote YOLO directory"
    );
    Ok(())
}

/// Class index → category id resolution during load.
enum ClassMap {
    /// Names from `data.yaml`: class `k` is category `k + 1`.
    Named(Vec<String>),
    /// No names: categories are created in order of first appearance.
    Inferred(Vec<usize>),
}

impl ClassMap {
    fn category_for(&mut self, class_id: usize) -> Result<CategoryId, String> {
        match self {
            ClassMap::Named(names) => {
                if class_id >= names.len() {
                    return Err(format!(
                        "class_id {class_id} is out of range for {DATA_YAML} with {} class(es)",
                        names.len()
                    ));
                }
                Ok(CategoryId::new(class_id as u64 + 1))
            }
            ClassMap::Inferred(seen) => {
                let position = match seen.iter().position(|&k| k == class_id) {
                    Some(position) => position,
                    None => {
                        seen.push(class_id);
                        seen.len() - 1
                    }
                };
                Ok(CategoryId::new(position as u64 + 1))
            }
        }
    }

    fn into_categories(self) -> Vec<Category> {
        match self {
            ClassMap::Named(names) => names
                .into_iter()
                .enumerate()
                .map(|(i, name)| Category::new(i as u64 + 1, name))
                .collect(),
            ClassMap::Inferred(seen) => seen
                .into_iter()
                .enumerate()
                .map(|(i, class_id)| {
                    Category::new(i as u64 + 1, format!("class_{class_id}"))
                        .with_supercategory("none")
                })
                .collect(),
        }
    }
}

#[derive(Debug, PartialEq)]
struct YoloLabelRow {
    class_id: usize,
    cx: f64,
    cy: f64,
    w: f64,
    h: f64,
}

#[derive(Debug, Deserialize)]
struct DataYaml {
    names: DataYamlNames,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DataYamlNames {
    Sequence(Vec<String>),
    Mapping(BTreeMap<usize, String>),
}

fn read_data_yaml_names(path: &Path) -> Result<Option<Vec<String>>, AdapterError> {
    if !path.is_file() {
        return Ok(None);
    }
    let data = fs::read_to_string(path).map_err(|source| AdapterError::io(FORMAT, path, source))?;
    let parsed: DataYaml = serde_yaml::from_str(&data)
        .map_err(|source| AdapterError::malformed(FORMAT, path, source.to_string()))?;

    let names = match parsed.names {
        DataYamlNames::Sequence(names) => names,
        DataYamlNames::Mapping(mapping) => {
            let len = mapping.keys().next_back().map_or(0, |max| max + 1);
            let mut names = vec![String::new(); len];
            for (index, name) in mapping {
                names[index] = name;
            }
            for (index, name) in names.iter_mut().enumerate() {
                if name.trim().is_empty() {
                    *name = format!("class_{index}");
                }
            }
            names
        }
    };

    Ok(Some(names))
}

fn write_data_yaml(output_root: &Path, categories: &[&Category]) -> Result<(), AdapterError> {
    let mut yaml = String::from("names:\n");
    for (idx, category) in categories.iter().enumerate() {
        yaml.push_str(&format!(
            "  {}: {}\n",
            idx,
            yaml_single_quoted(category.name())
        ));
    }

    write_atomic(FORMAT, &output_root.join(DATA_YAML), yaml.as_bytes())
}

fn yaml_single_quoted(raw: &str) -> String {
    format!("'{}'", raw.replace('\'', "''"))
}

fn collect_files_with_extensions(
    root: &Path,
    extensions: &[&str],
) -> Result<Vec<PathBuf>, AdapterError> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|source| {
            AdapterError::malformed(
                FORMAT,
                root,
                format!("failed while traversing directory: {source}"),
            )
        })?;

        if entry.file_type().is_file() && has_extension(entry.path(), extensions) {
            files.push(entry.path().to_path_buf());
        }
    }

    Ok(files)
}

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    let Some(ext) = path.extension().and_then(|ext| ext.to_str()) else {
        return false;
    };

    allowed
        .iter()
        .any(|allowed_ext| ext.eq_ignore_ascii_case(allowed_ext))
}

fn read_image_dimensions(path: &Path) -> Result<(u32, u32), AdapterError> {
    let size = imagesize::size(path).map_err(|source| {
        AdapterError::malformed(FORMAT, path, format!("cannot read image size: {source}"))
    })?;

    let width: u32 = size.width.try_into().map_err(|_| {
        AdapterError::malformed(
            FORMAT,
            path,
            format!("image width {} does not fit in u32", size.width),
        )
    })?;
    let height: u32 = size.height.try_into().map_err(|_| {
        AdapterError::malformed(
            FORMAT,
            path,
            format!("image height {} does not fit in u32", size.height),
        )
    })?;

    Ok((width, height))
}

fn find_image_for_label(label_path: &Path) -> Option<PathBuf> {
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| label_path.with_extension(ext))
        .find(|candidate| candidate.is_file())
}

fn line_error(path: &Path, line: usize, message: String) -> AdapterError {
    AdapterError::malformed(FORMAT, path, format!("line {line}: {message}"))
}

fn parse_label_line(line: &str) -> Result<Option<YoloLabelRow>, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    // Take at most 6 tokens so pathological inputs do not allocate unbounded memory.
    let tokens: Vec<&str> = trimmed.split_whitespace().take(6).collect();
    if tokens.len() < 5 {
        return Err(format!(
            "expected 5 tokens (class cx cy w h), found {}",
            tokens.len()
        ));
    }
    if tokens.len() > 5 {
        return Err("segmentation/pose rows are not supported; expected class cx cy w h".to_string());
    }

    let class_id = tokens[0].parse::<usize>().map_err(|_| {
        format!(
            "invalid class_id '{}'; expected non-negative integer",
            tokens[0]
        )
    })?;

    Ok(Some(YoloLabelRow {
        class_id,
        cx: parse_f64_token(tokens[1], "x_center")?,
        cy: parse_f64_token(tokens[2], "y_center")?,
        w: parse_f64_token(tokens[3], "width")?,
        h: parse_f64_token(tokens[4], "height")?,
    }))
}

fn parse_f64_token(token: &str, field: &str) -> Result<f64, String> {
    match token.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(format!("invalid {field} '{token}'; expected a finite number")),
    }
}
