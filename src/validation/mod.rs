//! Dataset validation for annox.
//!
//! Validation runs once, over a whole dataset or item stream, and collects
//! every problem instead of stopping at the first:
//! - Id uniqueness (items in the dataset, annotations within an item, categories)
//! - Per-annotation consistency ([`Annotation::validate_consistency`])
//! - Tolerated oddities reported as warnings (boxes past the image edge,
//!   references to undefined categories)
//!
//! Per-item checks are independent and may run on a worker pool; the
//! report's issue order is the same either way.
//!
//! [`Annotation::validate_consistency`]: crate::ir::Annotation::validate_consistency

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::AnnoxError;
use crate::ir::io_json::{is_jsonl, read_dataset_json, read_items_jsonl};
use crate::ir::{AnnotationId, AnnotationKind, Category, CategoryId, CategoryIndex, Dataset, Item};
use crate::parallel::{map_parallel, ParallelError};

/// Options for validation behavior.
#[derive(Clone, Debug, Default)]
pub struct ValidateOptions {
    /// Worker threads for per-item checks; 0 or 1 checks in-process.
    pub workers: usize,
}

/// Validates a dataset and returns a report of all issues found.
///
/// # Errors
/// Only if the worker pool cannot be started; data problems go into the
/// report.
pub fn validate_dataset(
    dataset: &Dataset,
    opts: &ValidateOptions,
) -> Result<ValidationReport, ParallelError> {
    let mut report = ValidationReport::new();
    validate_categories(&dataset.categories, &mut report);

    let categories = dataset.category_index();
    validate_item_list(&dataset.items, Some(&categories), opts, &mut report)?;
    Ok(report)
}

/// Validates a bare item stream, as read from a JSONL file.
///
/// No categories are available in this mode, so keypoint counts and
/// category references are not checked.
pub fn validate_items(
    items: &[Item],
    opts: &ValidateOptions,
) -> Result<ValidationReport, ParallelError> {
    let mut report = ValidationReport::new();
    validate_item_list(items, None, opts, &mut report)?;
    Ok(report)
}

/// Reads a canonical dataset file (or a `.jsonl` item stream) and validates it.
pub fn validate_dataset_file(
    path: &Path,
    opts: &ValidateOptions,
) -> Result<ValidationReport, AnnoxError> {
    let report = if is_jsonl(path) {
        let items = read_items_jsonl(path)?;
        validate_items(&items, opts)?
    } else {
        let dataset = read_dataset_json(path)?;
        validate_dataset(&dataset, opts)?
    };

    tracing::info!(
        path = %path.display(),
        items = report.items,
        errors = report.error_count(),
        warnings = report.warning_count(),
        "validated"
    );
    Ok(report)
}

/// Validates all categories in the dataset.
fn validate_categories(categories: &[Category], report: &mut ValidationReport) {
    let mut seen_ids: HashMap<CategoryId, usize> = HashMap::new();

    for (idx, category) in categories.iter().enumerate() {
        let id = category.id();
        if let Some(first_idx) = seen_ids.get(&id) {
            report.add(ValidationIssue::error(
                IssueCode::DuplicateCategoryId,
                format!("Duplicate category id {id} (first seen at index {first_idx})"),
                IssueContext::Category { id: id.as_u64() },
            ));
        } else {
            seen_ids.insert(id, idx);
        }
    }
}

/// Item-id uniqueness is checked here, in input order; everything else is
/// per item and goes through the worker pool.
fn validate_item_list(
    items: &[Item],
    categories: Option<&CategoryIndex<'_>>,
    opts: &ValidateOptions,
    report: &mut ValidationReport,
) -> Result<(), ParallelError> {
    report.items += items.len();
    report.annotations += items.iter().map(|item| item.annotations.len()).sum::<usize>();

    let empty = CategoryIndex::default();
    let index = categories.unwrap_or(&empty);
    let check_refs = categories.is_some();

    let per_item = map_parallel(items.iter().collect(), opts.workers, |item: &Item| {
        validate_item(item, index, check_refs)
    })?;

    let mut seen_ids = HashSet::with_capacity(items.len());
    for ((_, issues), item) in per_item.into_iter().zip(items) {
        if !seen_ids.insert(&item.id) {
            report.add(ValidationIssue::error(
                IssueCode::DuplicateItemId,
                format!("Duplicate item id: {}", item.id),
                IssueContext::Item {
                    id: item.id.to_string(),
                },
            ));
        }
        report.issues.extend(issues);
    }

    Ok(())
}

/// Checks one item in isolation. Annotation-id bookkeeping is local.
fn validate_item(
    item: &Item,
    categories: &CategoryIndex<'_>,
    check_refs: bool,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut seen_ids: HashSet<AnnotationId> = HashSet::with_capacity(item.annotations.len());

    for ann in &item.annotations {
        let context = || IssueContext::Annotation {
            item: item.id.to_string(),
            id: ann.id.as_u64(),
        };

        if !seen_ids.insert(ann.id) {
            issues.push(ValidationIssue::error(
                IssueCode::DuplicateAnnotationId,
                format!("Duplicate annotation id {} in item {}", ann.id, item.id),
                context(),
            ));
        }

        if let Err(err) = ann.validate_consistency(item, categories) {
            issues.push(ValidationIssue::from_consistency(&err, context()));
        }

        if let AnnotationKind::BBox { bbox } = &ann.kind {
            let (width, height) = (item.image.width, item.image.height);
            if width > 0 && height > 0 && bbox.exceeds_canvas(width, height) {
                issues.push(ValidationIssue::warning(
                    IssueCode::BBoxExceedsImage,
                    format!(
                        "bbox ({}, {}, {}, {}) extends past image bounds {width}x{height} in item {}",
                        bbox.x(),
                        bbox.y(),
                        bbox.w(),
                        bbox.h(),
                        item.id
                    ),
                    context(),
                ));
            }
        }

        if check_refs {
            if let Some(category_id) = ann.category_id {
                if !categories.contains(category_id) {
                    issues.push(ValidationIssue::warning(
                        IssueCode::MissingCategoryRef,
                        format!(
                            "annotation {} in item {} references unknown category {category_id}",
                            ann.id, item.id
                        ),
                        context(),
                    ));
                }
            }
        }
    }

    issues
}
