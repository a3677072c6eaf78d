//! Format conversion and its report.
//!
//! [`convert`] resolves both adapters, loads the source, analyzes what the
//! target can carry, and dumps. The report says what was preserved, what
//! was lost, and which deterministic policies applied.

pub mod report;

pub use report::{
    ConversionCounts, ConversionIssue, ConversionIssueCode, ConversionReport, ConversionSeverity,
};

use std::collections::BTreeMap;
use std::path::Path;

use crate::adapter::{AdapterRegistry, Capabilities, FormatAdapter};
use crate::error::AnnoxError;
use crate::ir::Dataset;

/// Converts `src` in format `from` into `dst` in format `to`.
///
/// Lossiness never blocks the conversion; every loss is recorded as a
/// warning in the returned report and logged.
///
/// # Errors
/// `UnknownFormat` for an unregistered name, otherwise whatever the source
/// adapter's `load` or the target adapter's `dump` reports.
pub fn convert(
    registry: &AdapterRegistry,
    from: &str,
    to: &str,
    src: &Path,
    dst: &Path,
) -> Result<ConversionReport, AnnoxError> {
    let source = registry.resolve(from)?;
    let target = registry.resolve(to)?;

    let dataset = source.load(src)?;
    let report = build_conversion_report(&dataset, source.as_ref(), target.as_ref());
    for message in report.lossy_messages() {
        tracing::warn!(from = source.name(), to = target.name(), "{message}");
    }

    target.dump(&dataset, dst)?;
    tracing::info!(
        src = %src.display(),
        dst = %dst.display(),
        items = report.input.items,
        annotations = report.output.annotations,
        "converted"
    );
    Ok(report)
}

/// Counts the dataset by item, category and annotation kind.
pub fn count_dataset(dataset: &Dataset) -> ConversionCounts {
    let mut by_kind: BTreeMap<&'static str, usize> = BTreeMap::new();
    for ann in dataset.items.iter().flat_map(|item| &item.annotations) {
        *by_kind.entry(ann.kind.name()).or_default() += 1;
    }
    ConversionCounts {
        items: dataset.items.len(),
        categories: dataset.categories.len(),
        annotations: dataset.annotation_count(),
        by_kind,
    }
}

/// Build a conversion report analyzing what will happen during conversion.
///
/// This function examines the dataset and target capabilities to determine:
/// - Input/output counts
/// - What information will be lost (warnings)
/// - What policy decisions apply (info notes)
pub fn build_conversion_report(
    dataset: &Dataset,
    source: &dyn FormatAdapter,
    target: &dyn FormatAdapter,
) -> ConversionReport {
    let mut report = ConversionReport::new(source.name(), target.name());
    report.input = count_dataset(dataset);

    let caps = target.capabilities();
    analyze_capabilities(dataset, &caps, &mut report);

    if target.name() == "yolo" && !dataset.licenses.is_empty() {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropLicenses,
            format!("{} license(s) will be dropped", dataset.licenses.len()),
        ));
    }

    add_policy_notes(source.name(), target.name(), &mut report);
    report
}

/// Warns once per annotation kind the target cannot carry, and for
/// attributes if the target has no attribute storage.
fn analyze_capabilities(dataset: &Dataset, caps: &Capabilities, report: &mut ConversionReport) {
    let mut dropped: BTreeMap<&'static str, usize> = BTreeMap::new();
    let mut with_attributes = 0usize;
    let mut kept = 0usize;

    for ann in dataset.items.iter().flat_map(|item| &item.annotations) {
        if caps.supports(&ann.kind) {
            kept += 1;
            if !ann.attributes.is_empty() {
                with_attributes += 1;
            }
        } else {
            *dropped.entry(ann.kind.name()).or_default() += 1;
        }
    }

    for (kind, count) in &dropped {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropAnnotationKind,
            format!(
                "{count} {kind} annotation(s) will be dropped: '{}' cannot represent them",
                report.to
            ),
        ));
    }

    if !caps.attributes && with_attributes > 0 {
        report.add(ConversionIssue::warning(
            ConversionIssueCode::DropAnnotationAttributes,
            format!("attributes of {with_attributes} annotation(s) will be dropped"),
        ));
    }

    let mut by_kind = report.input.by_kind.clone();
    by_kind.retain(|kind, _| !dropped.contains_key(kind));
    report.output = ConversionCounts {
        items: report.input.items,
        categories: report.input.categories,
        annotations: kept,
        by_kind,
    };
}

fn add_policy_notes(from: &str, to: &str, report: &mut ConversionReport) {
    if from == "coco" {
        report.add(ConversionIssue::info(
            ConversionIssueCode::CocoReaderSplitsRecords,
            "COCO records with several geometries become sibling annotations with per-item ids",
        ));
    }
    match to {
        "coco" => report.add(ConversionIssue::info(
            ConversionIssueCode::CocoWriterGlobalIds,
            "COCO annotation ids are assigned globally in output order",
        )),
        "yolo" => {
            report.add(ConversionIssue::info(
                ConversionIssueCode::YoloWriterClassOrder,
                "YOLO class indices follow ascending category id",
            ));
            report.add(ConversionIssue::info(
                ConversionIssueCode::YoloWriterFloatPrecision,
                "YOLO coordinates are written with 6 decimal places",
            ));
        }
        _ => {}
    }
}
