//! Validation report types for structured error reporting.
//!
//! A report is never an error by itself: it counts what was checked and
//! lists every issue found, and callers decide what counts as failure.

use std::fmt;

use serde::Serialize;

use crate::error::ConsistencyError;

/// The result of validating a dataset or an item stream.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    /// Number of items checked.
    pub items: usize,

    /// Number of annotations checked, across all items.
    pub annotations: usize,

    /// All issues found, in the order they were detected.
    pub issues: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Creates a new empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an issue to the report.
    pub fn add(&mut self, issue: ValidationIssue) {
        self.issues.push(issue);
    }

    /// Returns the number of errors in the report.
    pub fn error_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count()
    }

    /// Returns the number of warnings in the report.
    pub fn warning_count(&self) -> usize {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
            .count()
    }

    /// Returns true if there are no errors.
    pub fn is_ok(&self) -> bool {
        self.error_count() == 0
    }

    /// Returns true if there are no issues at all.
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    /// Messages of every error, in detection order.
    pub fn error_messages(&self) -> impl Iterator<Item = &str> {
        self.issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .map(|i| i.message.as_str())
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_ok() {
            writeln!(f, "OK: {} items, {} annotations", self.items, self.annotations)?;
        } else {
            writeln!(f, "Validation failed:")?;
            for message in self.error_messages() {
                writeln!(f, "- {message}")?;
            }
        }

        for issue in self
            .issues
            .iter()
            .filter(|i| i.severity == Severity::Warning)
        {
            writeln!(f, "- warning: {}", issue.message)?;
        }

        Ok(())
    }
}

/// A single validation issue (error or warning).
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ValidationIssue {
    pub severity: Severity,

    /// A stable code for the issue type.
    pub code: IssueCode,

    /// A human-readable description of the issue.
    pub message: String,

    /// Where the issue occurred.
    pub context: IssueContext,
}

impl ValidationIssue {
    /// Creates a new validation issue.
    pub fn new(
        severity: Severity,
        code: IssueCode,
        message: impl Into<String>,
        context: IssueContext,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            context,
        }
    }

    /// Creates a new error.
    pub fn error(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self::new(Severity::Error, code, message, context)
    }

    /// Creates a new warning.
    pub fn warning(code: IssueCode, message: impl Into<String>, context: IssueContext) -> Self {
        Self::new(Severity::Warning, code, message, context)
    }

    /// An error issue for a failed per-annotation consistency check.
    pub fn from_consistency(err: &ConsistencyError, context: IssueContext) -> Self {
        Self::error(IssueCode::from(err), err.to_string(), context)
    }
}

/// The severity of a validation issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Suspicious but tolerated data.
    Warning,
    /// Invalid data; validation fails.
    Error,
}

/// A stable code identifying the type of validation issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    // ID uniqueness issues
    DuplicateItemId,
    /// Two annotations of one item share an id.
    DuplicateAnnotationId,
    DuplicateCategoryId,

    // Per-annotation consistency
    NegativeBBoxOrigin,
    KeypointCountMismatch,
    PanopticWithoutCategory,

    // Tolerated
    /// A pixel box reaches past the right or bottom image edge.
    BBoxExceedsImage,
    /// An annotation references a category the dataset does not define.
    MissingCategoryRef,
}

impl From<&ConsistencyError> for IssueCode {
    fn from(err: &ConsistencyError) -> Self {
        match err {
            ConsistencyError::NegativeBBoxOrigin { .. } => IssueCode::NegativeBBoxOrigin,
            ConsistencyError::KeypointCountMismatch { .. } => IssueCode::KeypointCountMismatch,
            ConsistencyError::PanopticWithoutCategory { .. } => IssueCode::PanopticWithoutCategory,
        }
    }
}

/// Context about where a validation issue occurred.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum IssueContext {
    Item { id: String },
    Annotation { item: String, id: u64 },
    Category { id: u64 },
}
