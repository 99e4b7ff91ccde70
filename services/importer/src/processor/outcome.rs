//! Row outcomes and the result summary returned to callers.

use crate::validate::FieldError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A row rejected by validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based data row number.
    pub row: usize,
    /// Offending field, or `multiple` when several fields failed.
    pub field: String,
    pub errors: Vec<String>,
    /// The raw cells as uploaded.
    pub data: Vec<String>,
}

impl RowError {
    pub fn new(row: usize, field: &str, message: impl Into<String>, data: &[String]) -> Self {
        Self {
            row,
            field: field.to_string(),
            errors: vec![message.into()],
            data: data.to_vec(),
        }
    }

    pub fn from_field_errors(row: usize, errors: Vec<FieldError>, data: &[String]) -> Self {
        let field = match errors.first() {
            Some(first) if errors.iter().all(|e| e.field == first.field) => first.field.clone(),
            _ => "multiple".to_string(),
        };
        Self {
            row,
            field,
            errors: errors.into_iter().map(|e| e.message).collect(),
            data: data.to_vec(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The natural key column was absent or empty.
    MissingKey(&'static str),
    UnparseableDate(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingKey(field) => write!(f, "missing {field}"),
            SkipReason::UnparseableDate(raw) => write!(f, "unparseable date '{raw}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// The primary record was written; `sub_records` counts dependent writes
    /// (daily metrics) that succeeded alongside it.
    Inserted { sub_records: usize },
    Skipped(SkipReason),
    Failed(RowError),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: bool,
    pub imported: usize,
    pub errors: Vec<RowError>,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics_imported: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImportResult {
    /// Refused before any row was read.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            imported: 0,
            errors: Vec::new(),
            warnings: Vec::new(),
            metrics_imported: None,
            error: Some(message.into()),
        }
    }
}

#[derive(Debug, Default)]
pub struct ImportResultBuilder {
    imported: usize,
    skipped: usize,
    errors: Vec<RowError>,
    warnings: Vec<String>,
    metrics_imported: Option<usize>,
}

impl ImportResultBuilder {
    pub fn new(counts_metrics: bool) -> Self {
        Self {
            metrics_imported: counts_metrics.then_some(0),
            ..Self::default()
        }
    }

    pub fn record(&mut self, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Inserted { sub_records } => {
                self.imported += 1;
                if let Some(metrics) = self.metrics_imported.as_mut() {
                    *metrics += sub_records;
                }
            }
            RowOutcome::Skipped(_) => self.skipped += 1,
            RowOutcome::Failed(error) => self.errors.push(error),
        }
    }

    pub fn warnings(&mut self, warnings: impl IntoIterator<Item = String>) {
        self.warnings.extend(warnings);
    }

    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Summary of a committed batch.
    pub fn finish(self) -> ImportResult {
        ImportResult {
            success: true,
            imported: self.imported,
            errors: self.errors,
            warnings: self.warnings,
            metrics_imported: self.metrics_imported,
            error: None,
        }
    }

    /// Summary of a batch whose transaction was abandoned. Nothing was
    /// persisted, so every counter reads zero; row errors found before the
    /// failure are kept.
    pub fn rolled_back(self, error: impl Into<String>) -> ImportResult {
        ImportResult {
            success: false,
            imported: 0,
            errors: self.errors,
            warnings: Vec::new(),
            metrics_imported: self.metrics_imported.map(|_| 0),
            error: Some(error.into()),
        }
    }
}
