//! Per-type import processors and the batch driver.
//!
//! A processor turns one data row into a [`RowOutcome`], writing through the
//! open transaction it is handed. [`run_batch`] owns that transaction: any
//! storage error a processor lets escape rolls back the whole upload.

mod activities;
mod daily_metrics;
mod free_wifi_real;
mod outcome;
mod site_list;
mod sites;

pub use activities::{EgovRealProcessor, EgovTemplateProcessor};
pub use daily_metrics::DailyMetricsProcessor;
pub use free_wifi_real::{parse_day_header, FreeWifiRealProcessor};
pub use outcome::{ImportResult, ImportResultBuilder, RowError, RowOutcome, SkipReason};
pub use site_list::{import_site_list, SiteListError, SiteListResult};
pub use sites::{SiteLayout, SiteTemplateProcessor};

use crate::config::ProjectTypeCatalog;
use crate::mapping::{self, MappedRecord};
use crate::provinces::closest_province;
use crate::reader::RawTable;
use crate::store::{ImportStore, ImportTx, StoreError, ValidationLogEntry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

pub const EGOV_PH: &str = "EgovPH";
pub const ELGU: &str = "ELGU";
pub const FREE_WIFI: &str = "Free-WIFI for All";
/// Pseudo project type for standalone daily metric sheets.
pub const DAILY_METRICS_TYPE: &str = "Free-WiFi Daily Metrics";

/// Upload layout: the generated template, or a raw report export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportFormat {
    #[default]
    Template,
    Real,
}

impl ImportFormat {
    /// Form values other than `real` fall back to the template layout.
    pub fn from_form(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("real") {
            ImportFormat::Real
        } else {
            ImportFormat::Template
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportFormat::Template => "template",
            ImportFormat::Real => "real",
        }
    }
}

impl FromStr for ImportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "template" => Ok(ImportFormat::Template),
            "real" => Ok(ImportFormat::Real),
            other => Err(format!(
                "unknown import format '{other}' (expected template or real)"
            )),
        }
    }
}

/// State shared by every row of one upload.
#[derive(Debug)]
pub struct BatchContext {
    pub batch_id: String,
    pub warnings: Vec<String>,
}

impl BatchContext {
    pub fn new() -> Self {
        Self {
            batch_id: format!("import_{}", Uuid::new_v4().simple()),
            warnings: Vec::new(),
        }
    }
}

impl Default for BatchContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A data row handed to a processor.
#[derive(Debug, Clone, Copy)]
pub struct DataRow<'a> {
    /// 1-based position among the non-blank data rows.
    pub number: usize,
    pub cells: &'a [String],
}

#[async_trait]
pub trait RowProcessor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether results carry a `metrics_imported` counter.
    fn counts_metrics(&self) -> bool {
        false
    }

    /// Handle one row. Returning `Err` aborts the batch.
    async fn process_row(
        &self,
        tx: &mut dyn ImportTx,
        batch: &mut BatchContext,
        row: DataRow<'_>,
    ) -> Result<RowOutcome, StoreError>;
}

/// Pick the processor for a project type and layout. `None` for types the
/// catalog does not know.
pub fn processor_for<'a>(
    catalog: &'a ProjectTypeCatalog,
    project_type: &str,
    format: ImportFormat,
    headers: &[String],
) -> Option<Box<dyn RowProcessor + 'a>> {
    if project_type == DAILY_METRICS_TYPE {
        return Some(Box::new(DailyMetricsProcessor::new(headers)));
    }

    let def = catalog.get(project_type)?;
    let processor: Box<dyn RowProcessor + 'a> = match (project_type, format) {
        (EGOV_PH, ImportFormat::Real) => Box::new(EgovRealProcessor::new(&def.name, headers)),
        (EGOV_PH, ImportFormat::Template) => Box::new(EgovTemplateProcessor::new(def, headers)),
        (ELGU, _) => Box::new(SiteTemplateProcessor::new(
            SiteLayout::Elgu,
            def,
            catalog.common_fields(),
            headers,
        )),
        (FREE_WIFI, ImportFormat::Real) => {
            Box::new(FreeWifiRealProcessor::new(&def.name, headers))
        }
        (FREE_WIFI, ImportFormat::Template) => Box::new(SiteTemplateProcessor::new(
            SiteLayout::FreeWifi,
            def,
            catalog.common_fields(),
            headers,
        )),
        _ => Box::new(SiteTemplateProcessor::new(
            SiteLayout::Generic,
            def,
            catalog.common_fields(),
            headers,
        )),
    };
    Some(processor)
}

/// Run every non-blank data row through `processor` inside one transaction.
pub async fn run_batch(
    store: &dyn ImportStore,
    processor: &dyn RowProcessor,
    table: &RawTable,
) -> ImportResult {
    let mut batch = BatchContext::new();
    let mut builder = ImportResultBuilder::new(processor.counts_metrics());

    tracing::info!(
        batch_id = %batch.batch_id,
        processor = processor.name(),
        rows = table.rows.len(),
        "Starting import batch"
    );

    let mut tx = match store.begin().await {
        Ok(tx) => tx,
        Err(err) => {
            tracing::error!(batch_id = %batch.batch_id, error = %err, "Could not open transaction");
            return builder.rolled_back(err.to_string());
        }
    };

    for (index, raw) in table.data_rows().enumerate() {
        let row = DataRow {
            number: index + 1,
            cells: &raw.cells,
        };
        match processor.process_row(tx.as_mut(), &mut batch, row).await {
            Ok(RowOutcome::Skipped(reason)) => {
                tracing::debug!(row = row.number, %reason, "Row skipped");
                builder.record(RowOutcome::Skipped(reason));
            }
            Ok(outcome) => builder.record(outcome),
            Err(err) => {
                tracing::warn!(
                    batch_id = %batch.batch_id,
                    row = row.number,
                    error = %err,
                    "Import aborted, rolling back"
                );
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "Rollback failed");
                }
                return builder.rolled_back(err.to_string());
            }
        }
    }

    if let Err(err) = tx.commit().await {
        tracing::error!(batch_id = %batch.batch_id, error = %err, "Commit failed");
        return builder.rolled_back(err.to_string());
    }

    builder.warnings(batch.warnings);
    let skipped = builder.skipped();
    let result = builder.finish();
    tracing::info!(
        batch_id = %batch.batch_id,
        imported = result.imported,
        errors = result.errors.len(),
        skipped,
        metrics_imported = result.metrics_imported.unwrap_or(0),
        "Import batch committed"
    );
    result
}

/// Entry point used by the HTTP handler and the CLI.
pub async fn import_table(
    store: &dyn ImportStore,
    catalog: &ProjectTypeCatalog,
    project_type: &str,
    format: ImportFormat,
    table: &RawTable,
) -> ImportResult {
    match processor_for(catalog, project_type, format, &table.headers) {
        Some(processor) => run_batch(store, processor.as_ref(), table).await,
        None => {
            tracing::warn!(project_type, "Unknown project type");
            ImportResult::rejected("Unknown project type")
        }
    }
}

/// A province spelling swapped for its canonical name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ProvinceCorrection {
    original: String,
    corrected: &'static str,
}

impl ProvinceCorrection {
    /// Leave the audit row and warning. Called only for rows that are about
    /// to be written.
    pub(crate) async fn record(
        &self,
        tx: &mut dyn ImportTx,
        batch: &mut BatchContext,
        row_number: usize,
    ) -> Result<(), StoreError> {
        tx.log_validation(&ValidationLogEntry {
            import_batch_id: batch.batch_id.clone(),
            row_number: row_number as i64,
            field_name: "province".to_string(),
            error_message: "Province auto-corrected".to_string(),
            original_value: self.original.clone(),
            corrected_value: self.corrected.to_string(),
        })
        .await?;

        batch.warnings.push(format!(
            "Row {row_number}: Province '{}' auto-corrected to '{}'",
            self.original, self.corrected
        ));
        Ok(())
    }
}

/// Replace a misspelled province in `record` with its canonical name.
/// Unknown and already canonical provinces are left untouched.
pub(crate) fn correct_province(record: &mut MappedRecord) -> Option<ProvinceCorrection> {
    let original = mapping::value(record, "province")?.to_string();
    let corrected = closest_province(&original)?;
    if corrected == original {
        return None;
    }
    record.insert("province".to_string(), corrected.to_string());
    Some(ProvinceCorrection {
        original,
        corrected,
    })
}
