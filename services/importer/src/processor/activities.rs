//! EgovPH activity imports: the declarative template and the field report
//! export whose headers vary from month to month.

use super::{
    correct_province, BatchContext, DataRow, RowError, RowOutcome, RowProcessor, SkipReason,
};
use crate::config::ProjectTypeDefinition;
use crate::dates::{parse_date, parse_date_loose};
use crate::mapping::{text, value, ColumnMap, MappedRecord, EGOV_REAL_RULES};
use crate::normalize::{float_value, int_value};
use crate::store::{ActivityRecord, ImportTx, StoreError};
use crate::validate::{validate_record, ValidationScope};
use async_trait::async_trait;
use chrono::NaiveDate;

const DEFAULT_ACTIVITY_TYPE: &str = "Orientation";
const DEFAULT_ACTIVITY_STATUS: &str = "Done";

fn optional_coordinate(record: &MappedRecord, field: &str) -> Option<f64> {
    value(record, field).map(float_value)
}

fn build_activity(
    activity_id: String,
    project_type: &str,
    activity_date: Option<NaiveDate>,
    record: &MappedRecord,
) -> ActivityRecord {
    ActivityRecord {
        activity_id,
        project_type: project_type.to_string(),
        activity_title: text(record, "activity_title"),
        activity_type: value(record, "activity_type")
            .unwrap_or(DEFAULT_ACTIVITY_TYPE)
            .to_string(),
        activity_date,
        participants: int_value(&text(record, "participants")),
        downloads: int_value(&text(record, "downloads")),
        province: text(record, "province"),
        municipality: text(record, "municipality"),
        district: text(record, "district"),
        status: value(record, "status")
            .unwrap_or(DEFAULT_ACTIVITY_STATUS)
            .to_string(),
        facilitator: text(record, "facilitator"),
        latitude: optional_coordinate(record, "latitude"),
        longitude: optional_coordinate(record, "longitude"),
    }
}

/// Template upload: every field validated, keyed by the supplied activity ID.
pub struct EgovTemplateProcessor<'a> {
    def: &'a ProjectTypeDefinition,
    columns: ColumnMap,
}

impl<'a> EgovTemplateProcessor<'a> {
    pub fn new(def: &'a ProjectTypeDefinition, headers: &[String]) -> Self {
        Self {
            def,
            columns: ColumnMap::from_labels(headers, &def.fields),
        }
    }
}

#[async_trait]
impl RowProcessor for EgovTemplateProcessor<'_> {
    fn name(&self) -> &'static str {
        "egov-template"
    }

    async fn process_row(
        &self,
        tx: &mut dyn ImportTx,
        batch: &mut BatchContext,
        row: DataRow<'_>,
    ) -> Result<RowOutcome, StoreError> {
        let mut record = self.columns.map_row(row.cells);
        let correction = correct_province(&mut record);

        let errors = validate_record(&record, &self.def.fields, ValidationScope::AllFields);
        if !errors.is_empty() {
            return Ok(RowOutcome::Failed(RowError::from_field_errors(
                row.number,
                errors,
                row.cells,
            )));
        }
        if let Some(correction) = correction {
            correction.record(tx, batch, row.number).await?;
        }

        let activity_date = value(&record, "activity_date").and_then(parse_date);
        let activity = build_activity(
            text(&record, "activity_id"),
            &self.def.name,
            activity_date,
            &record,
        );
        tx.upsert_activity(&activity).await?;

        Ok(RowOutcome::Inserted { sub_records: 0 })
    }
}

/// Field report export. Rows without a title or a readable date are skipped;
/// IDs are derived from the data row number.
pub struct EgovRealProcessor {
    project_type: String,
    columns: ColumnMap,
}

impl EgovRealProcessor {
    pub fn new(project_type: &str, headers: &[String]) -> Self {
        Self {
            project_type: project_type.to_string(),
            columns: ColumnMap::from_rules(headers, EGOV_REAL_RULES),
        }
    }
}

#[async_trait]
impl RowProcessor for EgovRealProcessor {
    fn name(&self) -> &'static str {
        "egov-real"
    }

    async fn process_row(
        &self,
        tx: &mut dyn ImportTx,
        batch: &mut BatchContext,
        row: DataRow<'_>,
    ) -> Result<RowOutcome, StoreError> {
        let mut record = self.columns.map_row(row.cells);
        if value(&record, "activity_title").is_none() {
            return Ok(RowOutcome::Skipped(SkipReason::MissingKey("activity_title")));
        }
        let raw_date = text(&record, "activity_date");
        let Some(activity_date) = parse_date_loose(&raw_date) else {
            return Ok(RowOutcome::Skipped(SkipReason::UnparseableDate(raw_date)));
        };

        if let Some(correction) = correct_province(&mut record) {
            correction.record(tx, batch, row.number).await?;
        }

        let activity = build_activity(
            format!("EGV-{:04}", row.number),
            &self.project_type,
            Some(activity_date),
            &record,
        );
        tx.upsert_activity(&activity).await?;

        Ok(RowOutcome::Inserted { sub_records: 0 })
    }
}
