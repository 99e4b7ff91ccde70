use super::{BatchContext, DataRow, RowError, RowOutcome, RowProcessor};
use crate::dates::parse_date;
use crate::mapping::{text, value, ColumnMap, DAILY_METRICS_RULES};
use crate::normalize::{float_value, int_value};
use crate::store::{DailyMetricRecord, ImportTx, StoreError};
use async_trait::async_trait;

/// Standalone per-site daily metrics sheet, one metric per row.
pub struct DailyMetricsProcessor {
    columns: ColumnMap,
}

impl DailyMetricsProcessor {
    pub fn new(headers: &[String]) -> Self {
        Self {
            columns: ColumnMap::from_rules(headers, DAILY_METRICS_RULES),
        }
    }
}

#[async_trait]
impl RowProcessor for DailyMetricsProcessor {
    fn name(&self) -> &'static str {
        "daily-metrics"
    }

    async fn process_row(
        &self,
        tx: &mut dyn ImportTx,
        _batch: &mut BatchContext,
        row: DataRow<'_>,
    ) -> Result<RowOutcome, StoreError> {
        let record = self.columns.map_row(row.cells);
        let (Some(site_code), Some(raw_date)) =
            (value(&record, "site_code"), value(&record, "date"))
        else {
            return Ok(RowOutcome::Failed(RowError::new(
                row.number,
                "multiple",
                "Site Code and Date are required",
                row.cells,
            )));
        };
        let Some(metric_date) = parse_date(raw_date) else {
            return Ok(RowOutcome::Failed(RowError::new(
                row.number,
                "date",
                "Date must be a valid date",
                row.cells,
            )));
        };

        let metric = DailyMetricRecord {
            site_code: site_code.to_string(),
            metric_date,
            status: value(&record, "status").unwrap_or("UP").to_string(),
            bandwidth_utilization: float_value(&text(&record, "bandwidth_utilization")),
            unique_users: int_value(&text(&record, "unique_users")),
            remarks: Some(text(&record, "remarks")),
        };
        tx.upsert_daily_metric(&metric).await?;

        Ok(RowOutcome::Inserted { sub_records: 0 })
    }
}
