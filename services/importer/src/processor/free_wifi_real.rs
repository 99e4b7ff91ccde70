//! Free-WIFI site inventory report: one site per row, followed by pairs of
//! per-day columns (status or bandwidth figure, then unique users).

use super::{correct_province, BatchContext, DataRow, RowOutcome, RowProcessor, SkipReason};
use crate::dates::parse_date_loose;
use crate::mapping::{
    normalize_header, text, value, ColumnMap, MappedRecord, FREE_WIFI_REAL_RULES,
};
use crate::normalize::{float_value, int_value};
use crate::store::{DailyMetricRecord, ImportTx, ProjectRecord, StoreError};
use async_trait::async_trait;
use chrono::NaiveDate;
use regex::Regex;
use serde_json::json;
use std::sync::LazyLock;

/// `7-jan-26`
static DAY_MONTH_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)-([a-z]+)-(\d+)$").expect("valid regex"));

/// `jan 7-26`
static MONTH_DAY_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z]+) (\d+)-(\d+)$").expect("valid regex"));

/// Statuses reported verbatim; any other cell is a bandwidth figure.
const STATUS_VALUES: &[&str] = &["UP", "DOWN", "NO NMS"];

const MONTHS: &[&str] = &[
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];

/// Decode a day column header (already normalized). Two-digit years are in
/// the 2000s. Returns `None` when the header is not a day column or names a
/// date that does not exist.
pub fn parse_day_header(header: &str) -> Option<NaiveDate> {
    let (day, month, year) = if let Some(caps) = DAY_MONTH_YEAR_RE.captures(header) {
        (caps[1].to_string(), caps[2].to_string(), caps[3].to_string())
    } else if let Some(caps) = MONTH_DAY_YEAR_RE.captures(header) {
        (caps[2].to_string(), caps[1].to_string(), caps[3].to_string())
    } else {
        return None;
    };

    let month_prefix = month.get(..3)?;
    let month = MONTHS.iter().position(|m| *m == month_prefix)? as u32 + 1;
    let day: u32 = day.parse().ok()?;
    let mut year: i32 = year.parse().ok()?;
    if year < 100 {
        year += 2000;
    }

    NaiveDate::from_ymd_opt(year, month, day)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DayColumn {
    index: usize,
    date: NaiveDate,
}

pub struct FreeWifiRealProcessor {
    project_type: String,
    columns: ColumnMap,
    day_columns: Vec<DayColumn>,
}

impl FreeWifiRealProcessor {
    pub fn new(project_type: &str, headers: &[String]) -> Self {
        let day_columns = headers
            .iter()
            .enumerate()
            .filter_map(|(index, header)| {
                let normalized = normalize_header(header);
                let date = parse_day_header(&normalized);
                if date.is_none()
                    && (DAY_MONTH_YEAR_RE.is_match(&normalized)
                        || MONTH_DAY_YEAR_RE.is_match(&normalized))
                {
                    tracing::warn!(header = %header, "Ignoring day column with an invalid date");
                }
                date.map(|date| DayColumn { index, date })
            })
            .collect();

        Self {
            project_type: project_type.to_string(),
            columns: ColumnMap::from_rules(headers, FREE_WIFI_REAL_RULES),
            day_columns,
        }
    }

    fn build_project(&self, record: &MappedRecord) -> ProjectRecord {
        ProjectRecord {
            site_code: text(record, "site_code"),
            project_name: self.project_type.clone(),
            project_type: Some(self.project_type.clone()),
            site_name: value(record, "site_name")
                .or_else(|| value(record, "location_name"))
                .unwrap_or_default()
                .to_string(),
            barangay: text(record, "barangay"),
            municipality: text(record, "municipality"),
            province: text(record, "province"),
            district: String::new(),
            latitude: float_value(&text(record, "latitude")),
            longitude: float_value(&text(record, "longitude")),
            activation_date: value(record, "activation_date").and_then(parse_date_loose),
            status: value(record, "status").unwrap_or("Pending").to_string(),
            notes: String::new(),
            custom_data: json!({
                "location_name": text(record, "location_name"),
                "site_type": text(record, "site_type"),
                "cms_provider": text(record, "cms_provider"),
                "link_provider": text(record, "link_provider"),
                "technology": text(record, "technology"),
                "bandwidth": text(record, "bandwidth"),
            }),
        }
    }

    /// Metric for one day cell, or `None` when the cell is empty.
    fn day_metric(
        &self,
        site_code: &str,
        column: DayColumn,
        cells: &[String],
    ) -> Option<DailyMetricRecord> {
        let cell = cells.get(column.index)?.trim();
        if cell.is_empty() {
            return None;
        }

        let unique_users = cells.get(column.index + 1).map(|c| int_value(c)).unwrap_or(0);
        let upper = cell.to_uppercase();
        let (status, bandwidth_utilization) = if STATUS_VALUES.contains(&upper.as_str()) {
            (upper, 0.0)
        } else {
            ("UP".to_string(), float_value(cell))
        };

        Some(DailyMetricRecord {
            site_code: site_code.to_string(),
            metric_date: column.date,
            status,
            bandwidth_utilization,
            unique_users,
            remarks: None,
        })
    }
}

#[async_trait]
impl RowProcessor for FreeWifiRealProcessor {
    fn name(&self) -> &'static str {
        "free-wifi-real"
    }

    fn counts_metrics(&self) -> bool {
        true
    }

    async fn process_row(
        &self,
        tx: &mut dyn ImportTx,
        batch: &mut BatchContext,
        row: DataRow<'_>,
    ) -> Result<RowOutcome, StoreError> {
        let mut record = self.columns.map_row(row.cells);
        let Some(site_code) = value(&record, "site_code").map(str::to_string) else {
            return Ok(RowOutcome::Skipped(SkipReason::MissingKey("site_code")));
        };

        if let Some(correction) = correct_province(&mut record) {
            correction.record(tx, batch, row.number).await?;
        }
        tx.upsert_project(&self.build_project(&record)).await?;

        let mut metrics = 0;
        for column in &self.day_columns {
            let Some(metric) = self.day_metric(&site_code, *column, row.cells) else {
                continue;
            };
            match tx.upsert_daily_metric(&metric).await {
                Ok(()) => metrics += 1,
                Err(err) => tracing::debug!(
                    site_code = %site_code,
                    date = %metric.metric_date,
                    error = %err,
                    "Daily metric not stored"
                ),
            }
        }

        Ok(RowOutcome::Inserted {
            sub_records: metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::table;
    use super::super::{import_table, ImportFormat, FREE_WIFI};
    use super::*;
    use crate::config::ProjectTypeCatalog;
    use crate::store::MemoryStore;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // -------------------------------------------------------------------------
    // DAY HEADERS
    // -------------------------------------------------------------------------

    #[test]
    fn test_day_header_formats() {
        assert_eq!(parse_day_header("7-jan-26"), Some(date(2026, 1, 7)));
        assert_eq!(parse_day_header("15-feb-2026"), Some(date(2026, 2, 15)));
        assert_eq!(parse_day_header("jan 7-26"), Some(date(2026, 1, 7)));
        assert_eq!(parse_day_header("september 3-25"), Some(date(2025, 9, 3)));
    }

    #[test]
    fn test_day_header_rejects_impossible_dates() {
        assert_eq!(parse_day_header("31-feb-26"), None);
        assert_eq!(parse_day_header("7-foo-26"), None);
        assert_eq!(parse_day_header("status"), None);
        assert_eq!(parse_day_header("jan 7, 2026"), None);
    }

    // -------------------------------------------------------------------------
    // IMPORT
    // -------------------------------------------------------------------------

    const HEADER: &[&str] = &[
        "AP Site Code",
        "AP Site Name",
        "Locality",
        "Province",
        "Latitude",
        "Longitude",
        "Status",
        "Date of Activation",
        "1-Jan-26",
        "Users",
        "2-Jan-26",
        "Users",
        "Jan 3-26",
        "Users",
    ];

    fn catalog() -> ProjectTypeCatalog {
        ProjectTypeCatalog::builtin().unwrap()
    }

    #[tokio::test]
    async fn test_sites_and_metrics_are_imported() {
        let store = MemoryStore::new();
        let input = table(&[
            HEADER,
            &[
                "WIFI-BTN-001",
                "Town Hall",
                "Basco",
                "Batanes",
                "20.45",
                "121.97",
                "Active",
                "January 7-9, 2024",
                "UP",
                "15",
                "12.5",
                "40",
                "no nms",
                "",
            ],
            &["", "Unnamed", "Basco", "Batanes", "", "", "", "", "UP", "1", "", "", "", ""],
        ]);

        let result =
            import_table(&store, &catalog(), FREE_WIFI, ImportFormat::Real, &input).await;

        assert!(result.success);
        assert_eq!(result.imported, 1);
        assert_eq!(result.metrics_imported, Some(3));
        assert!(result.errors.is_empty());

        let project = store.project("WIFI-BTN-001").unwrap();
        assert_eq!(project.activation_date, Some(date(2024, 1, 7)));
        assert_eq!(project.district, "");

        let metrics = store.daily_metrics();
        assert_eq!(metrics.len(), 3);
        assert_eq!(metrics[0].metric_date, date(2026, 1, 1));
        assert_eq!(metrics[0].status, "UP");
        assert_eq!(metrics[0].bandwidth_utilization, 0.0);
        assert_eq!(metrics[0].unique_users, 15);
        assert_eq!(metrics[1].status, "UP");
        assert_eq!(metrics[1].bandwidth_utilization, 12.5);
        assert_eq!(metrics[1].unique_users, 40);
        assert_eq!(metrics[2].metric_date, date(2026, 1, 3));
        assert_eq!(metrics[2].status, "NO NMS");
        assert_eq!(metrics[2].unique_users, 0);
    }

    #[tokio::test]
    async fn test_rows_without_site_code_are_skipped_silently() {
        let store = MemoryStore::new();
        let input = table(&[
            &["AP Site Code", "AP Site Name"],
            &["", "Ghost"],
        ]);
        let result =
            import_table(&store, &catalog(), FREE_WIFI, ImportFormat::Real, &input).await;
        assert!(result.success);
        assert_eq!(result.imported, 0);
        assert!(result.errors.is_empty());
        assert!(store.projects().is_empty());
    }

    #[tokio::test]
    async fn test_metric_failures_are_swallowed() {
        let store = MemoryStore::new();
        store.fail_metric_writes("WIFI-BTN-002");
        let input = table(&[
            &["AP Site Code", "1-Jan-26", "Users"],
            &["WIFI-BTN-001", "UP", "3"],
            &["WIFI-BTN-002", "DOWN", "0"],
        ]);

        let result =
            import_table(&store, &catalog(), FREE_WIFI, ImportFormat::Real, &input).await;

        assert!(result.success);
        assert_eq!(result.imported, 2);
        assert_eq!(result.metrics_imported, Some(1));
        assert_eq!(store.projects().len(), 2);
        assert_eq!(store.daily_metrics().len(), 1);
    }

    #[tokio::test]
    async fn test_reimport_keeps_one_row_per_site_and_day() {
        let store = MemoryStore::new();
        let catalog = catalog();
        let input = table(&[
            &["AP Site Code", "AP Site Name", "1-Jan-26", "Users"],
            &["WIFI-BTN-001", "Town Hall", "UP", "3"],
        ]);

        import_table(&store, &catalog, FREE_WIFI, ImportFormat::Real, &input).await;
        let second = import_table(&store, &catalog, FREE_WIFI, ImportFormat::Real, &input).await;

        assert_eq!(second.imported, 1);
        assert_eq!(second.metrics_imported, Some(1));
        assert_eq!(store.projects().len(), 1);
        assert_eq!(store.daily_metrics().len(), 1);
    }
}
