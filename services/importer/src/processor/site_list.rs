//! Generic project-list import: fixed column set, every column required,
//! rows reported by their line in the uploaded file.

use super::BatchContext;
use crate::dates::parse_date;
use crate::mapping::{text, value, MappedRecord};
use crate::normalize::{
    float_value, is_numeric, normalize_status, sanitize, standardize_location,
};
use crate::provinces::closest_province;
use crate::reader::RawTable;
use crate::store::{ImportStore, ImportTx, ProjectRecord, StoreError, ValidationLogEntry};
use serde::{Deserialize, Serialize};

/// Compact header (lowercase, no spaces or underscores) -> field.
const COLUMN_FIELDS: &[(&str, &str)] = &[
    ("sitecode", "site_code"),
    ("projectname", "project_name"),
    ("sitename", "site_name"),
    ("barangay", "barangay"),
    ("municipality", "municipality"),
    ("province", "province"),
    ("district", "district"),
    ("latitude", "latitude"),
    ("longitude", "longitude"),
    ("dateofactivation", "activation_date"),
    ("activationdate", "activation_date"),
    ("date", "activation_date"),
    ("status", "status"),
    ("notes", "notes"),
];

const REQUIRED_FIELDS: &[&str] = &[
    "site_code",
    "project_name",
    "site_name",
    "barangay",
    "municipality",
    "province",
    "district",
    "latitude",
    "longitude",
    "activation_date",
    "status",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteListError {
    /// Line in the uploaded file; the header is line 1.
    pub row: u64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteListResult {
    pub success: bool,
    pub imported: usize,
    pub errors: Vec<SiteListError>,
    pub total_rows: usize,
    pub message: String,
}

fn compact_header(header: &str) -> String {
    header
        .trim()
        .chars()
        .filter(|c| *c != ' ' && *c != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

fn column_fields(headers: &[String]) -> Vec<Option<&'static str>> {
    headers
        .iter()
        .map(|header| {
            let key = compact_header(header);
            COLUMN_FIELDS
                .iter()
                .find(|(column, _)| *column == key)
                .map(|(_, field)| *field)
        })
        .collect()
}

/// A rejected row: reported to the caller and written to the validation log.
struct Rejection {
    field: &'static str,
    log_message: &'static str,
    original: String,
    message: String,
}

fn check_row(record: &MappedRecord) -> Result<chrono::NaiveDate, Rejection> {
    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .copied()
        .filter(|field| value(record, field).is_none())
        .collect();
    if !missing.is_empty() {
        return Err(Rejection {
            field: "multiple",
            log_message: "Missing required fields",
            original: String::new(),
            message: format!("Missing fields: {}", missing.join(", ")),
        });
    }

    let latitude = text(record, "latitude");
    if !is_numeric(&latitude) || !(-90.0..=90.0).contains(&float_value(&latitude)) {
        return Err(Rejection {
            field: "latitude",
            log_message: "Invalid latitude value",
            message: format!("Invalid latitude: {latitude}"),
            original: latitude,
        });
    }

    let longitude = text(record, "longitude");
    if !is_numeric(&longitude) || !(-180.0..=180.0).contains(&float_value(&longitude)) {
        return Err(Rejection {
            field: "longitude",
            log_message: "Invalid longitude value",
            message: format!("Invalid longitude: {longitude}"),
            original: longitude,
        });
    }

    let raw_date = text(record, "activation_date");
    parse_date(&raw_date).ok_or_else(|| Rejection {
        field: "activation_date",
        log_message: "Invalid date format",
        message: format!("Invalid date format: {raw_date}"),
        original: raw_date,
    })
}

async fn log_entry(
    tx: &mut dyn ImportTx,
    batch: &BatchContext,
    line: u64,
    field: &str,
    message: &str,
    original: &str,
    corrected: &str,
) -> Result<(), StoreError> {
    tx.log_validation(&ValidationLogEntry {
        import_batch_id: batch.batch_id.clone(),
        row_number: line as i64,
        field_name: field.to_string(),
        error_message: message.to_string(),
        original_value: original.to_string(),
        corrected_value: corrected.to_string(),
    })
    .await
}

fn build_project(
    record: &MappedRecord,
    province: String,
    activation_date: chrono::NaiveDate,
) -> ProjectRecord {
    ProjectRecord {
        site_code: sanitize(&text(record, "site_code")),
        project_name: sanitize(&text(record, "project_name")),
        project_type: None,
        site_name: sanitize(&text(record, "site_name")),
        barangay: standardize_location(&text(record, "barangay")),
        municipality: standardize_location(&text(record, "municipality")),
        province,
        district: standardize_location(&text(record, "district")),
        latitude: float_value(&text(record, "latitude")),
        longitude: float_value(&text(record, "longitude")),
        activation_date: Some(activation_date),
        status: normalize_status(&text(record, "status")).to_string(),
        notes: sanitize(&text(record, "notes")),
        custom_data: serde_json::Value::Object(Default::default()),
    }
}

/// Import a plain project list. Row problems are reported and the batch
/// carries on; only failures to open, log or commit the transaction are
/// returned as errors.
pub async fn import_site_list(
    store: &dyn ImportStore,
    table: &RawTable,
) -> Result<SiteListResult, StoreError> {
    let batch = BatchContext::new();
    let columns = column_fields(&table.headers);
    let mut imported = 0;
    let mut errors = Vec::new();

    tracing::info!(
        batch_id = %batch.batch_id,
        rows = table.rows.len(),
        "Starting project list import"
    );

    let mut tx = store.begin().await?;

    for row in table.data_rows() {
        let mut record = MappedRecord::new();
        for (field, cell) in columns.iter().zip(&row.cells) {
            if let Some(field) = field {
                record.insert(field.to_string(), cell.trim().to_string());
            }
        }

        let activation_date = match check_row(&record) {
            Ok(date) => date,
            Err(rejection) => {
                log_entry(
                    tx.as_mut(),
                    &batch,
                    row.line,
                    rejection.field,
                    rejection.log_message,
                    &rejection.original,
                    "",
                )
                .await?;
                errors.push(SiteListError {
                    row: row.line,
                    message: rejection.message,
                });
                continue;
            }
        };

        let site_code = text(&record, "site_code");
        if tx.site_code_exists(&site_code).await? {
            log_entry(
                tx.as_mut(),
                &batch,
                row.line,
                "site_code",
                "Duplicate site code",
                &site_code,
                "",
            )
            .await?;
            errors.push(SiteListError {
                row: row.line,
                message: format!("Duplicate site code: {site_code}"),
            });
            continue;
        }

        let original_province = text(&record, "province");
        let province = match closest_province(&original_province) {
            Some(canonical) => {
                if canonical != original_province {
                    log_entry(
                        tx.as_mut(),
                        &batch,
                        row.line,
                        "province",
                        "Province auto-corrected",
                        &original_province,
                        canonical,
                    )
                    .await?;
                }
                canonical.to_string()
            }
            None => standardize_location(&original_province),
        };

        let project = build_project(&record, province, activation_date);
        match tx.insert_project(&project).await {
            Ok(()) => imported += 1,
            Err(err) => {
                tracing::warn!(line = row.line, error = %err, "Project insert failed");
                errors.push(SiteListError {
                    row: row.line,
                    message: format!("Database error: {err}"),
                });
            }
        }
    }

    tx.commit().await?;

    tracing::info!(
        batch_id = %batch.batch_id,
        imported,
        errors = errors.len(),
        "Project list import committed"
    );

    Ok(SiteListResult {
        success: true,
        imported,
        errors,
        total_rows: table.rows.len(),
        message: format!("Imported {imported} projects successfully"),
    })
}

#[cfg(test)]
mod tests {
    use super::super::test_support::table;
    use super::*;
    use crate::store::MemoryStore;
    use chrono::NaiveDate;

    const HEADER: &[&str] = &[
        "Site Code",
        "Project Name",
        "Site Name",
        "Barangay",
        "Municipality",
        "Province",
        "District",
        "Latitude",
        "Longitude",
        "Date of Activation",
        "Status",
        "Notes",
    ];

    fn site<'a>(code: &'a str, province: &'a str, lat: &'a str, date: &'a str) -> Vec<&'a str> {
        vec![
            code,
            "Free-WIFI for All",
            "Plaza <b>Hotspot</b>",
            "san antonio",
            "BASCO",
            province,
            "district i",
            lat,
            "121.97",
            date,
            "completed",
            "Tom & Jerry's",
        ]
    }

    #[test]
    fn test_header_compaction() {
        assert_eq!(compact_header(" Site_Code "), "sitecode");
        assert_eq!(compact_header("Date of Activation"), "dateofactivation");
        let fields = column_fields(&["Activation Date".to_string(), "Remarks".to_string()]);
        assert_eq!(fields, vec![Some("activation_date"), None]);
    }

    #[tokio::test]
    async fn test_rows_are_cleaned_before_insert() {
        let store = MemoryStore::new();
        let row = site("UNDP-GI-0001", "Batanes", "20.45", "2024-04-30");
        let result = import_site_list(&store, &table(&[HEADER, row.as_slice()]))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.imported, 1);
        assert_eq!(result.total_rows, 1);
        assert_eq!(result.message, "Imported 1 projects successfully");

        let project = store.project("UNDP-GI-0001").unwrap();
        assert_eq!(project.site_name, "Plaza Hotspot");
        assert_eq!(project.barangay, "San Antonio");
        assert_eq!(project.municipality, "Basco");
        assert_eq!(project.district, "District I");
        assert_eq!(project.status, "Done");
        assert_eq!(project.notes, "Tom &amp; Jerry&#039;s");
        assert_eq!(project.project_type, None);
        assert_eq!(project.activation_date, NaiveDate::from_ymd_opt(2024, 4, 30));
    }

    #[tokio::test]
    async fn test_each_rejection_is_reported_with_its_line() {
        let store = MemoryStore::new();
        let ok = site("UNDP-GI-0001", "Batanes", "20.45", "2024-04-30");
        let dup = site("UNDP-GI-0001", "Batanes", "20.45", "2024-04-30");
        let bad_lat = site("UNDP-GI-0002", "Batanes", "95", "2024-04-30");
        let bad_date = site("UNDP-GI-0003", "Batanes", "20.45", "soon");
        let mut missing = site("UNDP-GI-0004", "Batanes", "20.45", "2024-04-30");
        missing[3] = "";
        missing[6] = "";

        let input = table(&[
            HEADER,
            ok.as_slice(),
            dup.as_slice(),
            bad_lat.as_slice(),
            bad_date.as_slice(),
            missing.as_slice(),
        ]);
        let result = import_site_list(&store, &input).await.unwrap();

        assert_eq!(result.imported, 1);
        assert_eq!(result.total_rows, 5);
        let messages: Vec<(u64, &str)> = result
            .errors
            .iter()
            .map(|e| (e.row, e.message.as_str()))
            .collect();
        assert_eq!(
            messages,
            vec![
                (3, "Duplicate site code: UNDP-GI-0001"),
                (4, "Invalid latitude: 95"),
                (5, "Invalid date format: soon"),
                (6, "Missing fields: barangay, district"),
            ]
        );

        let logs = store.validation_logs();
        assert_eq!(logs.len(), 4);
        assert_eq!(logs[3].field_name, "multiple");
        assert_eq!(logs[3].error_message, "Missing required fields");
    }

    #[tokio::test]
    async fn test_province_is_corrected_and_logged() {
        let store = MemoryStore::new();
        let row = site("UNDP-GI-0001", "nueva viscaya", "16.3", "2024-04-30");
        let result = import_site_list(&store, &table(&[HEADER, row.as_slice()]))
            .await
            .unwrap();

        assert_eq!(result.imported, 1);
        assert_eq!(
            store.project("UNDP-GI-0001").unwrap().province,
            "Nueva Vizcaya"
        );
        let logs = store.validation_logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].field_name, "province");
        assert_eq!(logs[0].original_value, "nueva viscaya");
        assert_eq!(logs[0].corrected_value, "Nueva Vizcaya");
    }

    #[tokio::test]
    async fn test_insert_failure_does_not_stop_the_batch() {
        let store = MemoryStore::new();
        store.fail_project_writes("UNDP-GI-0001");
        let first = site("UNDP-GI-0001", "Batanes", "20.45", "2024-04-30");
        let second = site("UNDP-GI-0002", "Batanes", "20.45", "2024-04-30");

        let input = table(&[HEADER, first.as_slice(), second.as_slice()]);
        let result = import_site_list(&store, &input).await.unwrap();

        assert_eq!(result.imported, 1);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].message.starts_with("Database error: "));
        assert!(store.project("UNDP-GI-0002").is_some());
    }

    #[tokio::test]
    async fn test_commit_failure_is_returned() {
        let store = MemoryStore::new();
        store.fail_commits();
        let row = site("UNDP-GI-0001", "Batanes", "20.45", "2024-04-30");
        let err = import_site_list(&store, &table(&[HEADER, row.as_slice()]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("commit failed"));
        assert!(store.projects().is_empty());
    }
}
