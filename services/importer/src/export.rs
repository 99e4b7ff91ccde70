//! CSV output: project export and the static project-list template.
//!
//! Every file starts with a UTF-8 byte order mark so spreadsheet tools pick
//! the right encoding.

use crate::dates::to_iso;
use crate::store::{ImportStore, ProjectRecord, StoreError};
use chrono::NaiveDate;
use thiserror::Error;

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

pub const PROJECT_HEADERS: &[&str] = &[
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

const PROJECT_TEMPLATE_SAMPLE: &[&str] = &[
    "UNDP-GI-0001",
    "Free-WIFI for All",
    "Sample Site",
    "Sample Barangay",
    "Sample Municipality",
    "Batanes",
    "District I",
    "20.728794",
    "121.804235",
    "2024-04-30",
    "Done",
    "Sample notes",
];

#[derive(Error, Debug)]
pub enum ExportError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV write failed: {0}")]
    Io(#[from] std::io::Error),
}

/// BOM-prefixed CSV with one header line.
pub fn write_csv<H, R, C>(headers: &[H], rows: R) -> Result<Vec<u8>, ExportError>
where
    H: AsRef<[u8]>,
    R: IntoIterator<Item = Vec<C>>,
    C: AsRef<[u8]>,
{
    let mut writer = csv::Writer::from_writer(UTF8_BOM.to_vec());
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    writer
        .into_inner()
        .map_err(|err| ExportError::Io(std::io::Error::other(err.error().to_string())))
}

fn project_row(project: &ProjectRecord) -> Vec<String> {
    vec![
        project.site_code.clone(),
        project.project_name.clone(),
        project.site_name.clone(),
        project.barangay.clone(),
        project.municipality.clone(),
        project.province.clone(),
        project.district.clone(),
        project.latitude.to_string(),
        project.longitude.to_string(),
        project.activation_date.map(to_iso).unwrap_or_default(),
        project.status.clone(),
        project.notes.clone(),
    ]
}

/// All projects, newest first.
pub async fn export_projects_csv(store: &dyn ImportStore) -> Result<Vec<u8>, ExportError> {
    let projects = store.list_projects().await?;
    tracing::info!(projects = projects.len(), "Exporting projects");
    write_csv(PROJECT_HEADERS, projects.iter().map(project_row))
}

pub fn project_template_csv() -> Result<Vec<u8>, ExportError> {
    write_csv(PROJECT_HEADERS, [PROJECT_TEMPLATE_SAMPLE.to_vec()])
}

pub fn export_file_name(today: NaiveDate) -> String {
    format!("projects_export_{}.csv", to_iso(today))
}
