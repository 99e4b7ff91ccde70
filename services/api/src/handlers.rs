//! HTTP handlers for the import endpoints.

use crate::error::{AppError, AppResult};
use crate::state::AppState;
use axum::extract::{Multipart, Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Local;
use importer::export::{export_file_name, export_projects_csv, project_template_csv};
use importer::processor::{
    import_site_list, import_table, ImportFormat, ImportResult, SiteListResult,
};
use importer::reader::read_upload;
use importer::template::download_template;
use importer::RawTable;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

// ============================================================================
// Request / response types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    ok: bool,
    version: &'static str,
}

#[derive(Deserialize)]
pub struct TemplateQuery {
    #[serde(default)]
    project_type: String,
}

struct UploadedFile {
    name: String,
    bytes: Vec<u8>,
}

/// Form fields of an import upload.
#[derive(Default)]
struct ImportForm {
    file: Option<UploadedFile>,
    project_type: String,
    import_format: ImportFormat,
}

async fn read_form(mut multipart: Multipart) -> AppResult<ImportForm> {
    let mut form = ImportForm::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "csv_file" => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                form.file = Some(UploadedFile {
                    name,
                    bytes: bytes.to_vec(),
                });
            }
            "project_type" => {
                form.project_type = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
            }
            "import_format" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                form.import_format = ImportFormat::from_form(&value);
            }
            _ => {}
        }
    }
    Ok(form)
}

fn read_file(state: &AppState, file: &UploadedFile) -> Result<RawTable, importer::ReadError> {
    let settings = state.catalog.settings();
    read_upload(
        &file.name,
        &file.bytes,
        settings.max_file_size,
        &settings.allowed_extensions,
    )
}

fn csv_attachment(bytes: Vec<u8>, file_name: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn project_types(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": state.catalog.summaries(),
    }))
}

pub async fn template(
    State(state): State<AppState>,
    Query(params): Query<TemplateQuery>,
) -> AppResult<Json<Value>> {
    let body = match state.store.find_template(&params.project_type).await? {
        Some(template) => json!({
            "success": true,
            "data": {
                "project_type": template.project_type,
                "headers": template.csv_headers,
                "field_mapping": template.field_mapping,
                "sample_data": template.sample_data,
            }
        }),
        None => json!({ "success": false, "error": "Template not found" }),
    };
    Ok(Json(body))
}

pub async fn template_download(
    State(state): State<AppState>,
    Query(params): Query<TemplateQuery>,
) -> AppResult<Response> {
    let csv = download_template(state.store.as_ref(), &params.project_type)
        .await?
        .ok_or_else(|| AppError::NotFound("Template not found".to_string()))?;
    Ok(csv_attachment(
        csv,
        &format!("{}_template.csv", params.project_type),
    ))
}

/// Typed import. Upload problems come back as a failed [`ImportResult`] so the
/// client always receives the same shape.
pub async fn import(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<ImportResult>> {
    let form = read_form(multipart).await?;
    let Some(file) = form.file else {
        return Ok(Json(ImportResult::rejected("No file uploaded or upload error")));
    };

    let table = match read_file(&state, &file) {
        Ok(table) => table,
        Err(err) => {
            tracing::warn!(file = %file.name, error = %err, "Upload rejected");
            return Ok(Json(ImportResult::rejected(err.to_string())));
        }
    };

    let result = import_table(
        state.store.as_ref(),
        &state.catalog,
        &form.project_type,
        form.import_format,
        &table,
    )
    .await;
    Ok(Json(result))
}

pub async fn import_projects(
    State(state): State<AppState>,
    multipart: Multipart,
) -> AppResult<Json<SiteListResult>> {
    let form = read_form(multipart).await?;
    let file = form
        .file
        .ok_or_else(|| AppError::BadRequest("No file uploaded".to_string()))?;
    let table = read_file(&state, &file)?;
    let result = import_site_list(state.store.as_ref(), &table).await?;
    Ok(Json(result))
}

pub async fn export_projects(State(state): State<AppState>) -> AppResult<Response> {
    let csv = export_projects_csv(state.store.as_ref()).await?;
    Ok(csv_attachment(csv, &export_file_name(Local::now().date_naive())))
}

pub async fn project_template() -> AppResult<Response> {
    Ok(csv_attachment(project_template_csv()?, "project_template.csv"))
}
