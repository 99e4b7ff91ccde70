//! API Service - HTTP front end for the project import pipeline
//!
//! Endpoints:
//! - GET  /health - Health check
//! - GET  /api/import/project-types - Configured project types
//! - GET  /api/import/template?project_type= - Stored template as JSON
//! - GET  /api/import/template/download?project_type= - Template sample CSV
//! - POST /api/import - Typed import (multipart: csv_file, project_type, import_format)
//! - POST /api/projects/import - Plain project list import (multipart: csv_file)
//! - GET  /api/projects/export - All projects as CSV
//! - GET  /api/projects/template - Project list template CSV

pub mod error;
pub mod handlers;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::{AppError, AppResult};
pub use state::AppState;

/// Room for multipart boundaries and the text fields next to the file.
const FORM_OVERHEAD: usize = 64 * 1024;

pub fn router(state: AppState) -> Router {
    // CORS for web frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.catalog.settings().max_file_size + FORM_OVERHEAD;

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/import/project-types", get(handlers::project_types))
        .route("/api/import/template", get(handlers::template))
        .route("/api/import/template/download", get(handlers::template_download))
        .route("/api/import", post(handlers::import))
        .route("/api/projects/import", post(handlers::import_projects))
        .route("/api/projects/export", get(handlers::export_projects))
        .route("/api/projects/template", get(handlers::project_template))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
