//! Persistence seam for the import pipeline.
//!
//! Processors only see [`ImportTx`]; the batch driver owns the transaction and
//! alone decides between commit and rollback.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Duplicate entry '{key}' for {entity}")]
    Duplicate { entity: &'static str, key: String },

    #[error(transparent)]
    Database(sqlx::Error),

    #[error("{0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub site_code: String,
    pub project_name: String,
    /// Unset for rows from the generic project list import.
    pub project_type: Option<String>,
    pub site_name: String,
    pub barangay: String,
    pub municipality: String,
    pub province: String,
    pub district: String,
    pub latitude: f64,
    pub longitude: f64,
    pub activation_date: Option<NaiveDate>,
    pub status: String,
    pub notes: String,
    /// Type-specific fields that have no dedicated column.
    pub custom_data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub activity_id: String,
    pub project_type: String,
    pub activity_title: String,
    pub activity_type: String,
    pub activity_date: Option<NaiveDate>,
    pub participants: i64,
    pub downloads: i64,
    pub province: String,
    pub municipality: String,
    pub district: String,
    pub status: String,
    pub facilitator: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyMetricRecord {
    pub site_code: String,
    pub metric_date: NaiveDate,
    pub status: String,
    pub bandwidth_utilization: f64,
    pub unique_users: i64,
    /// `None` keeps whatever remark is already stored for the day.
    pub remarks: Option<String>,
}

/// Audit row written for rejected values and automatic corrections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationLogEntry {
    pub import_batch_id: String,
    pub row_number: i64,
    pub field_name: String,
    pub error_message: String,
    pub original_value: String,
    pub corrected_value: String,
}

/// Registered CSV layout for one project type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportTemplate {
    pub project_type: String,
    pub template_name: String,
    pub template_description: String,
    pub csv_headers: Vec<String>,
    /// Column label -> canonical field name.
    pub field_mapping: BTreeMap<String, String>,
    /// Column label -> example value.
    pub sample_data: BTreeMap<String, String>,
}

#[async_trait]
pub trait ImportStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn ImportTx>, StoreError>;

    async fn find_template(&self, project_type: &str)
        -> Result<Option<ImportTemplate>, StoreError>;

    /// Insert or replace the template for its project type.
    async fn save_template(&self, template: &ImportTemplate) -> Result<(), StoreError>;

    /// All projects, newest first.
    async fn list_projects(&self) -> Result<Vec<ProjectRecord>, StoreError>;
}

/// One open import transaction.
///
/// Each write is isolated: a failed write leaves the transaction usable, so
/// callers may swallow individual failures and keep going.
#[async_trait]
pub trait ImportTx: Send {
    async fn site_code_exists(&mut self, site_code: &str) -> Result<bool, StoreError>;

    /// Plain insert; an existing `site_code` is a [`StoreError::Duplicate`].
    async fn insert_project(&mut self, project: &ProjectRecord) -> Result<(), StoreError>;

    /// Insert, or update the existing row with the same `site_code`.
    async fn upsert_project(&mut self, project: &ProjectRecord) -> Result<(), StoreError>;

    async fn upsert_activity(&mut self, activity: &ActivityRecord) -> Result<(), StoreError>;

    async fn upsert_daily_metric(&mut self, metric: &DailyMetricRecord) -> Result<(), StoreError>;

    async fn log_validation(&mut self, entry: &ValidationLogEntry) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
