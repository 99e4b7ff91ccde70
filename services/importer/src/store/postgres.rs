use super::{
    ActivityRecord, DailyMetricRecord, ImportStore, ImportTemplate, ImportTx, ProjectRecord,
    StoreError, ValidationLogEntry,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgQueryResult;
use sqlx::types::Json;
use sqlx::{Acquire, PgPool, Postgres, Transaction};
use std::collections::BTreeMap;

/// Postgres-backed store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TemplateRow {
    project_type: String,
    template_name: String,
    template_description: String,
    csv_headers: Json<Vec<String>>,
    field_mapping: Json<BTreeMap<String, String>>,
    sample_data: Json<BTreeMap<String, String>>,
}

impl From<TemplateRow> for ImportTemplate {
    fn from(row: TemplateRow) -> Self {
        ImportTemplate {
            project_type: row.project_type,
            template_name: row.template_name,
            template_description: row.template_description,
            csv_headers: row.csv_headers.0,
            field_mapping: row.field_mapping.0,
            sample_data: row.sample_data.0,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    site_code: String,
    project_name: String,
    project_type: Option<String>,
    site_name: String,
    barangay: String,
    municipality: String,
    province: String,
    district: String,
    latitude: f64,
    longitude: f64,
    activation_date: Option<NaiveDate>,
    status: String,
    notes: String,
    custom_data: serde_json::Value,
}

impl From<ProjectRow> for ProjectRecord {
    fn from(row: ProjectRow) -> Self {
        ProjectRecord {
            site_code: row.site_code,
            project_name: row.project_name,
            project_type: row.project_type,
            site_name: row.site_name,
            barangay: row.barangay,
            municipality: row.municipality,
            province: row.province,
            district: row.district,
            latitude: row.latitude,
            longitude: row.longitude,
            activation_date: row.activation_date,
            status: row.status,
            notes: row.notes,
            custom_data: row.custom_data,
        }
    }
}

#[async_trait]
impl ImportStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn ImportTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgImportTx { tx }))
    }

    async fn find_template(
        &self,
        project_type: &str,
    ) -> Result<Option<ImportTemplate>, StoreError> {
        let row: Option<TemplateRow> = sqlx::query_as(
            r#"
            SELECT project_type, template_name, template_description,
                   csv_headers, field_mapping, sample_data
            FROM import_templates
            WHERE project_type = $1 AND is_active = TRUE
            LIMIT 1
            "#,
        )
        .bind(project_type)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(ImportTemplate::from))
    }

    async fn save_template(&self, template: &ImportTemplate) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO import_templates
                (project_type, template_name, template_description, csv_headers, field_mapping, sample_data)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (project_type) DO UPDATE SET
                template_name = EXCLUDED.template_name,
                template_description = EXCLUDED.template_description,
                csv_headers = EXCLUDED.csv_headers,
                field_mapping = EXCLUDED.field_mapping,
                sample_data = EXCLUDED.sample_data,
                is_active = TRUE
            "#,
        )
        .bind(&template.project_type)
        .bind(&template.template_name)
        .bind(&template.template_description)
        .bind(Json(&template.csv_headers))
        .bind(Json(&template.field_mapping))
        .bind(Json(&template.sample_data))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_projects(&self) -> Result<Vec<ProjectRecord>, StoreError> {
        let rows: Vec<ProjectRow> = sqlx::query_as(
            r#"
            SELECT site_code, project_name, project_type, site_name, barangay, municipality,
                   province, district, latitude, longitude, activation_date, status, notes,
                   custom_data
            FROM projects
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(ProjectRecord::from).collect())
    }
}

/// Every write runs in its own savepoint so a failed statement does not
/// abort the enclosing transaction.
struct PgImportTx {
    tx: Transaction<'static, Postgres>,
}

async fn finish_savepoint(
    savepoint: Transaction<'_, Postgres>,
    result: Result<PgQueryResult, sqlx::Error>,
    entity: &'static str,
    key: &str,
) -> Result<(), StoreError> {
    match result {
        Ok(_) => {
            savepoint.commit().await?;
            Ok(())
        }
        Err(err) => {
            savepoint.rollback().await?;
            Err(classify(err, entity, key))
        }
    }
}

fn classify(err: sqlx::Error, entity: &'static str, key: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::Duplicate {
                entity,
                key: key.to_string(),
            };
        }
    }
    StoreError::Database(err)
}

const PROJECT_COLUMNS: &str = "site_code, project_name, project_type, site_name, barangay, \
     municipality, province, district, latitude, longitude, activation_date, status, notes, \
     custom_data";

#[async_trait]
impl ImportTx for PgImportTx {
    async fn site_code_exists(&mut self, site_code: &str) -> Result<bool, StoreError> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM projects WHERE site_code = $1)")
                .bind(site_code)
                .fetch_one(&mut *self.tx)
                .await?;
        Ok(exists)
    }

    async fn insert_project(&mut self, project: &ProjectRecord) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO projects ({PROJECT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        );
        let mut savepoint = Acquire::begin(&mut self.tx).await?;
        let result = bind_project(sqlx::query(&sql), project)
            .execute(&mut *savepoint)
            .await;
        finish_savepoint(savepoint, result, "projects", &project.site_code).await
    }

    async fn upsert_project(&mut self, project: &ProjectRecord) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO projects ({PROJECT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) \
             ON CONFLICT (site_code) DO UPDATE SET \
                 site_name = EXCLUDED.site_name, \
                 barangay = EXCLUDED.barangay, \
                 municipality = EXCLUDED.municipality, \
                 province = EXCLUDED.province, \
                 district = EXCLUDED.district, \
                 latitude = EXCLUDED.latitude, \
                 longitude = EXCLUDED.longitude, \
                 activation_date = EXCLUDED.activation_date, \
                 status = EXCLUDED.status, \
                 notes = EXCLUDED.notes, \
                 custom_data = EXCLUDED.custom_data, \
                 updated_at = now()"
        );
        let mut savepoint = Acquire::begin(&mut self.tx).await?;
        let result = bind_project(sqlx::query(&sql), project)
            .execute(&mut *savepoint)
            .await;
        finish_savepoint(savepoint, result, "projects", &project.site_code).await
    }

    async fn upsert_activity(&mut self, activity: &ActivityRecord) -> Result<(), StoreError> {
        let mut savepoint = Acquire::begin(&mut self.tx).await?;
        let result = sqlx::query(
            r#"
            INSERT INTO activities
                (activity_id, project_type, activity_title, activity_type, activity_date,
                 participants, downloads, province, municipality, district, status,
                 facilitator, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (activity_id) DO UPDATE SET
                project_type = EXCLUDED.project_type,
                activity_title = EXCLUDED.activity_title,
                activity_type = EXCLUDED.activity_type,
                activity_date = EXCLUDED.activity_date,
                participants = EXCLUDED.participants,
                downloads = EXCLUDED.downloads,
                province = EXCLUDED.province,
                municipality = EXCLUDED.municipality,
                district = EXCLUDED.district,
                status = EXCLUDED.status,
                facilitator = EXCLUDED.facilitator,
                latitude = EXCLUDED.latitude,
                longitude = EXCLUDED.longitude
            "#,
        )
        .bind(&activity.activity_id)
        .bind(&activity.project_type)
        .bind(&activity.activity_title)
        .bind(&activity.activity_type)
        .bind(activity.activity_date)
        .bind(activity.participants)
        .bind(activity.downloads)
        .bind(&activity.province)
        .bind(&activity.municipality)
        .bind(&activity.district)
        .bind(&activity.status)
        .bind(&activity.facilitator)
        .bind(activity.latitude)
        .bind(activity.longitude)
        .execute(&mut *savepoint)
        .await;
        finish_savepoint(savepoint, result, "activities", &activity.activity_id).await
    }

    async fn upsert_daily_metric(&mut self, metric: &DailyMetricRecord) -> Result<(), StoreError> {
        let mut savepoint = Acquire::begin(&mut self.tx).await?;
        let result = sqlx::query(
            r#"
            INSERT INTO daily_metrics
                (site_code, metric_date, status, bandwidth_utilization, unique_users, remarks)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (site_code, metric_date) DO UPDATE SET
                status = EXCLUDED.status,
                bandwidth_utilization = EXCLUDED.bandwidth_utilization,
                unique_users = EXCLUDED.unique_users,
                remarks = COALESCE(EXCLUDED.remarks, daily_metrics.remarks)
            "#,
        )
        .bind(&metric.site_code)
        .bind(metric.metric_date)
        .bind(&metric.status)
        .bind(metric.bandwidth_utilization)
        .bind(metric.unique_users)
        .bind(&metric.remarks)
        .execute(&mut *savepoint)
        .await;
        let key = format!("{}@{}", metric.site_code, metric.metric_date);
        finish_savepoint(savepoint, result, "daily_metrics", &key).await
    }

    async fn log_validation(&mut self, entry: &ValidationLogEntry) -> Result<(), StoreError> {
        let mut savepoint = Acquire::begin(&mut self.tx).await?;
        let result = sqlx::query(
            r#"
            INSERT INTO validation_logs
                (import_batch_id, row_number, field_name, error_message, original_value, corrected_value)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&entry.import_batch_id)
        .bind(entry.row_number)
        .bind(&entry.field_name)
        .bind(&entry.error_message)
        .bind(&entry.original_value)
        .bind(&entry.corrected_value)
        .execute(&mut *savepoint)
        .await;
        finish_savepoint(savepoint, result, "validation_logs", &entry.import_batch_id).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

fn bind_project<'q>(
    query: sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments>,
    project: &'q ProjectRecord,
) -> sqlx::query::Query<'q, Postgres, sqlx::postgres::PgArguments> {
    query
        .bind(&project.site_code)
        .bind(&project.project_name)
        .bind(&project.project_type)
        .bind(&project.site_name)
        .bind(&project.barangay)
        .bind(&project.municipality)
        .bind(&project.province)
        .bind(&project.district)
        .bind(project.latitude)
        .bind(project.longitude)
        .bind(project.activation_date)
        .bind(&project.status)
        .bind(&project.notes)
        .bind(&project.custom_data)
}
