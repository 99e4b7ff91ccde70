use super::{correct_province, BatchContext, DataRow, RowError, RowOutcome, RowProcessor};
use crate::config::ProjectTypeDefinition;
use crate::dates::parse_date;
use crate::mapping::{text, value, ColumnMap, MappedRecord};
use crate::normalize::float_value;
use crate::store::{ImportTx, ProjectRecord, StoreError};
use crate::validate::{validate_record, ValidationScope};
use async_trait::async_trait;
use serde_json::{json, Map, Value};

/// Site-based template layouts that differ in validation and write mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiteLayout {
    /// Required fields only; re-imports update existing sites.
    FreeWifi,
    /// Every field validated; a site code already on file aborts the import.
    Elgu,
    /// Any other configured type; required fields only, upsert.
    Generic,
}

/// Declarative template import for site-based project types.
pub struct SiteTemplateProcessor<'a> {
    layout: SiteLayout,
    def: &'a ProjectTypeDefinition,
    common_fields: &'a [String],
    columns: ColumnMap,
}

impl<'a> SiteTemplateProcessor<'a> {
    pub fn new(
        layout: SiteLayout,
        def: &'a ProjectTypeDefinition,
        common_fields: &'a [String],
        headers: &[String],
    ) -> Self {
        Self {
            layout,
            def,
            common_fields,
            columns: ColumnMap::from_labels(headers, &def.fields),
        }
    }

    fn scope(&self) -> ValidationScope {
        match self.layout {
            SiteLayout::FreeWifi | SiteLayout::Generic => ValidationScope::RequiredOnly,
            SiteLayout::Elgu => ValidationScope::AllFields,
        }
    }

    fn custom_data(&self, record: &MappedRecord) -> Value {
        match self.layout {
            SiteLayout::FreeWifi => json!({
                "location_name": text(record, "location_name"),
                "site_type": text(record, "site_type"),
                "cms_provider": text(record, "cms_provider"),
                "link_provider": text(record, "link_provider"),
                "technology": text(record, "technology"),
                "bandwidth": text(record, "bandwidth"),
            }),
            SiteLayout::Elgu => json!({
                "lgu_name": text(record, "lgu_name"),
                "lgu_type": text(record, "lgu_type"),
                "services_digitalized": text(record, "services_digitalized"),
                "eboss_compliance": text(record, "eboss_compliance"),
            }),
            SiteLayout::Generic => {
                let extra: Map<String, Value> = record
                    .iter()
                    .filter(|(field, _)| !self.common_fields.iter().any(|c| c == *field))
                    .map(|(field, v)| (field.clone(), Value::String(v.clone())))
                    .collect();
                Value::Object(extra)
            }
        }
    }

    fn build_project(&self, record: &MappedRecord) -> ProjectRecord {
        let site_name = match self.layout {
            SiteLayout::FreeWifi => value(record, "site_name")
                .or_else(|| value(record, "location_name"))
                .unwrap_or_default()
                .to_string(),
            SiteLayout::Elgu => text(record, "lgu_name"),
            SiteLayout::Generic => text(record, "site_name"),
        };
        let date_field = match self.layout {
            SiteLayout::Elgu => "date_digitalized",
            _ => "activation_date",
        };

        ProjectRecord {
            site_code: text(record, "site_code"),
            project_name: self.def.name.clone(),
            project_type: Some(self.def.name.clone()),
            site_name,
            barangay: text(record, "barangay"),
            municipality: text(record, "municipality"),
            province: text(record, "province"),
            district: text(record, "district"),
            latitude: float_value(&text(record, "latitude")),
            longitude: float_value(&text(record, "longitude")),
            activation_date: value(record, date_field).and_then(parse_date),
            status: value(record, "status").unwrap_or("Pending").to_string(),
            notes: text(record, "notes"),
            custom_data: self.custom_data(record),
        }
    }
}

#[async_trait]
impl RowProcessor for SiteTemplateProcessor<'_> {
    fn name(&self) -> &'static str {
        match self.layout {
            SiteLayout::FreeWifi => "free-wifi-template",
            SiteLayout::Elgu => "elgu-template",
            SiteLayout::Generic => "generic-template",
        }
    }

    async fn process_row(
        &self,
        tx: &mut dyn ImportTx,
        batch: &mut BatchContext,
        row: DataRow<'_>,
    ) -> Result<RowOutcome, StoreError> {
        let mut record = self.columns.map_row(row.cells);
        let correction = correct_province(&mut record);

        let errors = validate_record(&record, &self.def.fields, self.scope());
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

        let project = self.build_project(&record);
        match self.layout {
            SiteLayout::Elgu => tx.insert_project(&project).await?,
            SiteLayout::FreeWifi | SiteLayout::Generic => tx.upsert_project(&project).await?,
        }

        Ok(RowOutcome::Inserted { sub_records: 0 })
    }
}
