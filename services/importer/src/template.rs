//! Import templates: generated once per project type from the catalog,
//! stored, and served back as a one-row sample CSV.

use crate::config::{FieldDefinition, FieldType, ProjectTypeCatalog, ProjectTypeDefinition};
use crate::dates::to_iso;
use crate::export::{write_csv, ExportError};
use crate::processor::DAILY_METRICS_TYPE;
use crate::store::{ImportStore, ImportTemplate};
use chrono::NaiveDate;
use rand::Rng;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static PATTERN_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Z]{2,4}").expect("valid regex"));

const SAMPLE_NOTE: &str = "Sample notes for this project";

/// Value shown for `field` in the sample row.
pub fn sample_value(field: &FieldDefinition, today: NaiveDate, rng: &mut impl Rng) -> String {
    if let Some(default) = &field.default {
        return default.clone();
    }
    if let Some(pattern) = &field.pattern {
        let prefix = PATTERN_PREFIX_RE
            .find(pattern.as_str())
            .map_or("XXX", |m| m.as_str());
        return format!("{prefix}-0001");
    }

    match field.field_type {
        FieldType::Text => format!("Sample {}", field.label),
        FieldType::Number => {
            let min = field.min.unwrap_or(1.0) as i64;
            let max = field.max.unwrap_or(100.0) as i64;
            let upper = max.min(min + 10).max(min);
            rng.gen_range(min..=upper).to_string()
        }
        FieldType::Select => field
            .options
            .first()
            .cloned()
            .unwrap_or_else(|| "Option 1".to_string()),
        FieldType::Date => to_iso(today),
        FieldType::Multiselect => {
            if field.options.is_empty() {
                "Option 1".to_string()
            } else {
                field.options.iter().take(2).cloned().collect::<Vec<_>>().join(", ")
            }
        }
        FieldType::Checkbox => "Yes".to_string(),
        FieldType::Textarea => SAMPLE_NOTE.to_string(),
    }
}

pub fn generate_template(
    def: &ProjectTypeDefinition,
    today: NaiveDate,
    rng: &mut impl Rng,
) -> ImportTemplate {
    let csv_headers = def.fields.iter().map(|f| f.label.clone()).collect();
    let field_mapping = def
        .fields
        .iter()
        .map(|f| (f.label.clone(), f.name.clone()))
        .collect();
    let sample_data = def
        .fields
        .iter()
        .map(|f| (f.label.clone(), sample_value(f, today, rng)))
        .collect();

    ImportTemplate {
        project_type: def.name.clone(),
        template_name: format!("{} Import Template", def.name),
        template_description: format!("Standard import template for {} projects", def.name),
        csv_headers,
        field_mapping,
        sample_data,
    }
}

/// Layout of the standalone daily metrics sheet.
pub fn daily_metrics_template(today: NaiveDate) -> ImportTemplate {
    let columns = [
        ("Site Code", "site_code", "WIFI-BTN-0001".to_string()),
        ("Date", "date", to_iso(today)),
        ("Status", "status", "UP".to_string()),
        ("Bandwidth Utilization", "bandwidth_utilization", "45.5".to_string()),
        ("Unique Users", "unique_users", "120".to_string()),
        ("Remarks", "remarks", "Sample remarks".to_string()),
    ];

    let mut field_mapping = BTreeMap::new();
    let mut sample_data = BTreeMap::new();
    let mut csv_headers = Vec::with_capacity(columns.len());
    for (label, field, sample) in columns {
        csv_headers.push(label.to_string());
        field_mapping.insert(label.to_string(), field.to_string());
        sample_data.insert(label.to_string(), sample);
    }

    ImportTemplate {
        project_type: DAILY_METRICS_TYPE.to_string(),
        template_name: format!("{DAILY_METRICS_TYPE} Import Template"),
        template_description: "Daily status, bandwidth and user counts per Free-WIFI site"
            .to_string(),
        csv_headers,
        field_mapping,
        sample_data,
    }
}

/// Header line plus one sample row. Headers without a sample get an empty cell.
pub fn render_template_csv(template: &ImportTemplate) -> Result<Vec<u8>, ExportError> {
    let sample: Vec<&str> = template
        .csv_headers
        .iter()
        .map(|h| template.sample_data.get(h).map_or("", String::as_str))
        .collect();
    write_csv(template.csv_headers.as_slice(), [sample])
}

/// Generate and store a template for every configured type plus the daily
/// metrics sheet. Returns how many were written.
pub async fn seed_templates(
    store: &dyn ImportStore,
    catalog: &ProjectTypeCatalog,
    today: NaiveDate,
    rng: &mut (impl Rng + Send),
) -> Result<usize, ExportError> {
    let mut templates: Vec<ImportTemplate> = catalog
        .types()
        .iter()
        .map(|def| generate_template(def, today, rng))
        .collect();
    templates.push(daily_metrics_template(today));

    for template in &templates {
        store.save_template(template).await?;
        tracing::info!(
            project_type = %template.project_type,
            columns = template.csv_headers.len(),
            "Import template stored"
        );
    }
    Ok(templates.len())
}

/// Sample CSV for a stored template, or `None` when the type has none.
pub async fn download_template(
    store: &dyn ImportStore,
    project_type: &str,
) -> Result<Option<Vec<u8>>, ExportError> {
    match store.find_template(project_type).await? {
        Some(template) => render_template_csv(&template).map(Some),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::UTF8_BOM;
    use crate::store::MemoryStore;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 7).unwrap()
    }

    fn catalog() -> ProjectTypeCatalog {
        ProjectTypeCatalog::builtin().unwrap()
    }

    // -------------------------------------------------------------------------
    // SAMPLE VALUES
    // -------------------------------------------------------------------------

    #[test]
    fn test_sample_values_by_field_kind() {
        let catalog = catalog();
        let mut rng = StdRng::seed_from_u64(7);
        let tech4ed = catalog.get("Tech4ED").unwrap();
        let sample = |name: &str, rng: &mut StdRng| {
            sample_value(tech4ed.field(name).unwrap(), today(), rng)
        };

        // no run of two or more capitals in ^T4E-[0-9]{4}$
        assert_eq!(sample("site_code", &mut rng), "XXX-0001");
        assert_eq!(sample("project_name", &mut rng), "Tech4ED Program");
        assert_eq!(sample("site_name", &mut rng), "Sample Center Name");
        assert_eq!(sample("province", &mut rng), "Batanes");
        assert_eq!(sample("activation_date", &mut rng), "2026-01-07");
        assert_eq!(sample("courses_offered", &mut rng), "Computer Basics, Microsoft Office");
        assert_eq!(sample("notes", &mut rng), SAMPLE_NOTE);
    }

    #[test]
    fn test_number_samples_stay_in_window() {
        let catalog = catalog();
        let tech4ed = catalog.get("Tech4ED").unwrap();
        let computers = tech4ed.field("computer_count").unwrap();
        let printers = tech4ed.field("printer_count").unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let n: i64 = sample_value(computers, today(), &mut rng).parse().unwrap();
            assert!((1..=11).contains(&n));
            let p: i64 = sample_value(printers, today(), &mut rng).parse().unwrap();
            assert!((0..=5).contains(&p));
        }
    }

    #[test]
    fn test_pattern_prefix_for_non_site_fields() {
        let catalog = catalog();
        let egov = catalog.get("EgovPH").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let template = generate_template(egov, today(), &mut rng);
        assert_eq!(template.sample_data["Activity ID"], "EGV-0001");
        assert_eq!(template.field_mapping["Date"], "activity_date");
        assert_eq!(template.csv_headers[0], "Activity ID");
        assert_eq!(template.template_name, "EgovPH Import Template");
    }

    // -------------------------------------------------------------------------
    // RENDERING AND STORAGE
    // -------------------------------------------------------------------------

    #[test]
    fn test_render_orders_cells_by_header() {
        let bytes = render_template_csv(&daily_metrics_template(today())).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = std::str::from_utf8(&bytes[UTF8_BOM.len()..]).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Site Code,Date,Status,Bandwidth Utilization,Unique Users,Remarks",
                "WIFI-BTN-0001,2026-01-07,UP,45.5,120,Sample remarks",
            ]
        );
    }

    #[tokio::test]
    async fn test_seed_then_download() {
        let store = MemoryStore::new();
        let catalog = catalog();
        let mut rng = StdRng::seed_from_u64(3);

        let written = seed_templates(&store, &catalog, today(), &mut rng).await.unwrap();
        assert_eq!(written, catalog.types().len() + 1);

        let csv = download_template(&store, "ELGU").await.unwrap().unwrap();
        let text = std::str::from_utf8(&csv[UTF8_BOM.len()..]).unwrap();
        assert!(text.starts_with("Site Code,Project Name,LGU Name,"));
        assert!(text.contains("ELG-0001,ELGU,Sample LGU Name,Municipal Hall"));

        assert!(download_template(&store, DAILY_METRICS_TYPE).await.unwrap().is_some());
        assert!(download_template(&store, "Unknown").await.unwrap().is_none());
    }
}
