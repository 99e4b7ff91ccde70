//! Per-field validation against the configured field definitions.

use crate::config::{FieldDefinition, FieldType};
use crate::dates::parse_date;
use crate::mapping::MappedRecord;
use crate::normalize::is_numeric;

/// Which declared fields a processor checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationScope {
    AllFields,
    /// Only fields flagged `required`; optional fields are not inspected at all.
    RequiredOnly,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Validate one value. An empty list means the value is acceptable.
///
/// A required field left empty yields exactly one error and no type checks.
/// Empty means empty after trimming; `"0"` counts as a value.
pub fn validate_field(value: &str, field: &FieldDefinition) -> Vec<String> {
    let value = value.trim();
    let label = &field.label;

    if value.is_empty() {
        if field.required {
            return vec![format!("{label} is required")];
        }
        return Vec::new();
    }

    let mut errors = Vec::new();
    match field.field_type {
        FieldType::Number => {
            if !is_numeric(value) {
                errors.push(format!("{label} must be a number"));
            } else {
                let number: f64 = value.parse().unwrap_or_default();
                if let Some(min) = field.min.filter(|min| number < *min) {
                    errors.push(format!("{label} must be at least {min}"));
                }
                if let Some(max) = field.max.filter(|max| number > *max) {
                    errors.push(format!("{label} must be at most {max}"));
                }
            }
        }
        FieldType::Select => {
            if !field.options.is_empty() && !field.options.iter().any(|o| o == value) {
                errors.push(format!(
                    "{label} must be one of: {}",
                    field.options.join(", ")
                ));
            }
        }
        FieldType::Text => {
            if let Some(pattern) = &field.pattern {
                if !pattern.is_match(value) {
                    errors.push(format!("{label} format is invalid"));
                }
            }
        }
        FieldType::Date => {
            if parse_date(value).is_none() {
                errors.push(format!("{label} must be a valid date"));
            }
        }
        FieldType::Checkbox | FieldType::Multiselect | FieldType::Textarea => {}
    }

    errors
}

/// Validate every field in scope, in declaration order. Missing columns are
/// treated as empty values.
pub fn validate_record(
    record: &MappedRecord,
    fields: &[FieldDefinition],
    scope: ValidationScope,
) -> Vec<FieldError> {
    fields
        .iter()
        .filter(|field| scope == ValidationScope::AllFields || field.required)
        .flat_map(|field| {
            let value = record.get(&field.name).map(String::as_str).unwrap_or("");
            validate_field(value, field)
                .into_iter()
                .map(|message| FieldError {
                    field: field.name.clone(),
                    message,
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectTypeCatalog;
    use serde_json::json;

    fn field(value: serde_json::Value) -> FieldDefinition {
        serde_json::from_value(value).unwrap()
    }

    fn latitude() -> FieldDefinition {
        field(json!({
            "name": "latitude",
            "label": "Latitude",
            "type": "number",
            "required": true,
            "min": -90,
            "max": 90,
        }))
    }

    // -------------------------------------------------------------------------
    // REQUIRED / EMPTY
    // -------------------------------------------------------------------------

    #[test]
    fn test_required_empty_yields_single_error() {
        assert_eq!(validate_field("", &latitude()), vec!["Latitude is required"]);
        assert_eq!(validate_field("   ", &latitude()), vec!["Latitude is required"]);
    }

    #[test]
    fn test_required_empty_never_reports_type_errors() {
        let catalog = ProjectTypeCatalog::builtin().unwrap();
        for def in catalog.types() {
            for f in def.fields.iter().filter(|f| f.required) {
                assert_eq!(validate_field("", f).len(), 1, "{}.{}", def.name, f.name);
            }
        }
    }

    #[test]
    fn test_optional_empty_is_valid() {
        let participants = field(json!({
            "name": "participants",
            "label": "Participants",
            "type": "number",
            "min": 0,
        }));
        assert!(validate_field("", &participants).is_empty());
    }

    #[test]
    fn test_zero_is_a_value() {
        let participants = field(json!({
            "name": "participants",
            "label": "Participants",
            "type": "number",
            "required": true,
            "min": 0,
        }));
        assert!(validate_field("0", &participants).is_empty());
    }

    // -------------------------------------------------------------------------
    // TYPE RULES
    // -------------------------------------------------------------------------

    #[test]
    fn test_number_rules() {
        assert!(validate_field("20.728794", &latitude()).is_empty());
        assert_eq!(validate_field("north", &latitude()), vec!["Latitude must be a number"]);
        assert_eq!(validate_field("95", &latitude()), vec!["Latitude must be at most 90"]);
        assert_eq!(validate_field("-90.5", &latitude()), vec!["Latitude must be at least -90"]);
        assert!(validate_field("90", &latitude()).is_empty());
    }

    #[test]
    fn test_fractional_bounds_are_printed_as_is() {
        let f = field(json!({
            "name": "bw",
            "label": "Bandwidth",
            "type": "number",
            "min": 0.5,
        }));
        assert_eq!(validate_field("0.1", &f), vec!["Bandwidth must be at least 0.5"]);
    }

    #[test]
    fn test_select_is_case_sensitive() {
        let status = field(json!({
            "name": "status",
            "label": "Status",
            "type": "select",
            "required": true,
            "options": ["Done", "Pending"],
        }));
        assert!(validate_field("Done", &status).is_empty());
        assert_eq!(
            validate_field("done", &status),
            vec!["Status must be one of: Done, Pending"]
        );
    }

    #[test]
    fn test_text_pattern() {
        let code = field(json!({
            "name": "site_code",
            "label": "Site Code",
            "type": "text",
            "required": true,
            "pattern": "^ELG-[0-9]{4}$",
        }));
        assert!(validate_field("ELG-0042", &code).is_empty());
        assert_eq!(validate_field("ELG-42", &code), vec!["Site Code format is invalid"]);
    }

    #[test]
    fn test_date_rule() {
        let date = field(json!({
            "name": "activity_date",
            "label": "Date",
            "type": "date",
            "required": true,
        }));
        assert!(validate_field("2024-04-30", &date).is_empty());
        assert!(validate_field("January 7, 2026", &date).is_empty());
        assert_eq!(validate_field("someday", &date), vec!["Date must be a valid date"]);
    }

    #[test]
    fn test_presence_only_types() {
        let notes = field(json!({
            "name": "notes",
            "label": "Notes",
            "type": "textarea",
            "required": true,
        }));
        assert!(validate_field("<anything goes>", &notes).is_empty());
    }

    // -------------------------------------------------------------------------
    // RECORDS
    // -------------------------------------------------------------------------

    #[test]
    fn test_validate_record_scopes() {
        let optional_lat = field(json!({
            "name": "lat",
            "label": "Lat",
            "type": "number",
            "max": 90,
        }));
        let fields = vec![latitude(), optional_lat];
        let mut record = MappedRecord::new();
        record.insert("lat".into(), "100".into());

        let all = validate_record(&record, &fields, ValidationScope::AllFields);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].field, "latitude");
        assert_eq!(all[1].message, "Lat must be at most 90");

        let required = validate_record(&record, &fields, ValidationScope::RequiredOnly);
        assert_eq!(required.len(), 1);
        assert_eq!(required[0].message, "Latitude is required");
    }
}
