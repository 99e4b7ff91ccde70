//! Column mapping: raw header cells to canonical field names.
//!
//! Two strategies exist. Declarative mapping matches a header against field
//! labels from the project type config. Heuristic mapping walks an explicit,
//! ordered rule list and takes the first rule that matches; it serves the
//! semi-structured report exports whose headers drift between files.

use crate::config::FieldDefinition;
use std::collections::BTreeMap;

/// Canonical field name -> trimmed cell value.
pub type MappedRecord = BTreeMap<String, String>;

/// Header normalization used by every mapper.
pub fn normalize_header(header: &str) -> String {
    header.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderMatcher {
    /// Normalized header equals the key.
    Exact(&'static str),
    /// Normalized header contains the key anywhere.
    Contains(&'static str),
}

impl HeaderMatcher {
    pub fn matches(&self, normalized_header: &str) -> bool {
        match self {
            HeaderMatcher::Exact(key) => normalized_header == *key,
            HeaderMatcher::Contains(key) => normalized_header.contains(key),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderRule {
    pub matcher: HeaderMatcher,
    pub field: &'static str,
}

const fn exact(key: &'static str, field: &'static str) -> HeaderRule {
    HeaderRule {
        matcher: HeaderMatcher::Exact(key),
        field,
    }
}

const fn contains(key: &'static str, field: &'static str) -> HeaderRule {
    HeaderRule {
        matcher: HeaderMatcher::Contains(key),
        field,
    }
}

/// Free-WIFI site inventory report.
pub const FREE_WIFI_REAL_RULES: &[HeaderRule] = &[
    exact("ap site code", "site_code"),
    exact("ap site name", "site_name"),
    exact("location name", "location_name"),
    exact("site type", "site_type"),
    exact("cms provider", "cms_provider"),
    exact("link provider", "link_provider"),
    exact("last mile technology", "technology"),
    exact("bw download (cir)", "bandwidth"),
    exact("barangay", "barangay"),
    exact("locality", "municipality"),
    exact("province", "province"),
    exact("latitude", "latitude"),
    exact("longitude", "longitude"),
    exact("date of activation", "activation_date"),
    exact("status", "status"),
];

/// EgovPH activity report. Order matters: `date` is checked first, so any
/// header mentioning a date lands on `activity_date`, and the more specific
/// `province/` and `municipality/city` keys precede their bare forms.
pub const EGOV_REAL_RULES: &[HeaderRule] = &[
    contains("date", "activity_date"),
    contains("title of activity", "activity_title"),
    contains("type of activity", "activity_type"),
    contains("#participants", "participants"),
    contains("#downloads", "downloads"),
    contains("province/", "province"),
    contains("province", "province"),
    contains("municipality/city", "municipality"),
    contains("municipality", "municipality"),
    contains("district", "district"),
    contains("status", "status"),
    contains("facilitator", "facilitator"),
];

/// Standalone daily metrics sheet.
pub const DAILY_METRICS_RULES: &[HeaderRule] = &[
    exact("site code", "site_code"),
    exact("date", "date"),
    exact("status", "status"),
    exact("bandwidth utilization", "bandwidth_utilization"),
    exact("unique users", "unique_users"),
    exact("remarks", "remarks"),
];

/// First rule matching the header, if any.
pub fn match_header(rules: &[HeaderRule], header: &str) -> Option<&'static str> {
    let normalized = normalize_header(header);
    rules
        .iter()
        .find(|rule| rule.matcher.matches(&normalized))
        .map(|rule| rule.field)
}

/// Column index -> canonical field, resolved once per upload.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    columns: Vec<Option<String>>,
}

impl ColumnMap {
    /// Declarative mapping against field labels (case-insensitive, trimmed).
    pub fn from_labels(headers: &[String], fields: &[FieldDefinition]) -> Self {
        let columns = headers
            .iter()
            .map(|header| {
                let normalized = normalize_header(header);
                fields
                    .iter()
                    .find(|f| f.label.to_lowercase() == normalized)
                    .map(|f| f.name.clone())
            })
            .collect();
        Self { columns }
    }

    /// Heuristic mapping through an ordered rule list.
    pub fn from_rules(headers: &[String], rules: &[HeaderRule]) -> Self {
        let columns = headers
            .iter()
            .map(|header| match_header(rules, header).map(str::to_string))
            .collect();
        Self { columns }
    }

    pub fn field_at(&self, index: usize) -> Option<&str> {
        self.columns.get(index).and_then(|c| c.as_deref())
    }

    /// Build the record for one row. Unmapped columns are dropped and a later
    /// column mapped to the same field overwrites an earlier one. Cells past
    /// the header width are ignored.
    pub fn map_row(&self, cells: &[String]) -> MappedRecord {
        let mut record = MappedRecord::new();
        for (index, cell) in cells.iter().enumerate() {
            if let Some(field) = self.field_at(index) {
                record.insert(field.to_string(), cell.trim().to_string());
            }
        }
        record
    }
}

/// Non-empty value of a mapped field.
pub fn value<'a>(record: &'a MappedRecord, field: &str) -> Option<&'a str> {
    record
        .get(field)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
}

/// Mapped value or the empty string.
pub fn text(record: &MappedRecord, field: &str) -> String {
    record.get(field).cloned().unwrap_or_default()
}
