//! Date coercion for spreadsheet exports.
//!
//! Strict formats are tried first and only accepted when formatting the parsed
//! date reproduces the input exactly, so `05/01/2024` can never silently turn
//! into a different day through a later, looser format.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;

/// Strict formats in priority order.
const STRICT_FORMATS: &[&str] = &[
    "%Y-%m-%d",     // 2026-01-07
    "%m/%d/%Y",     // 01/07/2026
    "%d/%m/%Y",     // 25/01/2026
    "%B %-d, %Y",   // January 7, 2026
    "%b %-d, %Y",   // Jan 7, 2026
    "%-d-%b-%y",    // 7-Jan-26
    "%Y/%m/%d",     // 2026/01/07
];

/// Formats tried on the cleaned-up input when no strict format matched.
/// Dashes with a leading day follow the day-month-year convention. A `%Y`
/// match only counts for a four-digit year, so two-digit years fall through
/// to the `%y` variants.
const FREE_FORM_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m/%d/%y",
    "%d-%m-%Y",
    "%d.%m.%Y",
    "%Y.%m.%d",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%d-%b-%Y",
    "%d-%B-%Y",
    "%d %B %y",
    "%d %b %y",
    "%A %B %d %Y",
    "%a %b %d %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

static DATE_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([A-Za-z]+)\s+(\d+)-(\d+),?\s*(\d+)").expect("valid regex")
});

static MONTH_DAY_YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z]+)\s+(\d+),?\s*(\d+)").expect("valid regex"));

static ORDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").expect("valid regex"));

static ABBREVIATION_DOT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([A-Za-z])\.").expect("valid regex"));

/// Parse a date cell into a calendar date.
///
/// Returns `None` for empty input or anything no format accepts; callers
/// treat that as an invalid field, never as a fatal error.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let input = raw.trim();
    if input.is_empty() {
        return None;
    }

    parse_strict(input).or_else(|| parse_free_form(input))
}

/// Looser variant for real-world report exports: a range such as
/// `January 7-9, 2026` collapses to its first day and `January 9,2026`
/// is re-spaced before the regular pipeline runs.
pub fn parse_date_loose(raw: &str) -> Option<NaiveDate> {
    let input = raw.trim();
    if input.is_empty() {
        return None;
    }

    let mut candidate = input.to_string();

    if let Some(caps) = DATE_RANGE_RE.captures(&candidate) {
        candidate = format!("{} {}, {}", &caps[1], &caps[2], &caps[4]);
    }

    if let Some(caps) = MONTH_DAY_YEAR_RE.captures(&candidate) {
        candidate = format!("{} {}, {}", &caps[1], &caps[2], &caps[3]);
    }

    parse_date(&candidate)
}

/// Canonical storage form.
pub fn to_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn parse_strict(input: &str) -> Option<NaiveDate> {
    STRICT_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(input, fmt)
            .ok()
            .filter(|date| date.format(fmt).to_string() == input)
    })
}

fn parse_free_form(input: &str) -> Option<NaiveDate> {
    let today = Local::now().date_naive();
    match input.to_ascii_lowercase().as_str() {
        "today" | "now" => return Some(today),
        "yesterday" => return Some(today - Duration::days(1)),
        "tomorrow" => return Some(today + Duration::days(1)),
        _ => {}
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.date_naive());
    }

    if let Some(date) = DATETIME_FORMATS.iter().find_map(|fmt| {
        NaiveDateTime::parse_from_str(input, fmt)
            .ok()
            .map(|dt| dt.date())
            .filter(|date| has_full_year(fmt, *date))
    }) {
        return Some(date);
    }

    let cleaned = clean_free_form(input);
    FREE_FORM_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(&cleaned, fmt)
            .ok()
            .filter(|date| has_full_year(fmt, *date))
    })
}

/// chrono's `%Y` also reads one- and two-digit years.
fn has_full_year(fmt: &str, date: NaiveDate) -> bool {
    !fmt.contains("%Y") || date.year() >= 1000
}

/// Drop ordinal suffixes, commas and abbreviation dots; collapse whitespace.
fn clean_free_form(input: &str) -> String {
    let without_ordinals = ORDINAL_RE.replace_all(input, "$1");
    let without_dots = ABBREVIATION_DOT_RE.replace_all(&without_ordinals, "$1");
    without_dots
        .replace(',', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_iso_format() {
        assert_eq!(parse_date("2026-01-07"), Some(date(2026, 1, 7)));
    }

    #[test]
    fn test_us_format_wins_over_day_first() {
        assert_eq!(parse_date("05/01/2024"), Some(date(2024, 5, 1)));
    }

    #[test]
    fn test_day_first_when_month_out_of_range() {
        assert_eq!(parse_date("25/12/2024"), Some(date(2024, 12, 25)));
    }

    #[test]
    fn test_month_name_formats() {
        assert_eq!(parse_date("January 7, 2026"), Some(date(2026, 1, 7)));
        assert_eq!(parse_date("Jan 7, 2026"), Some(date(2026, 1, 7)));
        assert_eq!(parse_date("7-Jan-26"), Some(date(2026, 1, 7)));
        assert_eq!(parse_date("2026/01/07"), Some(date(2026, 1, 7)));
    }

    #[test]
    fn test_surrounding_whitespace_is_trimmed() {
        assert_eq!(parse_date("  2024-04-30 \t"), Some(date(2024, 4, 30)));
    }

    #[test]
    fn test_empty_and_blank_input() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("   "), None);
        assert_eq!(parse_date_loose(""), None);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("2024-13-45"), None);
        assert_eq!(parse_date("31/31/2024"), None);
    }

    #[test]
    fn test_round_trip_every_strict_format() {
        let samples = [
            date(2024, 2, 29),
            date(2026, 1, 7),
            date(2025, 12, 31),
            date(2023, 10, 1),
        ];
        for d in samples {
            for fmt in STRICT_FORMATS {
                // day-first renderings of days 1..=12 read as month-first
                if *fmt == "%d/%m/%Y" && d.day() <= 12 {
                    continue;
                }
                let rendered = d.format(fmt).to_string();
                assert_eq!(parse_date(&rendered), Some(d), "format {fmt} -> {rendered}");
            }
        }
    }

    #[test]
    fn test_free_form_fallback() {
        assert_eq!(parse_date("2024-1-5"), Some(date(2024, 1, 5)));
        assert_eq!(parse_date("January 9,2026"), Some(date(2026, 1, 9)));
        assert_eq!(parse_date("March 3rd, 2025"), Some(date(2025, 3, 3)));
        assert_eq!(parse_date("3 March 2025"), Some(date(2025, 3, 3)));
        assert_eq!(parse_date("Sep. 2 2025"), Some(date(2025, 9, 2)));
        assert_eq!(parse_date("january 7, 2026"), Some(date(2026, 1, 7)));
    }

    #[test]
    fn test_two_digit_years_are_this_century() {
        assert_eq!(parse_date("01/07/26"), Some(date(2026, 1, 7)));
        assert_eq!(parse_date("1/7/26"), Some(date(2026, 1, 7)));
        assert_eq!(parse_date("7 Jan 26"), Some(date(2026, 1, 7)));
        assert_eq!(parse_date("7 January 26"), Some(date(2026, 1, 7)));
    }

    #[test]
    fn test_short_year_never_reads_as_year_one() {
        for raw in ["01/07/26", "1/7/26", "7 Jan 26", "26/7/1"] {
            if let Some(parsed) = parse_date(raw) {
                assert!(parsed.year() >= 1000, "{raw} -> {parsed}");
            }
        }
    }

    #[test]
    fn test_datetime_inputs_keep_the_date() {
        assert_eq!(parse_date("2026-01-07 13:45:00"), Some(date(2026, 1, 7)));
        assert_eq!(parse_date("2026-01-07T13:45:00+08:00"), Some(date(2026, 1, 7)));
    }

    #[test]
    fn test_relative_keywords() {
        let today = Local::now().date_naive();
        assert_eq!(parse_date("today"), Some(today));
        assert_eq!(parse_date("Yesterday"), Some(today - Duration::days(1)));
    }

    #[test]
    fn test_loose_range_collapses_to_first_day() {
        assert_eq!(parse_date_loose("January 7-9, 2026"), Some(date(2026, 1, 7)));
        assert_eq!(parse_date_loose("Feb 10-12 2026"), Some(date(2026, 2, 10)));
    }

    #[test]
    fn test_loose_accepts_missing_space_after_comma() {
        assert_eq!(parse_date_loose("January 9,2026"), Some(date(2026, 1, 9)));
    }

    #[test]
    fn test_loose_still_handles_plain_dates() {
        assert_eq!(parse_date_loose("2026-01-07"), Some(date(2026, 1, 7)));
        assert_eq!(parse_date_loose("01/07/2026"), Some(date(2026, 1, 7)));
    }

    #[test]
    fn test_strict_parser_does_not_collapse_ranges() {
        assert_eq!(parse_date("January 7-9, 2026"), None);
    }

    #[test]
    fn test_to_iso() {
        assert_eq!(to_iso(date(2026, 1, 7)), "2026-01-07");
    }
}
