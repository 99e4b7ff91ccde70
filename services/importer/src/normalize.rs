//! Value coercion and text cleanup shared by the import paths.

use regex::Regex;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*(>|$)").expect("valid regex"));

static NUMERIC_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?").expect("valid regex")
});

const DONE_STATUSES: &[&str] = &["done", "completed", "finish", "finished", "complete"];

/// Strict numeric check: the whole (trimmed) value must be a finite decimal
/// or exponent number. Words like `inf` or `nan` are not numbers here.
pub fn is_numeric(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    if value
        .chars()
        .any(|c| c.is_alphabetic() && c != 'e' && c != 'E')
    {
        return false;
    }
    value.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

/// Lenient float coercion: the leading numeric prefix, or 0.
///
/// `"12.5 Mbps"` -> 12.5, `"abc"` -> 0.0.
pub fn float_value(value: &str) -> f64 {
    NUMERIC_PREFIX_RE
        .find(value.trim_start())
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Lenient integer coercion, truncating toward zero.
pub fn int_value(value: &str) -> i64 {
    float_value(value) as i64
}

/// Remove markup tags. An unterminated tag swallows the rest of the input.
pub fn strip_tags(value: &str) -> String {
    TAG_RE.replace_all(value, "").into_owned()
}

pub fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Trim, strip tags, then HTML-escape free text before storage.
pub fn sanitize(value: &str) -> String {
    escape_html(&strip_tags(value.trim()))
}

/// Title-case a place name: lowercase everything, then uppercase the first
/// letter after each whitespace run.
pub fn standardize_location(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for c in value.trim().chars() {
        if c.is_whitespace() {
            at_word_start = true;
            out.push(c);
        } else if at_word_start {
            out.extend(c.to_uppercase());
            at_word_start = false;
        } else {
            out.extend(c.to_lowercase());
        }
    }
    out
}

/// Collapse free-form completion states onto `Done` / `Pending`.
pub fn normalize_status(value: &str) -> &'static str {
    let lowered = value.trim().to_lowercase();
    if DONE_STATUSES.contains(&lowered.as_str()) {
        "Done"
    } else {
        "Pending"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // NUMERIC COERCION
    // -------------------------------------------------------------------------

    #[test]
    fn test_is_numeric_accepts_numbers() {
        for value in ["0", "12", "-3.5", "+4", ".5", "1e3", " 20.728794 ", "121.804235"] {
            assert!(is_numeric(value), "{value} should be numeric");
        }
    }

    #[test]
    fn test_is_numeric_rejects_words() {
        for value in ["", "abc", "12abc", "inf", "NaN", "1,000", "--1"] {
            assert!(!is_numeric(value), "{value} should not be numeric");
        }
    }

    #[test]
    fn test_float_value_takes_leading_prefix() {
        assert_eq!(float_value("12.5 Mbps"), 12.5);
        assert_eq!(float_value("  7"), 7.0);
        assert_eq!(float_value("-0.25"), -0.25);
        assert_eq!(float_value("abc"), 0.0);
        assert_eq!(float_value(""), 0.0);
    }

    #[test]
    fn test_int_value_truncates() {
        assert_eq!(int_value("42"), 42);
        assert_eq!(int_value("12.9"), 12);
        assert_eq!(int_value("15 users"), 15);
        assert_eq!(int_value("n/a"), 0);
    }

    // -------------------------------------------------------------------------
    // TEXT CLEANUP
    // -------------------------------------------------------------------------

    #[test]
    fn test_sanitize_strips_tags_then_escapes() {
        assert_eq!(sanitize("  <b>Main</b> Hall "), "Main Hall");
        assert_eq!(sanitize("Tom & Jerry's \"Hub\""), "Tom &amp; Jerry&#039;s &quot;Hub&quot;");
        assert_eq!(sanitize("a <script"), "a ");
    }

    #[test]
    fn test_standardize_location() {
        assert_eq!(standardize_location("  SAN JOSE  "), "San Jose");
        assert_eq!(standardize_location("tawi-tawi"), "Tawi-tawi");
        assert_eq!(standardize_location("agusan del norte"), "Agusan Del Norte");
    }

    #[test]
    fn test_normalize_status() {
        assert_eq!(normalize_status("Completed"), "Done");
        assert_eq!(normalize_status(" finished "), "Done");
        assert_eq!(normalize_status("DONE"), "Done");
        assert_eq!(normalize_status("ongoing"), "Pending");
        assert_eq!(normalize_status(""), "Pending");
    }
}
