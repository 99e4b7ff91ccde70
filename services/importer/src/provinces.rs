//! Canonical province names and fuzzy correction of user-entered spellings.

/// Minimum similarity (percent, exclusive) for a fuzzy match to be accepted.
pub const SIMILARITY_THRESHOLD: f64 = 70.0;

pub const PROVINCES: &[&str] = &[
    "Abra",
    "Agusan del Norte",
    "Agusan del Sur",
    "Aklan",
    "Albay",
    "Antique",
    "Apayao",
    "Aurora",
    "Basilan",
    "Bataan",
    "Batanes",
    "Batangas",
    "Benguet",
    "Biliran",
    "Bohol",
    "Bukidnon",
    "Bulacan",
    "Cagayan",
    "Camarines Norte",
    "Camarines Sur",
    "Camiguin",
    "Capiz",
    "Catanduanes",
    "Cavite",
    "Cebu",
    "Compostela Valley",
    "Cotabato",
    "Davao del Norte",
    "Davao del Sur",
    "Davao Occidental",
    "Davao Oriental",
    "Dinagat Islands",
    "Eastern Samar",
    "Guimaras",
    "Ifugao",
    "Ilocos Norte",
    "Ilocos Sur",
    "Iloilo",
    "Isabela",
    "Kalinga",
    "La Union",
    "Laguna",
    "Lanao del Norte",
    "Lanao del Sur",
    "Leyte",
    "Maguindanao",
    "Marinduque",
    "Masbate",
    "Metro Manila",
    "Misamis Occidental",
    "Misamis Oriental",
    "Mountain Province",
    "Negros Occidental",
    "Negros Oriental",
    "Northern Samar",
    "Nueva Ecija",
    "Nueva Vizcaya",
    "Occidental Mindoro",
    "Oriental Mindoro",
    "Palawan",
    "Pampanga",
    "Pangasinan",
    "Quezon",
    "Quirino",
    "Rizal",
    "Romblon",
    "Samar",
    "Sarangani",
    "Siquijor",
    "Sorsogon",
    "South Cotabato",
    "Southern Leyte",
    "Sultan Kudarat",
    "Sulu",
    "Surigao del Norte",
    "Surigao del Sur",
    "Tarlac",
    "Tawi-Tawi",
    "Zambales",
    "Zamboanga del Norte",
    "Zamboanga del Sur",
    "Zamboanga Sibugay",
];

/// Resolve a noisy province name to its canonical spelling.
///
/// Exact case-insensitive hits win outright. Otherwise the candidate with the
/// highest similarity wins, provided it scores strictly above
/// [`SIMILARITY_THRESHOLD`]; ties keep the earlier candidate.
pub fn closest_province(input: &str) -> Option<&'static str> {
    let needle = input.trim().to_lowercase();

    if let Some(exact) = PROVINCES.iter().find(|p| p.to_lowercase() == needle) {
        return Some(exact);
    }

    let mut best: Option<&'static str> = None;
    let mut best_score = 0.0;

    for province in PROVINCES {
        let score = similarity_percent(&province.to_lowercase(), &needle);
        if score > best_score && score > SIMILARITY_THRESHOLD {
            best_score = score;
            best = Some(province);
        }
    }

    best
}

/// Character similarity: twice the number of shared characters over the
/// combined length, as a percentage. Shared characters are counted by taking
/// the longest common run and recursing on both sides of it.
pub fn similarity_percent(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 0.0;
    }
    common_chars(&a, &b) as f64 * 2.0 * 100.0 / total as f64
}

fn common_chars(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }

    let (mut max, mut pos_a, mut pos_b) = (0, 0, 0);
    for i in 0..a.len() {
        for j in 0..b.len() {
            let mut k = 0;
            while i + k < a.len() && j + k < b.len() && a[i + k] == b[j + k] {
                k += 1;
            }
            if k > max {
                max = k;
                pos_a = i;
                pos_b = j;
            }
        }
    }

    if max == 0 {
        return 0;
    }

    max + common_chars(&a[..pos_a], &b[..pos_b])
        + common_chars(&a[pos_a + max..], &b[pos_b + max..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_size() {
        assert_eq!(PROVINCES.len(), 82);
    }

    #[test]
    fn test_exact_match_any_case_and_whitespace() {
        assert_eq!(closest_province("Camarines Sur"), Some("Camarines Sur"));
        assert_eq!(closest_province("camarines sur "), Some("Camarines Sur"));
        assert_eq!(closest_province("  BATANES"), Some("Batanes"));
    }

    #[test]
    fn test_every_canonical_name_resolves_to_itself() {
        for province in PROVINCES {
            assert_eq!(closest_province(province), Some(*province));
            assert_eq!(closest_province(&province.to_uppercase()), Some(*province));
        }
    }

    #[test]
    fn test_fuzzy_match_punctuation_variant() {
        assert_eq!(closest_province("Camarines-Sur"), Some("Camarines Sur"));
    }

    #[test]
    fn test_fuzzy_match_typo() {
        assert_eq!(closest_province("Isabella"), Some("Isabela"));
        assert_eq!(closest_province("Nueva Viscaya"), Some("Nueva Vizcaya"));
    }

    #[test]
    fn test_no_plausible_match() {
        assert_eq!(closest_province("Xyzzyplonk"), None);
        assert_eq!(closest_province(""), None);
    }

    #[test]
    fn test_similarity_percent_values() {
        assert_eq!(similarity_percent("abc", "abc"), 100.0);
        assert_eq!(similarity_percent("abc", "xyz"), 0.0);
        assert_eq!(similarity_percent("", ""), 0.0);
        // "World" vs "Word": common run "Wor" plus "d" -> 4 shared chars
        assert_eq!(similarity_percent("World", "Word"), 4.0 * 2.0 * 100.0 / 9.0);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // 7 shared of 20 total chars = 70% exactly, which must not match
        assert_eq!(similarity_percent("abcdefghij", "abcdefgxyz"), 70.0);
    }

    #[test]
    fn test_closest_province_at_the_threshold() {
        // "cotabat" shared with "cotabato": 7 of 20 chars is exactly 70%
        assert_eq!(similarity_percent("cotabato", "cotabat city"), 70.0);
        assert_eq!(closest_province("Cotabat City"), None);

        // one char shorter tips it over: 7 of 19 chars
        assert!(similarity_percent("cotabato", "cotabat cty") > SIMILARITY_THRESHOLD);
        assert_eq!(closest_province("Cotabat Cty"), Some("Cotabato"));
    }
}
