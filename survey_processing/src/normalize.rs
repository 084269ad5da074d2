//! Helpers that turn the free-text answers of the survey into normalized values.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Scope;

pub const UNKNOWN: &str = "Unknown";
pub const COUNTYWIDE: &str = "Countywide";

static DISTRICT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)(st|nd|rd|th)\s+District").unwrap());

static SPA_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^SPA\s*(\d+)").unwrap());

/// Maps the sector answer to one of Nonprofit, Government, Foundation or Academic.
///
/// The answer is trimmed first. Other answers are returned trimmed, and a
/// blank answer is `Unknown`.
pub fn normalize_sector(raw: &str) -> String {
    let sector = raw.trim();
    match sector {
        "" => UNKNOWN.to_string(),
        "Nonprofit/CBO" => "Nonprofit".to_string(),
        "Government Agency" => "Government".to_string(),
        "Foundation" => "Foundation".to_string(),
        "College/University" => "Academic".to_string(),
        s => s.to_string(),
    }
}

/// Reads the primary supervisorial district out of the free-text answer.
///
/// ```
/// use survey_processing::normalize::extract_primary_district;
///
/// assert_eq!(extract_primary_district("3rd District"), "District 3");
/// assert_eq!(extract_primary_district("Countywide services"), "Countywide");
/// assert_eq!(extract_primary_district(""), "Unknown");
/// ```
pub fn extract_primary_district(raw: &str) -> String {
    if raw.contains(COUNTYWIDE) {
        return COUNTYWIDE.to_string();
    }
    match DISTRICT_PATTERN.captures(raw) {
        Some(caps) => format!("District {}", &caps[1]),
        None => UNKNOWN.to_string(),
    }
}

/// Splits a comma-joined multi-select answer into its trimmed, non-empty tokens.
pub fn parse_multi_select(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

pub fn calculate_scope(served_districts: &[String]) -> Scope {
    if served_districts.len() >= 4 || served_districts.iter().any(|d| d == COUNTYWIDE) {
        Scope::Countywide
    } else if served_districts.len() >= 2 {
        Scope::MultiDistrict
    } else {
        Scope::SingleDistrict
    }
}

/// Display size of a node of the network chart, between 5 and 20.
pub fn calculate_node_size(activity_count: usize, served_district_count: usize) -> u32 {
    let raw = 2 * activity_count + served_district_count;
    raw.clamp(5, 20) as u32
}

/// Short display names of the four action plan goals.
pub fn goal_short_name(goal: &str) -> &str {
    match goal {
        "Improve affordability of healthy foods" => "Affordability",
        "Increase equitable access to healthy foods" => "Access",
        "Build market demand and consumption of healthy foods" => "Demand",
        "Support sustainability and resilience in food systems and supply chains" => {
            "Sustainability"
        }
        g => g,
    }
}

/// Reduces a service planning area answer to `SPA n` labels.
///
/// "SPA 4- Metro LA (Boyle Heights, Central City)" becomes "SPA 4". Several
/// areas are joined with ", " without duplicates.
pub fn clean_spa(raw: &str) -> String {
    if raw.trim().is_empty() {
        return String::new();
    }
    if raw.to_lowercase().contains("countywide") {
        return COUNTYWIDE.to_string();
    }
    let mut spas: Vec<String> = Vec::new();
    for token in raw.split(',') {
        if let Some(caps) = SPA_PATTERN.captures(token.trim()) {
            let spa = format!("SPA {}", &caps[1]);
            if !spas.contains(&spa) {
                spas.push(spa);
            }
        }
    }
    spas.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sectors() {
        assert_eq!(normalize_sector("Nonprofit/CBO"), "Nonprofit");
        assert_eq!(normalize_sector("Government Agency"), "Government");
        assert_eq!(normalize_sector("College/University"), "Academic");
        assert_eq!(normalize_sector("Foundation"), "Foundation");
        assert_eq!(normalize_sector("For-profit business"), "For-profit business");
        assert_eq!(normalize_sector(""), "Unknown");
        assert_eq!(normalize_sector("   "), "Unknown");
        assert_eq!(normalize_sector(" Nonprofit/CBO "), "Nonprofit");
    }

    #[test]
    fn districts() {
        assert_eq!(extract_primary_district("3rd District"), "District 3");
        assert_eq!(
            extract_primary_district("Supervisorial 1st  District (Solis)"),
            "District 1"
        );
        // Only the first match counts.
        assert_eq!(
            extract_primary_district("2nd District, 5th District"),
            "District 2"
        );
        assert_eq!(extract_primary_district("Countywide services"), "Countywide");
        assert_eq!(extract_primary_district("District three"), "Unknown");
        assert_eq!(extract_primary_district(""), "Unknown");
    }

    #[test]
    fn multi_select() {
        assert_eq!(parse_multi_select("A, B ,C"), strings(&["A", "B", "C"]));
        assert_eq!(parse_multi_select("A,, ,B"), strings(&["A", "B"]));
        assert!(parse_multi_select("").is_empty());
    }

    #[test]
    fn scopes() {
        assert_eq!(calculate_scope(&strings(&["Countywide"])), Scope::Countywide);
        assert_eq!(
            calculate_scope(&strings(&["District 1", "District 2"])),
            Scope::MultiDistrict
        );
        assert_eq!(
            calculate_scope(&strings(&["District 1"])),
            Scope::SingleDistrict
        );
        assert_eq!(calculate_scope(&[]), Scope::SingleDistrict);
        assert_eq!(
            calculate_scope(&strings(&["D1", "D2", "D3", "D4"])),
            Scope::Countywide
        );
    }

    #[test]
    fn node_size_is_clamped() {
        assert_eq!(calculate_node_size(0, 0), 5);
        assert_eq!(calculate_node_size(3, 2), 8);
        assert_eq!(calculate_node_size(12, 1), 20);
    }

    #[test]
    fn spas() {
        assert_eq!(clean_spa(""), "");
        assert_eq!(clean_spa("All SPAs (Countywide)"), "Countywide");
        assert_eq!(
            clean_spa("SPA 4- Metro LA (Boyle Heights, Central City), spa6 - South"),
            "SPA 4, SPA 6"
        );
        assert_eq!(clean_spa("SPA 2, SPA 2 - San Fernando"), "SPA 2");
        assert_eq!(clean_spa("Metro"), "");
    }

    #[test]
    fn goal_names() {
        assert_eq!(
            goal_short_name("Increase equitable access to healthy foods"),
            "Access"
        );
        assert_eq!(goal_short_name("Other"), "Other");
    }
}
