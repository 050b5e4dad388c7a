//! Three-level drill down over the location table.
//!
//! Each level only offers values present in the rows left over by the levels
//! above it. A requested value that is not on offer falls back to the first
//! option, the way a dropdown resets when its choices change.

use crate::types::LocationRecord;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Values requested by the user. Any level may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Selection {
    pub admin1: Option<String>,
    pub admin2: Option<String>,
    pub admin3: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cascade {
    pub admin1_options: Vec<String>,
    pub admin2_options: Vec<String>,
    pub admin3_options: Vec<String>,
    pub admin1: Option<String>,
    pub admin2: Option<String>,
    pub admin3: Option<String>,
    pub matches: Vec<LocationRecord>,
}

pub fn admin1_options(records: &[LocationRecord]) -> Vec<String> {
    sorted_unique(records.iter().map(|r| r.admin1.as_str()))
}

pub fn admin2_options(records: &[LocationRecord], admin1: &str) -> Vec<String> {
    sorted_unique(
        records.iter()
            .filter(|r| r.admin1 == admin1)
            .map(|r| r.admin2.as_str()),
    )
}

pub fn admin3_options(records: &[LocationRecord], admin1: &str, admin2: &str) -> Vec<String> {
    sorted_unique(
        records.iter()
            .filter(|r| r.admin1 == admin1 && r.admin2 == admin2)
            .map(|r| r.admin3.as_str()),
    )
}

pub fn resolve(records: &[LocationRecord], selection: &Selection) -> Cascade {
    let admin1_options = admin1_options(records);
    let admin1 = pick(&admin1_options, selection.admin1.as_deref());

    let level1: Vec<&LocationRecord> = match &admin1 {
        Some(a1) => records.iter().filter(|r| &r.admin1 == a1).collect(),
        None => Vec::new(),
    };
    let admin2_options = sorted_unique(level1.iter().map(|r| r.admin2.as_str()));
    let admin2 = pick(&admin2_options, selection.admin2.as_deref());

    let level2: Vec<&LocationRecord> = match &admin2 {
        Some(a2) => level1.into_iter().filter(|r| &r.admin2 == a2).collect(),
        None => Vec::new(),
    };
    let admin3_options = sorted_unique(level2.iter().map(|r| r.admin3.as_str()));
    let admin3 = pick(&admin3_options, selection.admin3.as_deref());

    let matches = match &admin3 {
        Some(a3) => level2.into_iter()
            .filter(|r| &r.admin3 == a3)
            .cloned()
            .collect(),
        None => Vec::new(),
    };

    Cascade {
        admin1_options,
        admin2_options,
        admin3_options,
        admin1,
        admin2,
        admin3,
        matches,
    }
}

fn pick(options: &[String], requested: Option<&str>) -> Option<String> {
    requested
        .and_then(|want| options.iter().find(|o| o.as_str() == want))
        .or_else(|| options.first())
        .cloned()
}

fn sorted_unique<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values.collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(a1: &str, a2: &str, a3: &str, lat: f64, lon: f64) -> LocationRecord {
        LocationRecord {
            admin1: a1.to_string(),
            admin2: a2.to_string(),
            admin3: a3.to_string(),
            lat,
            lon,
        }
    }

    fn table() -> Vec<LocationRecord> {
        vec![
            record("Nord-Kivu", "Goma", "Goma", -1.68, 29.22),
            record("Kinshasa", "Lukunga", "Gombe", -4.30, 15.30),
            record("Kinshasa", "Funa", "Limete", -4.35, 15.35),
            record("Kinshasa", "Funa", "Kalamu", -4.34, 15.31),
            record("Nord-Kivu", "Beni", "Oicha", 0.70, 29.52),
            record("Kinshasa", "Funa", "Kalamu", -4.40, 15.40),
        ]
    }

    fn select(a1: &str, a2: &str, a3: &str) -> Selection {
        Selection {
            admin1: Some(a1.to_string()),
            admin2: Some(a2.to_string()),
            admin3: Some(a3.to_string()),
        }
    }

    #[test]
    fn options_are_sorted_and_unique() {
        let records = table();
        assert_eq!(admin1_options(&records), ["Kinshasa", "Nord-Kivu"]);
        assert_eq!(admin2_options(&records, "Kinshasa"), ["Funa", "Lukunga"]);
        assert_eq!(admin3_options(&records, "Kinshasa", "Funa"), ["Kalamu", "Limete"]);
        assert!(admin2_options(&records, "Equateur").is_empty());
    }

    #[test]
    fn sorting_is_by_code_point() {
        let records = vec![
            record("b", "x", "x", 0.0, 0.0),
            record("B", "x", "x", 0.0, 0.0),
            record("É", "x", "x", 0.0, 0.0),
            record("a", "x", "x", 0.0, 0.0),
        ];
        assert_eq!(admin1_options(&records), ["B", "a", "b", "É"]);
    }

    #[test]
    fn full_selection_resolves_to_the_matching_rows() {
        let cascade = resolve(&table(), &select("Kinshasa", "Funa", "Limete"));
        assert_eq!(cascade.admin1.as_deref(), Some("Kinshasa"));
        assert_eq!(cascade.admin2.as_deref(), Some("Funa"));
        assert_eq!(cascade.admin3.as_deref(), Some("Limete"));
        assert_eq!(cascade.matches.len(), 1);
        assert_eq!(cascade.matches[0].lat, -4.35);
    }

    #[test]
    fn duplicate_triples_all_match_in_file_order() {
        let cascade = resolve(&table(), &select("Kinshasa", "Funa", "Kalamu"));
        let lats: Vec<f64> = cascade.matches.iter().map(|r| r.lat).collect();
        assert_eq!(lats, [-4.34, -4.40]);
    }

    #[test]
    fn empty_selection_takes_first_option_at_each_level() {
        let cascade = resolve(&table(), &Selection::default());
        assert_eq!(cascade.admin1.as_deref(), Some("Kinshasa"));
        assert_eq!(cascade.admin2.as_deref(), Some("Funa"));
        assert_eq!(cascade.admin3.as_deref(), Some("Kalamu"));
        assert_eq!(cascade.admin2_options, ["Funa", "Lukunga"]);
    }

    #[test]
    fn stale_lower_levels_reset_when_province_changes() {
        // Funa/Limete belong to Kinshasa, not Nord-Kivu.
        let cascade = resolve(&table(), &select("Nord-Kivu", "Funa", "Limete"));
        assert_eq!(cascade.admin2_options, ["Beni", "Goma"]);
        assert_eq!(cascade.admin2.as_deref(), Some("Beni"));
        assert_eq!(cascade.admin3.as_deref(), Some("Oicha"));
        assert_eq!(cascade.matches.len(), 1);
    }

    #[test]
    fn comparison_is_exact() {
        let cascade = resolve(&table(), &select("kinshasa", "Funa", "Limete"));
        // Falls back to the first province rather than matching case-insensitively.
        assert_eq!(cascade.admin1.as_deref(), Some("Kinshasa"));
        assert_eq!(cascade.admin3.as_deref(), Some("Limete"));
    }

    #[test]
    fn empty_table_resolves_to_nothing() {
        let cascade = resolve(&[], &select("Kinshasa", "Funa", "Limete"));
        assert!(cascade.admin1_options.is_empty());
        assert!(cascade.admin2_options.is_empty());
        assert!(cascade.admin3_options.is_empty());
        assert!(cascade.admin1.is_none());
        assert!(cascade.admin2.is_none());
        assert!(cascade.admin3.is_none());
        assert!(cascade.matches.is_empty());
    }
}
