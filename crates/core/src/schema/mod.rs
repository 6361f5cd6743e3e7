use crate::domain::record::HistoricalRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Cascading dropdown data for the request form, precomputed from the same
/// dataset snapshot the index is built from. Pure derived reference data;
/// the resolver never consults it.
///
/// Composite keys join their parts with `|`: `markets` is keyed by
/// `"state|district"`, `commodities` by `"state|district|market"`, `grades`
/// by `"commodity|variety"`. `varieties` is keyed by commodity alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    pub states: Vec<String>,
    pub districts: BTreeMap<String, Vec<String>>,
    pub markets: BTreeMap<String, Vec<String>>,
    pub commodities: BTreeMap<String, Vec<String>>,
    pub varieties: BTreeMap<String, Vec<String>>,
    pub grades: BTreeMap<String, Vec<String>>,
}

pub fn join_key(parts: &[&str]) -> String {
    parts.join("|")
}

impl InputSchema {
    pub fn from_records(records: &[HistoricalRecord]) -> Self {
        let mut states = BTreeSet::new();
        let mut districts: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut markets: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut commodities: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut varieties: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut grades: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for r in records {
            states.insert(r.state.clone());
            districts
                .entry(r.state.clone())
                .or_default()
                .insert(r.district.clone());
            markets
                .entry(join_key(&[&r.state, &r.district]))
                .or_default()
                .insert(r.market.clone());
            commodities
                .entry(join_key(&[&r.state, &r.district, &r.market]))
                .or_default()
                .insert(r.commodity.clone());
            varieties
                .entry(r.commodity.clone())
                .or_default()
                .insert(r.variety.clone());
            grades
                .entry(join_key(&[&r.commodity, &r.variety]))
                .or_default()
                .insert(r.grade.clone());
        }

        Self {
            states: states.into_iter().collect(),
            districts: into_sorted_lists(districts),
            markets: into_sorted_lists(markets),
            commodities: into_sorted_lists(commodities),
            varieties: into_sorted_lists(varieties),
            grades: into_sorted_lists(grades),
        }
    }

    pub fn districts_for(&self, state: &str) -> &[String] {
        list(&self.districts, state)
    }

    pub fn markets_for(&self, state: &str, district: &str) -> &[String] {
        list(&self.markets, &join_key(&[state, district]))
    }

    pub fn commodities_for(&self, state: &str, district: &str, market: &str) -> &[String] {
        list(&self.commodities, &join_key(&[state, district, market]))
    }

    pub fn varieties_for(&self, commodity: &str) -> &[String] {
        list(&self.varieties, commodity)
    }

    pub fn grades_for(&self, commodity: &str, variety: &str) -> &[String] {
        list(&self.grades, &join_key(&[commodity, variety]))
    }
}

fn into_sorted_lists(map: BTreeMap<String, BTreeSet<String>>) -> BTreeMap<String, Vec<String>> {
    map.into_iter()
        .map(|(key, values)| (key, values.into_iter().collect()))
        .collect()
}

fn list<'a>(map: &'a BTreeMap<String, Vec<String>>, key: &str) -> &'a [String] {
    map.get(key).map(Vec::as_slice).unwrap_or(&[])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::FeatureVector;
    use chrono::NaiveDate;

    fn record(fields: [&str; 6]) -> HistoricalRecord {
        HistoricalRecord {
            state: fields[0].to_string(),
            district: fields[1].to_string(),
            market: fields[2].to_string(),
            commodity: fields[3].to_string(),
            variety: fields[4].to_string(),
            grade: fields[5].to_string(),
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            features: FeatureVector {
                price_spread: 0.0,
                price_spread_ratio: 0.0,
                modal_to_min_ratio: 1.0,
                modal_to_max_ratio: 1.0,
                commodity_price_zscore: 0.0,
                market_avg_price: 0.0,
                state_avg_price: 0.0,
                market_price_deviation: 0.0,
                lag_1: 0.0,
                lag_7: 0.0,
                pct_change_7: 0.0,
                month: 1,
                week: 1,
                month_sin: 0.0,
                month_cos: 1.0,
            },
        }
    }

    #[test]
    fn builds_cascading_lookups() {
        let records = vec![
            record(["Maharashtra", "Nashik", "Lasalgaon", "Onion", "Red", "FAQ"]),
            record(["Maharashtra", "Nashik", "Pimpalgaon", "Onion", "Red", "Local"]),
            record(["Maharashtra", "Pune", "Pune", "Tomato", "Hybrid", "FAQ"]),
            record(["Punjab", "Ludhiana", "Khanna", "Wheat", "Dara", "FAQ"]),
        ];
        let schema = InputSchema::from_records(&records);

        assert_eq!(schema.states, vec!["Maharashtra", "Punjab"]);
        assert_eq!(schema.districts_for("Maharashtra"), ["Nashik", "Pune"]);
        assert_eq!(
            schema.markets_for("Maharashtra", "Nashik"),
            ["Lasalgaon", "Pimpalgaon"]
        );
        assert_eq!(
            schema.commodities_for("Maharashtra", "Nashik", "Lasalgaon"),
            ["Onion"]
        );
        assert_eq!(schema.varieties_for("Onion"), ["Red"]);
        assert_eq!(schema.grades_for("Onion", "Red"), ["FAQ", "Local"]);
    }

    #[test]
    fn unknown_keys_yield_empty_lists() {
        let schema = InputSchema::from_records(&[record([
            "Maharashtra",
            "Nashik",
            "Lasalgaon",
            "Onion",
            "Red",
            "FAQ",
        ])]);

        assert!(schema.districts_for("Kerala").is_empty());
        assert!(schema.markets_for("Maharashtra", "Pune").is_empty());
        assert!(schema.grades_for("Onion", "White").is_empty());
    }
}
