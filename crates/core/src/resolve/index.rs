use crate::domain::record::{FeatureVector, HistoricalRecord};
use crate::domain::request::{CategoricalQuery, PredictionRequest};
use crate::resolve::error::{BuildError, ResolveError};
use crate::resolve::ladder::{SpecificityLevel, FALLBACK_LADDER};
use std::collections::HashMap;

/// Lookup key for one grouping: the level plus the raw categorical values in
/// that level's field order. The level is part of the key, so two levels with
/// coincidentally equal value tuples stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexKey {
    pub level: SpecificityLevel,
    pub values: Vec<String>,
}

impl IndexKey {
    pub fn for_record(level: SpecificityLevel, record: &HistoricalRecord) -> Self {
        Self {
            level,
            values: level
                .fields()
                .iter()
                .map(|field| record.field(*field).to_string())
                .collect(),
        }
    }

    pub fn for_query(level: SpecificityLevel, query: &CategoricalQuery) -> Self {
        Self {
            level,
            values: level
                .fields()
                .iter()
                .map(|field| query.field(*field).to_string())
                .collect(),
        }
    }
}

/// The outcome of a successful resolution: the representative group's
/// features plus the level the match occurred at.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub features: FeatureVector,
    pub matched_level: SpecificityLevel,
}

/// Precomputed multi-granularity feature lookup. Built once, offline, by the
/// worker; immutable afterwards and shared by reference across any number of
/// concurrent request handlers.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureIndex {
    entries: HashMap<IndexKey, FeatureVector>,
}

impl FeatureIndex {
    /// Build the index from the full historical dataset.
    ///
    /// For every ladder level, each group of records sharing that level's
    /// values contributes exactly one entry: the features of the most recent
    /// record. Among records with the same date, the one appearing later in
    /// dataset order wins, so rebuilding from the same dataset always yields
    /// the same index.
    pub fn build(records: &[HistoricalRecord]) -> Result<FeatureIndex, BuildError> {
        if records.is_empty() {
            return Err(BuildError::EmptyDataset);
        }

        let mut entries = HashMap::new();
        for level in FALLBACK_LADDER {
            let mut representative: HashMap<IndexKey, &HistoricalRecord> = HashMap::new();
            for record in records {
                let key = IndexKey::for_record(level, record);
                let replace = match representative.get(&key) {
                    Some(current) => record.date >= current.date,
                    None => true,
                };
                if replace {
                    representative.insert(key, record);
                }
            }
            for (key, record) in representative {
                entries.insert(key, record.features.clone());
            }
        }

        Ok(FeatureIndex { entries })
    }

    /// Rebuild the in-memory map from deserialized artifact entries.
    pub fn from_entries(entries: HashMap<IndexKey, FeatureVector>) -> Self {
        Self { entries }
    }

    /// Resolve a request to the most specific historical grouping available.
    ///
    /// All six categorical fields must be present; the ladder is walked most
    /// to least specific and the first match wins. A request whose commodity
    /// misses even the backstop level was never seen in training. Pure
    /// function of `(self, request)`.
    pub fn resolve(&self, request: &PredictionRequest) -> Result<Resolution, ResolveError> {
        let query = CategoricalQuery::try_new(request)?;

        for level in FALLBACK_LADDER {
            let key = IndexKey::for_query(level, &query);
            if let Some(features) = self.entries.get(&key) {
                return Ok(Resolution {
                    features: features.clone(),
                    matched_level: level,
                });
            }
        }

        Err(ResolveError::NoMatch {
            commodity: query.commodity,
        })
    }

    pub fn get(&self, key: &IndexKey) -> Option<&FeatureVector> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn level_len(&self, level: SpecificityLevel) -> usize {
        self.entries.keys().filter(|key| key.level == level).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IndexKey, &FeatureVector)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::CategoricalField;
    use chrono::NaiveDate;

    fn features(marker: f64) -> FeatureVector {
        FeatureVector {
            price_spread: marker,
            price_spread_ratio: 0.05,
            modal_to_min_ratio: 1.1,
            modal_to_max_ratio: 0.9,
            commodity_price_zscore: 0.2,
            market_avg_price: 1800.0,
            state_avg_price: 1750.0,
            market_price_deviation: 50.0,
            lag_1: 1810.0,
            lag_7: 1790.0,
            pct_change_7: 0.011,
            month: 1,
            week: 2,
            month_sin: 0.5,
            month_cos: 0.86,
        }
    }

    fn record(
        fields: [&str; 6],
        date: (i32, u32, u32),
        marker: f64,
    ) -> HistoricalRecord {
        HistoricalRecord {
            state: fields[0].to_string(),
            district: fields[1].to_string(),
            market: fields[2].to_string(),
            commodity: fields[3].to_string(),
            variety: fields[4].to_string(),
            grade: fields[5].to_string(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            features: features(marker),
        }
    }

    fn request(fields: [&str; 6]) -> PredictionRequest {
        PredictionRequest {
            state: Some(fields[0].to_string()),
            district: Some(fields[1].to_string()),
            market: Some(fields[2].to_string()),
            commodity: Some(fields[3].to_string()),
            variety: Some(fields[4].to_string()),
            grade: Some(fields[5].to_string()),
            date: None,
        }
    }

    const WHEAT_FULL: [&str; 6] = ["A", "B", "C", "Wheat", "V1", "G1"];

    #[test]
    fn most_recent_record_represents_each_group() {
        let records = vec![
            record(WHEAT_FULL, (2024, 1, 1), 1.0),
            record(WHEAT_FULL, (2024, 3, 1), 2.0),
            record(WHEAT_FULL, (2024, 2, 1), 3.0),
        ];
        let index = FeatureIndex::build(&records).unwrap();

        let resolution = index.resolve(&request(WHEAT_FULL)).unwrap();
        assert_eq!(resolution.features.price_spread, 2.0);
    }

    #[test]
    fn equal_dates_tie_break_to_the_last_input_row() {
        let records = vec![
            record(WHEAT_FULL, (2024, 1, 1), 1.0),
            record(WHEAT_FULL, (2024, 1, 1), 2.0),
            record(WHEAT_FULL, (2024, 1, 1), 3.0),
        ];
        let index = FeatureIndex::build(&records).unwrap();

        let resolution = index.resolve(&request(WHEAT_FULL)).unwrap();
        assert_eq!(resolution.features.price_spread, 3.0);
    }

    #[test]
    fn empty_dataset_is_rejected() {
        assert_eq!(FeatureIndex::build(&[]), Err(BuildError::EmptyDataset));
    }

    #[test]
    fn every_commodity_gets_a_backstop_entry() {
        let records = vec![
            record(["A", "B", "C", "Wheat", "V1", "G1"], (2024, 1, 1), 1.0),
            record(["X", "Y", "Z", "Onion", "Red", "FAQ"], (2024, 2, 1), 2.0),
            record(["P", "Q", "R", "Onion", "White", "FAQ"], (2024, 3, 1), 3.0),
        ];
        let index = FeatureIndex::build(&records).unwrap();

        for commodity in ["Wheat", "Onion"] {
            let key = IndexKey {
                level: SpecificityLevel::CommodityOnly,
                values: vec![commodity.to_string()],
            };
            assert!(index.get(&key).is_some(), "no backstop for {commodity}");
        }
        assert_eq!(index.level_len(SpecificityLevel::CommodityOnly), 2);
    }

    #[test]
    fn exact_match_wins_over_coarser_groups() {
        let records = vec![
            record(WHEAT_FULL, (2024, 1, 1), 1.0),
            record(["A", "B", "C", "Wheat", "V1", "G2"], (2024, 6, 1), 2.0),
        ];
        let index = FeatureIndex::build(&records).unwrap();

        let resolution = index.resolve(&request(WHEAT_FULL)).unwrap();
        assert_eq!(resolution.matched_level, SpecificityLevel::Full);
        assert_eq!(resolution.features.price_spread, 1.0);
    }

    #[test]
    fn falls_back_one_level_when_grade_is_unseen() {
        let records = vec![record(WHEAT_FULL, (2024, 1, 1), 1.0)];
        let index = FeatureIndex::build(&records).unwrap();

        let resolution = index
            .resolve(&request(["A", "B", "C", "Wheat", "V1", "UnseenGrade"]))
            .unwrap();
        assert_eq!(resolution.matched_level, SpecificityLevel::MarketVariety);
    }

    #[test]
    fn falls_back_to_state_commodity() {
        let records = vec![record(WHEAT_FULL, (2024, 1, 1), 1.0)];
        let index = FeatureIndex::build(&records).unwrap();

        let resolution = index
            .resolve(&request(["A", "Other", "Other", "Wheat", "V9", "G9"]))
            .unwrap();
        assert_eq!(resolution.matched_level, SpecificityLevel::StateCommodity);
    }

    // The two-record example from the resolution contract: an exact request
    // hits the older full-key group; a request with all finer fields unseen
    // lands on the backstop, which holds the most recent Wheat record.
    #[test]
    fn backstop_holds_the_most_recent_commodity_record() {
        let records = vec![
            record(WHEAT_FULL, (2024, 1, 1), 1.0),
            record(["D", "E", "F", "Wheat", "V2", "G2"], (2024, 6, 1), 2.0),
        ];
        let index = FeatureIndex::build(&records).unwrap();

        let exact = index.resolve(&request(WHEAT_FULL)).unwrap();
        assert_eq!(exact.matched_level, SpecificityLevel::Full);
        assert_eq!(exact.features.price_spread, 1.0);

        let coarse = index
            .resolve(&request(["U", "U", "U", "Wheat", "U", "U"]))
            .unwrap();
        assert_eq!(coarse.matched_level, SpecificityLevel::CommodityOnly);
        assert_eq!(coarse.features.price_spread, 2.0);
    }

    #[test]
    fn unseen_commodity_is_a_no_match() {
        let records = vec![record(WHEAT_FULL, (2024, 1, 1), 1.0)];
        let index = FeatureIndex::build(&records).unwrap();

        let err = index
            .resolve(&request(["A", "B", "C", "Saffron", "V1", "G1"]))
            .unwrap_err();
        assert_eq!(
            err,
            ResolveError::NoMatch {
                commodity: "Saffron".to_string()
            }
        );
    }

    #[test]
    fn missing_field_is_rejected_before_any_lookup() {
        let records = vec![record(WHEAT_FULL, (2024, 1, 1), 1.0)];
        let index = FeatureIndex::build(&records).unwrap();

        let mut req = request(WHEAT_FULL);
        req.market = None;
        assert_eq!(
            index.resolve(&req),
            Err(ResolveError::MissingField(CategoricalField::Market))
        );
    }

    #[test]
    fn resolution_is_deterministic() {
        let records = vec![
            record(WHEAT_FULL, (2024, 1, 1), 1.0),
            record(["D", "E", "F", "Wheat", "V2", "G2"], (2024, 6, 1), 2.0),
        ];
        let index = FeatureIndex::build(&records).unwrap();

        let req = request(["U", "U", "U", "Wheat", "U", "U"]);
        assert_eq!(index.resolve(&req).unwrap(), index.resolve(&req).unwrap());
    }

    #[test]
    fn building_twice_yields_identical_indexes() {
        let records = vec![
            record(WHEAT_FULL, (2024, 1, 1), 1.0),
            record(WHEAT_FULL, (2024, 1, 1), 2.0),
            record(["X", "Y", "Z", "Onion", "Red", "FAQ"], (2024, 2, 1), 3.0),
        ];
        assert_eq!(
            FeatureIndex::build(&records).unwrap(),
            FeatureIndex::build(&records).unwrap()
        );
    }

    #[test]
    fn one_entry_per_group_per_level() {
        let records = vec![
            record(WHEAT_FULL, (2024, 1, 1), 1.0),
            record(WHEAT_FULL, (2024, 2, 1), 2.0),
        ];
        let index = FeatureIndex::build(&records).unwrap();
        // One group at every level, five levels.
        assert_eq!(index.len(), FALLBACK_LADDER.len());
    }
}
