use crate::domain::record::FeatureVector;
use crate::model::linear::{LinearModel, LinearModelArtifact};
use crate::model::ModelMetadata;
use crate::resolve::index::{FeatureIndex, IndexKey};
use crate::resolve::ladder::SpecificityLevel;
use crate::schema::InputSchema;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use super::{FEATURE_INDEX_FILE, INPUT_SCHEMA_FILE, MODEL_METADATA_FILE, PRICE_MODEL_FILE};

pub const FEATURE_INDEX_SCHEMA_VERSION: u32 = 1;

/// On-disk form of the feature index. The lookup map is stored as a sorted
/// entry list (JSON maps cannot key on tuples) and rebuilt on load. The
/// artifact is versioned alongside the dataset snapshot it was built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureIndexArtifact {
    pub schema_version: u32,
    pub built_at: DateTime<Utc>,
    pub source_rows: usize,

    /// Feature columns the vectors were built with, checked on load against
    /// the compiled-in set. Drift means the serving binary would feed the
    /// model different features than training saw; that is fatal, not a
    /// partial load.
    pub feature_columns: Vec<String>,

    pub entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub level: SpecificityLevel,
    pub key: Vec<String>,
    pub features: FeatureVector,
}

impl FeatureIndexArtifact {
    pub fn from_index(index: &FeatureIndex, source_rows: usize, built_at: DateTime<Utc>) -> Self {
        let mut entries: Vec<IndexEntry> = index
            .iter()
            .map(|(key, features)| IndexEntry {
                level: key.level,
                key: key.values.clone(),
                features: features.clone(),
            })
            .collect();
        // Stable artifact bytes: same index, same file.
        entries.sort_by(|a, b| (a.level, &a.key).cmp(&(b.level, &b.key)));

        Self {
            schema_version: FEATURE_INDEX_SCHEMA_VERSION,
            built_at,
            source_rows,
            feature_columns: FeatureVector::COLUMNS.iter().map(|c| c.to_string()).collect(),
            entries,
        }
    }

    pub fn into_index(self) -> Result<FeatureIndex> {
        anyhow::ensure!(
            self.schema_version == FEATURE_INDEX_SCHEMA_VERSION,
            "unsupported feature index schema_version {} (expected {FEATURE_INDEX_SCHEMA_VERSION})",
            self.schema_version
        );

        let expected: Vec<String> = FeatureVector::COLUMNS.iter().map(|c| c.to_string()).collect();
        anyhow::ensure!(
            self.feature_columns == expected,
            "feature column drift between artifact and binary (artifact: {:?})",
            self.feature_columns
        );
        anyhow::ensure!(!self.entries.is_empty(), "feature index artifact has no entries");

        let mut map = HashMap::with_capacity(self.entries.len());
        for entry in self.entries {
            anyhow::ensure!(
                entry.key.len() == entry.level.fields().len(),
                "index entry key arity {} does not match level {}",
                entry.key.len(),
                entry.level.label()
            );
            let key = IndexKey {
                level: entry.level,
                values: entry.key,
            };
            anyhow::ensure!(
                map.insert(key, entry.features).is_none(),
                "duplicate index key in artifact"
            );
        }

        Ok(FeatureIndex::from_entries(map))
    }
}

pub fn save_feature_index(dir: &Path, index: &FeatureIndex, source_rows: usize) -> Result<()> {
    let artifact = FeatureIndexArtifact::from_index(index, source_rows, Utc::now());
    write_json_atomic(&dir.join(FEATURE_INDEX_FILE), &artifact)
}

pub fn load_feature_index(dir: &Path) -> Result<FeatureIndex> {
    let artifact: FeatureIndexArtifact = read_json(&dir.join(FEATURE_INDEX_FILE))?;
    artifact.into_index()
}

pub fn save_input_schema(dir: &Path, schema: &InputSchema) -> Result<()> {
    write_json_atomic(&dir.join(INPUT_SCHEMA_FILE), schema)
}

pub fn load_input_schema(dir: &Path) -> Result<InputSchema> {
    read_json(&dir.join(INPUT_SCHEMA_FILE))
}

pub fn load_price_model(dir: &Path) -> Result<LinearModel> {
    let artifact: LinearModelArtifact = read_json(&dir.join(PRICE_MODEL_FILE))?;
    LinearModel::from_artifact(artifact)
}

pub fn load_model_metadata(dir: &Path) -> Result<ModelMetadata> {
    read_json(&dir.join(MODEL_METADATA_FILE))
}

/// Write through a temp file and rename, so readers only ever see a complete
/// artifact.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create artifact dir {} failed", parent.display()))?;
    }

    let json = serde_json::to_vec_pretty(value).context("serialize artifact failed")?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, &json)
        .with_context(|| format!("write artifact {} failed", tmp.display()))?;
    std::fs::rename(&tmp, path)
        .with_context(|| format!("rename artifact into {} failed", path.display()))?;
    Ok(())
}

pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("read artifact {} failed", path.display()))?;
    serde_json::from_slice(&bytes)
        .with_context(|| format!("parse artifact {} failed", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::HistoricalRecord;
    use crate::model::PriceModel;
    use chrono::NaiveDate;

    fn records() -> Vec<HistoricalRecord> {
        let features = FeatureVector {
            price_spread: 120.0,
            price_spread_ratio: 0.06,
            modal_to_min_ratio: 1.02,
            modal_to_max_ratio: 0.97,
            commodity_price_zscore: -0.4,
            market_avg_price: 2150.0,
            state_avg_price: 2010.0,
            market_price_deviation: 140.0,
            lag_1: 2120.0,
            lag_7: 2080.0,
            pct_change_7: 0.019,
            month: 6,
            week: 23,
            month_sin: 0.0,
            month_cos: -1.0,
        };
        vec![
            HistoricalRecord {
                state: "Maharashtra".to_string(),
                district: "Nashik".to_string(),
                market: "Lasalgaon".to_string(),
                commodity: "Onion".to_string(),
                variety: "Red".to_string(),
                grade: "FAQ".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
                features: features.clone(),
            },
            HistoricalRecord {
                state: "Punjab".to_string(),
                district: "Ludhiana".to_string(),
                market: "Khanna".to_string(),
                commodity: "Wheat".to_string(),
                variety: "Dara".to_string(),
                grade: "FAQ".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 2, 10).unwrap(),
                features,
            },
        ]
    }

    #[test]
    fn feature_index_round_trips_through_the_artifact() {
        let index = FeatureIndex::build(&records()).unwrap();
        let dir = tempfile::tempdir().unwrap();

        save_feature_index(dir.path(), &index, 2).unwrap();
        let loaded = load_feature_index(dir.path()).unwrap();

        assert_eq!(loaded, index);
    }

    #[test]
    fn artifact_entries_are_sorted_for_stable_output() {
        let index = FeatureIndex::build(&records()).unwrap();
        let a = FeatureIndexArtifact::from_index(&index, 2, Utc::now());
        let b = FeatureIndexArtifact::from_index(&index, 2, a.built_at);
        assert_eq!(
            serde_json::to_string(&a.entries).unwrap(),
            serde_json::to_string(&b.entries).unwrap()
        );
    }

    #[test]
    fn schema_version_drift_is_fatal() {
        let index = FeatureIndex::build(&records()).unwrap();
        let mut artifact = FeatureIndexArtifact::from_index(&index, 2, Utc::now());
        artifact.schema_version = 99;
        assert!(artifact.into_index().is_err());
    }

    #[test]
    fn feature_column_drift_is_fatal() {
        let index = FeatureIndex::build(&records()).unwrap();
        let mut artifact = FeatureIndexArtifact::from_index(&index, 2, Utc::now());
        artifact.feature_columns.retain(|c| c != "lag_7");
        assert!(artifact.into_index().is_err());
    }

    #[test]
    fn duplicate_artifact_keys_are_rejected() {
        let index = FeatureIndex::build(&records()).unwrap();
        let mut artifact = FeatureIndexArtifact::from_index(&index, 2, Utc::now());
        let dup = artifact.entries[0].clone();
        artifact.entries.push(dup);
        assert!(artifact.into_index().is_err());
    }

    #[test]
    fn input_schema_round_trips() {
        let schema = InputSchema::from_records(&records());
        let dir = tempfile::tempdir().unwrap();

        save_input_schema(dir.path(), &schema).unwrap();
        assert_eq!(load_input_schema(dir.path()).unwrap(), schema);
    }

    #[test]
    fn price_model_artifact_loads() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = LinearModelArtifact {
            schema_version: crate::model::linear::MODEL_SCHEMA_VERSION,
            intercept: 7.2,
            coefficients: [("lag_1".to_string(), 0.001)].into_iter().collect(),
        };
        write_json_atomic(&dir.path().join(PRICE_MODEL_FILE), &artifact).unwrap();

        let model = load_price_model(dir.path()).unwrap();
        assert_eq!(model.feature_columns(), ["lag_1"]);
    }
}
