use crate::domain::record::FeatureVector;
use crate::model::PriceModel;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const MODEL_SCHEMA_VERSION: u32 = 1;

/// Serialized linear regression over the engineered features, fitted offline
/// on log prices. Coefficient order in the artifact is not significant; the
/// loaded model fixes the column order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModelArtifact {
    pub schema_version: u32,
    pub intercept: f64,
    pub coefficients: BTreeMap<String, f64>,
}

#[derive(Debug, Clone)]
pub struct LinearModel {
    intercept: f64,
    columns: Vec<String>,
    weights: Vec<f64>,
}

impl LinearModel {
    /// Validate and load an artifact. A version mismatch or a coefficient
    /// naming a column the feature vector cannot supply is fatal; a model
    /// that cannot be fed must not serve.
    pub fn from_artifact(artifact: LinearModelArtifact) -> Result<Self> {
        anyhow::ensure!(
            artifact.schema_version == MODEL_SCHEMA_VERSION,
            "unsupported price model schema_version {} (expected {MODEL_SCHEMA_VERSION})",
            artifact.schema_version
        );
        anyhow::ensure!(
            !artifact.coefficients.is_empty(),
            "price model has no coefficients"
        );

        let mut columns = Vec::with_capacity(artifact.coefficients.len());
        let mut weights = Vec::with_capacity(artifact.coefficients.len());
        for (column, weight) in artifact.coefficients {
            anyhow::ensure!(
                FeatureVector::COLUMNS.contains(&column.as_str()),
                "price model references unknown feature column '{column}'"
            );
            columns.push(column);
            weights.push(weight);
        }

        Ok(Self {
            intercept: artifact.intercept,
            columns,
            weights,
        })
    }
}

impl PriceModel for LinearModel {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn feature_columns(&self) -> &[String] {
        &self.columns
    }

    fn predict_log_price(&self, row: &[f64]) -> Result<f64> {
        anyhow::ensure!(
            row.len() == self.weights.len(),
            "feature row has {} values but the model expects {}",
            row.len(),
            self.weights.len()
        );
        let dot: f64 = row.iter().zip(&self.weights).map(|(x, w)| x * w).sum();
        Ok(self.intercept + dot)
    }
}
