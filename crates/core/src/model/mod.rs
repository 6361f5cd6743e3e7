pub mod linear;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The regression model is an opaque collaborator: a row in the model's
/// declared feature-column order goes in, one log-scale price comes out.
/// Exponentiating back to a price is the caller's job.
pub trait PriceModel: Send + Sync {
    fn name(&self) -> &'static str;

    fn feature_columns(&self) -> &[String];

    fn predict_log_price(&self, row: &[f64]) -> anyhow::Result<f64>;
}

/// Descriptive metadata persisted next to the model artifact by the training
/// pipeline and served on the metadata endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_name: String,
    pub model_version: String,
    pub trained_at: DateTime<Utc>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}
