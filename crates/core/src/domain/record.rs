use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The six categorical dimensions of a market observation, in canonical
/// order. Required-field checks and specificity levels both index into this
/// ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoricalField {
    State,
    District,
    Market,
    Commodity,
    Variety,
    Grade,
}

impl CategoricalField {
    pub const ALL: [CategoricalField; 6] = [
        CategoricalField::State,
        CategoricalField::District,
        CategoricalField::Market,
        CategoricalField::Commodity,
        CategoricalField::Variety,
        CategoricalField::Grade,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoricalField::State => "state",
            CategoricalField::District => "district",
            CategoricalField::Market => "market",
            CategoricalField::Commodity => "commodity",
            CategoricalField::Variety => "variety",
            CategoricalField::Grade => "grade",
        }
    }
}

impl fmt::Display for CategoricalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the processed historical dataset. Owned by the index builder;
/// never mutated after parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub state: String,
    pub district: String,
    pub market: String,
    pub commodity: String,
    pub variety: String,
    pub grade: String,
    pub date: NaiveDate,
    pub features: FeatureVector,
}

impl HistoricalRecord {
    pub fn field(&self, field: CategoricalField) -> &str {
        match field {
            CategoricalField::State => &self.state,
            CategoricalField::District => &self.district,
            CategoricalField::Market => &self.market,
            CategoricalField::Commodity => &self.commodity,
            CategoricalField::Variety => &self.variety,
            CategoricalField::Grade => &self.grade,
        }
    }
}

/// The fixed numeric feature set carried by every historical record and fed
/// to the price model. The column set is closed; `month` and `week` are
/// integral, everything else is a float.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub price_spread: f64,
    pub price_spread_ratio: f64,
    pub modal_to_min_ratio: f64,
    pub modal_to_max_ratio: f64,
    pub commodity_price_zscore: f64,
    pub market_avg_price: f64,
    pub state_avg_price: f64,
    pub market_price_deviation: f64,
    pub lag_1: f64,
    pub lag_7: f64,
    pub pct_change_7: f64,
    pub month: u32,
    pub week: u32,
    pub month_sin: f64,
    pub month_cos: f64,
}

impl FeatureVector {
    pub const COLUMNS: [&'static str; 15] = [
        "price_spread",
        "price_spread_ratio",
        "modal_to_min_ratio",
        "modal_to_max_ratio",
        "commodity_price_zscore",
        "market_avg_price",
        "state_avg_price",
        "market_price_deviation",
        "lag_1",
        "lag_7",
        "pct_change_7",
        "month",
        "week",
        "month_sin",
        "month_cos",
    ];

    pub fn value(&self, column: &str) -> Option<f64> {
        let v = match column {
            "price_spread" => self.price_spread,
            "price_spread_ratio" => self.price_spread_ratio,
            "modal_to_min_ratio" => self.modal_to_min_ratio,
            "modal_to_max_ratio" => self.modal_to_max_ratio,
            "commodity_price_zscore" => self.commodity_price_zscore,
            "market_avg_price" => self.market_avg_price,
            "state_avg_price" => self.state_avg_price,
            "market_price_deviation" => self.market_price_deviation,
            "lag_1" => self.lag_1,
            "lag_7" => self.lag_7,
            "pct_change_7" => self.pct_change_7,
            "month" => f64::from(self.month),
            "week" => f64::from(self.week),
            "month_sin" => self.month_sin,
            "month_cos" => self.month_cos,
            _ => return None,
        };
        Some(v)
    }

    /// Assemble a model input row in the model's declared column order.
    pub fn model_row(&self, columns: &[String]) -> anyhow::Result<Vec<f64>> {
        columns
            .iter()
            .map(|column| {
                self.value(column)
                    .with_context(|| format!("unknown feature column '{column}'"))
            })
            .collect()
    }
}
