use crate::domain::record::CategoricalField;
use crate::resolve::error::ResolveError;
use chrono::NaiveDate;
use serde::Deserialize;

/// Raw prediction input as received from the caller. Every field is optional
/// so an absent one can be reported by name instead of failing wholesale at
/// deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PredictionRequest {
    pub state: Option<String>,
    pub district: Option<String>,
    pub market: Option<String>,
    pub commodity: Option<String>,
    pub variety: Option<String>,
    pub grade: Option<String>,

    /// Accepted for compatibility with the request form; resolution itself is
    /// date-free (nearest-date selection happened offline when group
    /// representatives were chosen).
    pub date: Option<NaiveDate>,
}

/// A fully specified categorical lookup key. Constructing one performs the
/// required-field check, so resolution never probes with a partial key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoricalQuery {
    pub state: String,
    pub district: String,
    pub market: String,
    pub commodity: String,
    pub variety: String,
    pub grade: String,
}

impl CategoricalQuery {
    /// Fails with the first absent (or blank) field in canonical order.
    pub fn try_new(request: &PredictionRequest) -> Result<Self, ResolveError> {
        Ok(Self {
            state: required(CategoricalField::State, &request.state)?,
            district: required(CategoricalField::District, &request.district)?,
            market: required(CategoricalField::Market, &request.market)?,
            commodity: required(CategoricalField::Commodity, &request.commodity)?,
            variety: required(CategoricalField::Variety, &request.variety)?,
            grade: required(CategoricalField::Grade, &request.grade)?,
        })
    }

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

fn required(field: CategoricalField, value: &Option<String>) -> Result<String, ResolveError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(ResolveError::MissingField(field)),
    }
}
