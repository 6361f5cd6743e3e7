use crate::domain::record::CategoricalField;
use serde::{Deserialize, Serialize};

/// One granularity of historical grouping. Declaration order is the ladder
/// order (most to least specific); `Ord` relies on it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SpecificityLevel {
    /// state + district + market + commodity + variety + grade
    Full,
    /// state + district + market + commodity + variety
    MarketVariety,
    /// state + district + market + commodity
    MarketCommodity,
    /// state + commodity
    StateCommodity,
    /// commodity alone. The backstop: matches any commodity seen during the
    /// build.
    CommodityOnly,
}

/// The fixed fallback sequence. A system-wide constant, never derived from
/// data and never reordered; resolution walks it top to bottom and the index
/// is built for every entry.
pub const FALLBACK_LADDER: [SpecificityLevel; 5] = [
    SpecificityLevel::Full,
    SpecificityLevel::MarketVariety,
    SpecificityLevel::MarketCommodity,
    SpecificityLevel::StateCommodity,
    SpecificityLevel::CommodityOnly,
];

impl SpecificityLevel {
    pub fn fields(&self) -> &'static [CategoricalField] {
        match self {
            SpecificityLevel::Full => &[
                CategoricalField::State,
                CategoricalField::District,
                CategoricalField::Market,
                CategoricalField::Commodity,
                CategoricalField::Variety,
                CategoricalField::Grade,
            ],
            SpecificityLevel::MarketVariety => &[
                CategoricalField::State,
                CategoricalField::District,
                CategoricalField::Market,
                CategoricalField::Commodity,
                CategoricalField::Variety,
            ],
            SpecificityLevel::MarketCommodity => &[
                CategoricalField::State,
                CategoricalField::District,
                CategoricalField::Market,
                CategoricalField::Commodity,
            ],
            SpecificityLevel::StateCommodity => {
                &[CategoricalField::State, CategoricalField::Commodity]
            }
            SpecificityLevel::CommodityOnly => &[CategoricalField::Commodity],
        }
    }

    /// Marker reported to callers for observability, e.g.
    /// "state+district+market+commodity+variety+grade" or "commodity".
    pub fn label(&self) -> String {
        self.fields()
            .iter()
            .map(|field| field.as_str())
            .collect::<Vec<_>>()
            .join("+")
    }
}
