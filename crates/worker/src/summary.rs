use agripredict_core::resolve::index::FeatureIndex;
use agripredict_core::resolve::ladder::{SpecificityLevel, FALLBACK_LADDER};

/// Per-level entry counts, logged after a build so fallback coverage is
/// visible in worker output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSummary {
    pub counts: Vec<(SpecificityLevel, usize)>,
}

impl IndexSummary {
    pub fn new(index: &FeatureIndex) -> Self {
        Self {
            counts: FALLBACK_LADDER
                .iter()
                .map(|level| (*level, index.level_len(*level)))
                .collect(),
        }
    }

    pub fn count(&self, level: SpecificityLevel) -> usize {
        self.counts
            .iter()
            .find(|(l, _)| *l == level)
            .map(|(_, count)| *count)
            .unwrap_or(0)
    }
}
