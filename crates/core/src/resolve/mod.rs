pub mod error;
pub mod index;
pub mod ladder;

pub use error::{BuildError, ResolveError};
pub use index::{FeatureIndex, IndexKey, Resolution};
pub use ladder::{SpecificityLevel, FALLBACK_LADDER};
