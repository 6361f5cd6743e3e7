use crate::domain::record::CategoricalField;
use std::fmt;

/// Request-time resolution failures. Client-correctable: the API maps these
/// to a bad-request response, never to a crashed process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// A required categorical field was absent or blank in the request.
    MissingField(CategoricalField),

    /// No grouping matched, down to the commodity-only backstop. The
    /// commodity was never seen in the build dataset.
    NoMatch { commodity: String },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::MissingField(field) => {
                write!(f, "missing required field: {field}")
            }
            ResolveError::NoMatch { commodity } => {
                write!(f, "no historical feature group for commodity '{commodity}'")
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// Build-time data-quality faults. Fatal to the build; a partially built
/// index is never persisted or served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    EmptyDataset,
    MissingColumn { column: String },
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::EmptyDataset => write!(f, "historical dataset is empty"),
            BuildError::MissingColumn { column } => {
                write!(f, "required column '{column}' is missing from the dataset")
            }
        }
    }
}

impl std::error::Error for BuildError {}
