pub mod artifacts;

pub const FEATURE_INDEX_FILE: &str = "feature_index.json";
pub const INPUT_SCHEMA_FILE: &str = "input_schema.json";
pub const PRICE_MODEL_FILE: &str = "price_model.json";
pub const MODEL_METADATA_FILE: &str = "model_metadata.json";
