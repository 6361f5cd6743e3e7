pub mod dataset;
pub mod source;
