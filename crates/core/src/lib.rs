pub mod domain;
pub mod ingest;
pub mod model;
pub mod resolve;
pub mod schema;
pub mod storage;

pub mod config {
    use anyhow::Context;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub artifact_dir: Option<String>,
        pub dataset_base_url: Option<String>,
        pub dataset_api_key: Option<String>,
        pub cors_allowed_origins: Option<String>,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Ok(Self {
                artifact_dir: std::env::var("ARTIFACT_DIR").ok(),
                dataset_base_url: std::env::var("DATASET_BASE_URL").ok(),
                dataset_api_key: std::env::var("DATASET_API_KEY").ok(),
                cors_allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_dataset_base_url(&self) -> anyhow::Result<&str> {
            self.dataset_base_url
                .as_deref()
                .context("DATASET_BASE_URL is required")
        }

        /// Directory holding the build artifacts (feature index, input
        /// schema, price model, model metadata).
        pub fn artifact_dir(&self) -> &str {
            self.artifact_dir.as_deref().unwrap_or("models")
        }
    }
}
