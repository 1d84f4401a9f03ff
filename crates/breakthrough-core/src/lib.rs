pub mod app_config;
pub mod config;
pub mod records;

use thiserror::Error;

pub use app_config::{
    secs_to_duration, AppConfig, OutputConfig, ScraperConfig, ValidationConfig, MAX_SECS,
};
pub use config::{load_app_config, load_app_config_with, DEFAULT_CONFIG_PATH};
pub use records::{
    CanonicalRecord, RunOutcome, RunSummary, ScrapeRequest, ValidatedRecord, ValidationResult,
    ValidationStatus,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("invalid configuration: {0}")]
    Validation(String),
}
