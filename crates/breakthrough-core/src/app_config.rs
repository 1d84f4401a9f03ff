//! Configuration model shared by the pipeline and the CLI.
//!
//! The on-disk shape mirrors `config/scraper_config.json`:
//!
//! ```json
//! {
//!   "weedmaps":   { "base_url": "https://weedmaps.com", "delay_range": [1, 3], "max_retries": 3, "timeout": 30 },
//!   "validation": { "allowed_categories": ["flower", "edible"] },
//!   "output":     { "format": "json", "directory": "data", "filename_template": "breakthrough_data_{timestamp}.json" }
//! }
//! ```
//!
//! Every field has a default, so a partial file (or no file at all) still
//! yields a usable configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

const DEFAULT_CATEGORIES: &[&str] = &[
    "flower",
    "pre-roll",
    "vape",
    "concentrate",
    "edible",
    "drink",
    "tincture",
    "topical",
    "cultivation",
    "gear",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(rename = "weedmaps")]
    pub scraper: ScraperConfig,
    pub validation: ValidationConfig,
    pub output: OutputConfig,
    pub log_level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scraper: ScraperConfig::default(),
            validation: ValidationConfig::default(),
            output: OutputConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Checks every section for values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scraper.validate()?;
        self.validation.validate()?;
        self.output.validate()
    }
}

/// Network and pagination settings for the catalog scraper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    /// Catalog origin, e.g. `"https://weedmaps.com"`.
    pub base_url: String,
    /// Inclusive `(min, max)` bounds in seconds for the randomized inter-request delay.
    pub delay_range: (f64, f64),
    /// Additional attempts after the first failure for transient errors.
    pub max_retries: u32,
    /// Per-attempt request timeout in seconds.
    pub timeout: f64,
    /// Base of the exponential retry backoff: `backoff_base_secs * 2^attempt`.
    pub backoff_base_secs: f64,
    /// Upper bound on a single backoff delay.
    pub backoff_cap_secs: f64,
    pub user_agent: String,
    /// Path appended to `base_url` for listing pages.
    pub listings_path: String,
    pub page_size: u32,
    /// JSON pointer to the array of listings in a page body.
    pub items_pointer: String,
    /// JSON pointer to the boolean "more pages" flag in a page body.
    pub has_next_pointer: String,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            base_url: "https://weedmaps.com".to_string(),
            delay_range: (1.0, 3.0),
            max_retries: 3,
            timeout: 30.0,
            backoff_base_secs: 1.0,
            backoff_cap_secs: 60.0,
            user_agent: "breakthrough-scraper/0.1 (catalog-research)".to_string(),
            listings_path: "/api/v1/listings".to_string(),
            page_size: 100,
            items_pointer: "/data/listings".to_string(),
            has_next_pointer: "/meta/has_next_page".to_string(),
        }
    }
}

impl ScraperConfig {
    /// Per-attempt timeout as a [`Duration`].
    #[must_use]
    pub fn timeout_duration(&self) -> Duration {
        secs_to_duration(self.timeout)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if any field is out of range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }

        let (min, max) = self.delay_range;
        if !min.is_finite() || !max.is_finite() || min < 0.0 {
            return Err(ConfigError::Validation(format!(
                "delay_range bounds must be finite and non-negative, got [{min}, {max}]"
            )));
        }
        if min > max {
            return Err(ConfigError::Validation(format!(
                "delay_range min ({min}) must not exceed max ({max})"
            )));
        }

        if !self.timeout.is_finite() || self.timeout <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "timeout must be a positive number of seconds, got {}",
                self.timeout
            )));
        }

        if !self.backoff_base_secs.is_finite() || self.backoff_base_secs < 0.0 {
            return Err(ConfigError::Validation(format!(
                "backoff_base_secs must be non-negative, got {}",
                self.backoff_base_secs
            )));
        }
        if !self.backoff_cap_secs.is_finite() || self.backoff_cap_secs < self.backoff_base_secs {
            return Err(ConfigError::Validation(format!(
                "backoff_cap_secs ({}) must be at least backoff_base_secs ({})",
                self.backoff_cap_secs, self.backoff_base_secs
            )));
        }

        for (field, secs) in [
            ("delay_range max", max),
            ("timeout", self.timeout),
            ("backoff_cap_secs", self.backoff_cap_secs),
        ] {
            if secs > MAX_SECS {
                return Err(ConfigError::Validation(format!(
                    "{field} must not exceed {MAX_SECS} seconds, got {secs}"
                )));
            }
        }

        if self.page_size == 0 {
            return Err(ConfigError::Validation(
                "page_size must be at least 1".to_string(),
            ));
        }

        for (field, pointer) in [
            ("items_pointer", &self.items_pointer),
            ("has_next_pointer", &self.has_next_pointer),
        ] {
            if !pointer.is_empty() && !pointer.starts_with('/') {
                return Err(ConfigError::Validation(format!(
                    "{field} must be a JSON pointer starting with '/', got '{pointer}'"
                )));
            }
        }

        Ok(())
    }
}

/// Record-level validation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Lowercase category names a record may carry.
    pub allowed_categories: Vec<String>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            allowed_categories: DEFAULT_CATEGORIES.iter().map(|c| (*c).to_string()).collect(),
        }
    }
}

impl ValidationConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] if the allow-list is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.allowed_categories.iter().all(|c| c.trim().is_empty()) {
            return Err(ConfigError::Validation(
                "validation.allowed_categories must list at least one category".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: String,
    pub directory: String,
    /// File name with a `{timestamp}` placeholder.
    pub filename_template: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
            directory: "data".to_string(),
            filename_template: "breakthrough_data_{timestamp}.json".to_string(),
        }
    }
}

impl OutputConfig {
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for unsupported formats or an
    /// empty file name template.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.format != "json" {
            return Err(ConfigError::Validation(format!(
                "output.format '{}' is not supported; only 'json' is",
                self.format
            )));
        }
        if self.filename_template.trim().is_empty() {
            return Err(ConfigError::Validation(
                "output.filename_template must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Upper bound for every seconds-valued setting: one day.
pub const MAX_SECS: f64 = 86_400.0;

/// Seconds to [`Duration`]. Negative and NaN inputs clamp to zero; values too
/// large for a `Duration` saturate to [`Duration::MAX`].
#[must_use]
pub fn secs_to_duration(secs: f64) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        AppConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_out_of_range_seconds() {
        for cfg in [
            ScraperConfig {
                timeout: 1e20,
                ..ScraperConfig::default()
            },
            ScraperConfig {
                backoff_cap_secs: 1e20,
                ..ScraperConfig::default()
            },
            ScraperConfig {
                delay_range: (0.0, MAX_SECS + 1.0),
                ..ScraperConfig::default()
            },
        ] {
            let err = cfg.validate().unwrap_err();
            assert!(err.to_string().contains("must not exceed 86400"), "got: {err}");
        }
    }

    #[test]
    fn secs_to_duration_saturates_instead_of_zeroing() {
        assert_eq!(secs_to_duration(1e20), Duration::MAX);
        assert_eq!(secs_to_duration(1.5), Duration::from_millis(1500));
        assert_eq!(secs_to_duration(-2.0), Duration::ZERO);
        assert_eq!(secs_to_duration(f64::NAN), Duration::ZERO);
    }

    #[test]
    fn rejects_inverted_delay_range() {
        let cfg = ScraperConfig {
            delay_range: (3.0, 1.0),
            ..ScraperConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("must not exceed"), "got: {err}");
    }

    #[test]
    fn rejects_negative_delay() {
        let cfg = ScraperConfig {
            delay_range: (-1.0, 1.0),
            ..ScraperConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_timeout() {
        let cfg = ScraperConfig {
            timeout: 0.0,
            ..ScraperConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("timeout"), "got: {err}");
    }

    #[test]
    fn rejects_non_http_base_url() {
        let cfg = ScraperConfig {
            base_url: "ftp://weedmaps.com".to_string(),
            ..ScraperConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_cap_below_base() {
        let cfg = ScraperConfig {
            backoff_base_secs: 10.0,
            backoff_cap_secs: 5.0,
            ..ScraperConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_category_allow_list() {
        let cfg = ValidationConfig {
            allowed_categories: vec![],
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_json_output_format() {
        let cfg = OutputConfig {
            format: "csv".to_string(),
            ..OutputConfig::default()
        };
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("csv"), "got: {err}");
    }

    #[test]
    fn deserializes_weedmaps_section_shape() {
        let raw = r#"{
            "weedmaps": {
                "base_url": "https://weedmaps.com",
                "delay_range": [1, 3],
                "max_retries": 3,
                "timeout": 30
            },
            "output": {
                "format": "json",
                "directory": "data",
                "filename_template": "breakthrough_data_{timestamp}.json"
            }
        }"#;
        let cfg: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(cfg.scraper.delay_range, (1.0, 3.0));
        assert_eq!(cfg.scraper.max_retries, 3);
        assert!((cfg.scraper.timeout - 30.0).abs() < f64::EPSILON);
        assert_eq!(cfg.scraper.listings_path, "/api/v1/listings");
        assert_eq!(cfg.validation, ValidationConfig::default());
        assert_eq!(cfg.log_level, "info");
    }
}
