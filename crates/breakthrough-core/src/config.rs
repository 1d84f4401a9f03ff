use std::path::Path;

use crate::app_config::AppConfig;
use crate::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "config/scraper_config.json";

/// Load application configuration from `path`, then apply environment overrides.
///
/// Reads the process environment as it stands; the binary loads `.env`
/// before calling this. A missing config file is not an error: defaults are used and a warning is logged.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read or parsed, an override is
/// malformed, or the resulting configuration fails validation.
pub fn load_app_config(path: &Path) -> Result<AppConfig, ConfigError> {
    load_app_config_with(path, |key| std::env::var(key))
}

/// Load application configuration using the provided env-var lookup function.
///
/// Tests drive overrides from a plain `HashMap` through `lookup`.
///
/// # Errors
///
/// See [`load_app_config`].
pub fn load_app_config_with<F>(path: &Path, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let config = read_config_file(path)?;
    let config = apply_env_overrides(config, lookup)?;
    config.validate()?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(
                path = %path.display(),
                "config file not found; using default settings"
            );
            return Ok(AppConfig::default());
        }
        Err(e) => {
            return Err(ConfigError::Io {
                path: path.display().to_string(),
                source: e,
            })
        }
    };

    serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        source: e,
    })
}

/// Overlay `BREAKTHROUGH_*` environment variables on top of the file config.
fn apply_env_overrides<F>(mut config: AppConfig, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    if let Ok(base_url) = lookup("BREAKTHROUGH_BASE_URL") {
        config.scraper.base_url = base_url;
    }

    if let Ok(raw) = lookup("BREAKTHROUGH_MAX_RETRIES") {
        config.scraper.max_retries = raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: "BREAKTHROUGH_MAX_RETRIES".to_string(),
            reason: e.to_string(),
        })?;
    }

    if let Ok(raw) = lookup("BREAKTHROUGH_TIMEOUT_SECS") {
        config.scraper.timeout = raw.parse::<f64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: "BREAKTHROUGH_TIMEOUT_SECS".to_string(),
            reason: e.to_string(),
        })?;
    }

    if let Ok(level) = lookup("BREAKTHROUGH_LOG_LEVEL") {
        config.log_level = level;
    }

    Ok(config)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
