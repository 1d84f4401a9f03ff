//! Console plus per-run log file output.
//!
//! The subscriber is installed before the config file is read so that
//! loader warnings are not lost. Its filter sits behind a reload handle and
//! switches to the configured `log_level` once the config is known, unless
//! `--verbose` or `RUST_LOG` already chose one.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

pub(crate) const LOG_DIR: &str = "logs";

pub(crate) type FilterHandle = reload::Handle<EnvFilter, Registry>;

/// `{dir}/breakthrough_scraper_{YYYYMMDD_HHMMSS}.log`
pub(crate) fn log_file_path(dir: &Path, now: DateTime<Utc>) -> PathBuf {
    dir.join(format!(
        "breakthrough_scraper_{}.log",
        now.format("%Y%m%d_%H%M%S")
    ))
}

/// Filter used until the config file has been read.
pub(crate) fn startup_directive(verbose: bool, rust_log: Option<&str>) -> String {
    if verbose {
        return "debug".to_owned();
    }
    match rust_log {
        Some(directive) if !directive.trim().is_empty() => directive.to_owned(),
        _ => "info".to_owned(),
    }
}

/// Filter to switch to once the config is loaded, if any.
pub(crate) fn config_directive(
    verbose: bool,
    rust_log: Option<&str>,
    config_level: &str,
) -> Option<String> {
    let env_set = rust_log.is_some_and(|d| !d.trim().is_empty());
    (!verbose && !env_set).then(|| config_level.to_owned())
}

/// Installs the global subscriber: stdout plus a timestamped file under `dir`.
///
/// # Errors
///
/// Returns an error if the log directory or file cannot be created, or the
/// startup filter does not parse.
pub(crate) fn init(
    verbose: bool,
    dir: &Path,
    now: DateTime<Utc>,
) -> anyhow::Result<(FilterHandle, PathBuf)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    let path = log_file_path(dir, now);
    let file =
        File::create(&path).with_context(|| format!("failed to create {}", path.display()))?;

    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = EnvFilter::try_new(startup_directive(verbose, rust_log.as_deref()))
        .context("invalid RUST_LOG filter")?;
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .init();

    Ok((handle, path))
}

/// Switches to the config file's `log_level` when nothing overrides it.
///
/// # Errors
///
/// Returns an error if `level` is not a valid filter directive.
pub(crate) fn apply_config_level(
    handle: &FilterHandle,
    verbose: bool,
    level: &str,
) -> anyhow::Result<()> {
    let rust_log = std::env::var("RUST_LOG").ok();
    if let Some(directive) = config_directive(verbose, rust_log.as_deref(), level) {
        let filter = EnvFilter::try_new(&directive)
            .with_context(|| format!("invalid log_level '{directive}'"))?;
        handle
            .reload(filter)
            .context("failed to apply configured log level")?;
    }
    Ok(())
}
