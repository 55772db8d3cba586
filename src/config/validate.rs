// src/config/validate.rs

use std::path::{Path, PathBuf};

use crate::config::model::FileWatchConfig;
use crate::errors::{Result, WatchpoolError};
use crate::fs::FileSystem;
use crate::watch::filter::EventFilter;

/// Configuration that passed validation, with the filter already compiled.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    pub config: FileWatchConfig,
    /// Canonical form of `config.dir`.
    pub root: PathBuf,
    pub filter: EventFilter,
}

/// Check everything `serve` needs before any watcher or pool is created.
pub fn validate_config(cfg: FileWatchConfig, fs: &dyn FileSystem) -> Result<ValidatedConfig> {
    let root = validate_dir(&cfg.dir, fs)?;
    let filter = EventFilter::new(&cfg.regexp, cfg.match_target)?;
    validate_timings(&cfg)?;

    Ok(ValidatedConfig {
        config: cfg,
        root,
        filter,
    })
}

fn validate_dir(dir: &str, fs: &dyn FileSystem) -> Result<PathBuf> {
    if dir.is_empty() {
        return Err(WatchpoolError::ConfigError("dir is required".to_string()));
    }

    let path = Path::new(dir);
    if !fs.exists(path) {
        return Err(WatchpoolError::ConfigError(format!(
            "dir does not exist: {dir}"
        )));
    }
    if !fs.is_dir(path) {
        return Err(WatchpoolError::ConfigError(format!(
            "dir is not a directory: {dir}"
        )));
    }

    Ok(fs.canonicalize(path)?)
}

fn validate_timings(cfg: &FileWatchConfig) -> Result<()> {
    if cfg.job_timeout.is_zero() {
        return Err(WatchpoolError::ConfigError(
            "job_timeout must be greater than zero".to_string(),
        ));
    }
    if cfg.poll_interval.is_zero() {
        return Err(WatchpoolError::ConfigError(
            "poll_interval must be greater than zero".to_string(),
        ));
    }
    if cfg.max_concurrency == 0 {
        return Err(WatchpoolError::ConfigError(
            "max_concurrency must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.queue_length == 0 {
        return Err(WatchpoolError::ConfigError(
            "queue_length must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}
