// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

use crate::pool::PoolError;

#[derive(Error, Debug)]
pub enum WatchpoolError {
    /// The `[file_watch]` section is absent. Hosts treat this as "plugin
    /// disabled" rather than as a failure.
    #[error("plugin disabled: no [{0}] section in configuration")]
    Disabled(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("invalid pattern: {0}")]
    PatternError(#[from] regex::Error),

    #[error("file watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error("worker pool error: {0}")]
    PoolError(#[from] PoolError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl WatchpoolError {
    /// True for the "section absent" signal returned by `Plugin::init`.
    pub fn is_disabled(&self) -> bool {
        matches!(self, WatchpoolError::Disabled(_))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, WatchpoolError>;
