// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::configurer::{Configurer, TomlConfigurer};
use crate::config::model::{FileWatchConfig, PLUGIN_NAME};
use crate::config::validate::{validate_config, ValidatedConfig};
use crate::errors::{Result, WatchpoolError};
use crate::fs::RealFileSystem;

/// Load a configuration file from a given path.
///
/// This only performs TOML parsing; it does **not** look at the
/// `[file_watch]` section. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<TomlConfigurer> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    TomlConfigurer::from_toml_str(&contents)
}

/// Load a configuration file and run the same validation `serve` runs.
///
/// Used by `--check`; the plugin itself goes through `Plugin::init` and
/// `Plugin::serve`.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ValidatedConfig> {
    let configurer = load_from_path(&path)?;
    if !configurer.has(PLUGIN_NAME) {
        return Err(WatchpoolError::Disabled(PLUGIN_NAME.to_string()));
    }
    let mut cfg: FileWatchConfig = configurer.unmarshal_key(PLUGIN_NAME)?;
    cfg.init_defaults();
    validate_config(cfg, &RealFileSystem)
}
