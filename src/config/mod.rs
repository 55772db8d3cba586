// src/config/mod.rs

//! Configuration loading and validation for watchpool.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Expose the host `Configurer` capability over a parsed file (`configurer.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate the watched directory, pattern and timings (`validate.rs`).

pub mod configurer;
pub mod loader;
pub mod model;
pub mod validate;

pub use configurer::{Configurer, TomlConfigurer};
pub use loader::{load_and_validate, load_from_path};
pub use model::{FileWatchConfig, PoolConfig, PLUGIN_NAME};
pub use validate::{validate_config, ValidatedConfig};
