// src/config/configurer.rs

use serde::de::DeserializeOwned;
use toml::{Table, Value};

use crate::errors::{Result, WatchpoolError};

/// Read access to the host configuration.
///
/// Keys may be dotted (`"file_watch.pool"`) to address nested sections.
pub trait Configurer {
    /// Whether a section or value exists under `key`.
    fn has(&self, key: &str) -> bool;

    /// Deserialize the value stored under `key`.
    fn unmarshal_key<T: DeserializeOwned>(&self, key: &str) -> Result<T>;
}

/// `Configurer` backed by a parsed TOML document.
#[derive(Debug, Clone, Default)]
pub struct TomlConfigurer {
    root: Table,
}

impl TomlConfigurer {
    pub fn new(root: Table) -> Self {
        Self { root }
    }

    /// Parse a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let root: Table = toml::from_str(contents)?;
        Ok(Self::new(root))
    }

    fn lookup(&self, key: &str) -> Option<&Value> {
        let mut parts = key.split('.');
        let first = parts.next()?;
        let mut current = self.root.get(first)?;
        for part in parts {
            current = current.as_table()?.get(part)?;
        }
        Some(current)
    }
}

impl Configurer for TomlConfigurer {
    fn has(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    fn unmarshal_key<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .lookup(key)
            .cloned()
            .ok_or_else(|| WatchpoolError::ConfigError(format!("missing key '{key}'")))?;
        Ok(value.try_into()?)
    }
}
