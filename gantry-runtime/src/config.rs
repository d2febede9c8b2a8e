//! Bridge configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::BridgeError;

/// Configuration for opening a [`Bridge`](crate::Bridge).
///
/// Usually embedded by the generated bindings; the TOML form exists for
/// hosts that pick the library at deploy time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Path to the native library (`.so` / `.dylib` / `.dll`).
    pub library_path: PathBuf,
    /// Prefix of every symbol the library exports for this contract.
    pub symbol_prefix: String,
}

impl BridgeConfig {
    /// Create a config from a library path and symbol prefix.
    pub fn new(library_path: impl Into<PathBuf>, symbol_prefix: impl Into<String>) -> Self {
        Self {
            library_path: library_path.into(),
            symbol_prefix: symbol_prefix.into(),
        }
    }

    /// Load a config from a TOML file.
    pub fn load(path: &Path) -> Result<Self, BridgeError> {
        let contents = std::fs::read_to_string(path).map_err(|source| BridgeError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            toml::from_str(&contents).map_err(|source| BridgeError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// The prefix becomes part of every resolved symbol name, so it must be
    /// non-empty and symbol-safe (ASCII alphanumerics and underscores, not
    /// starting with a digit).
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.library_path.as_os_str().is_empty() {
            return Err(BridgeError::InvalidConfig(
                "library_path must not be empty".to_string(),
            ));
        }
        if self.symbol_prefix.is_empty() {
            return Err(BridgeError::InvalidConfig(
                "symbol_prefix must not be empty".to_string(),
            ));
        }
        let mut chars = self.symbol_prefix.chars();
        let first_ok = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !first_ok
            || !self
                .symbol_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(BridgeError::InvalidConfig(format!(
                "symbol_prefix {:?} is not a valid symbol fragment",
                self.symbol_prefix
            )));
        }
        Ok(())
    }
}
