//! Runtime configuration (§6.3, AMBIENT): where the compiled-module
//! cache keeps its artifacts and how big it's allowed to grow, loaded from
//! a TOML file the same way the rest of the ambient stack (`tracing`,
//! `clap`) is configured.
//!
//! Unknown keys are a hard error rather than silently ignored — a typo in
//! a config file should fail loudly, not degrade to defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use vectorize_core::{Status, VResult};

fn default_cache_capacity() -> usize {
    64
}

/// Runtime configuration, also a component of the cache key (§4.10): two
/// `Projector::make` calls with different configs never share a cache
/// entry, since a different `bytecode_path`/`cache_capacity` can change
/// what gets compiled or how long it's kept.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory generated `.ll`/`.so` artifacts are written under. `None`
    /// uses the system temp directory.
    #[serde(default)]
    pub bytecode_path: Option<PathBuf>,

    /// Maximum number of compiled expressions the cache (§4.10) holds
    /// before evicting the least recently used entry.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bytecode_path: None,
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl Config {
    /// Parses a TOML config file. Rejects unrecognised keys instead of
    /// ignoring them (`#[serde(deny_unknown_fields)]`).
    pub fn from_toml_file(path: &Path) -> VResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Status::invalid(format!("failed to read config file {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> VResult<Self> {
        toml::from_str(text).map_err(|e| Status::invalid(format!("invalid config: {e}")))
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.bytecode_path
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_temp_dir_and_capacity_64() {
        let config = Config::default();
        assert_eq!(config.cache_capacity, 64);
        assert!(config.bytecode_path.is_none());
    }

    #[test]
    fn parses_a_minimal_toml_document() {
        let config = Config::from_toml_str("cache_capacity = 128\n").unwrap();
        assert_eq!(config.cache_capacity, 128);
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = Config::from_toml_str("cache_capacity = 1\ntypo_field = true\n").unwrap_err();
        assert!(err.message().contains("unknown field") || err.message().contains("invalid config"));
    }

    #[test]
    fn two_configs_with_different_capacity_are_not_equal() {
        let a = Config {
            cache_capacity: 8,
            ..Config::default()
        };
        let b = Config {
            cache_capacity: 16,
            ..Config::default()
        };
        assert_ne!(a, b);
    }
}
