//! Configuration for hwlab-emu.
//!
//! Configuration is loaded from multiple sources in priority order:
//! 1. Environment variables (`HWLAB_MEMORY_BYTES`, `HWLAB_MAX_CYCLES`, `HWLAB_HEXDUMP_BYTES`)
//! 2. Project-local config file (`./hwlab.toml`)
//! 3. User config file (`~/.config/hwlab/config.toml`)
//! 4. Built-in defaults
//!
//! # Config File Format
//!
//! ```toml
//! # hwlab.toml
//!
//! # Data memory size in bytes (multiple of 4)
//! memory_bytes = 2048
//!
//! # Instruction budget for `run`
//! max_cycles = 10000
//!
//! # Bytes shown by the hex dump after a run
//! hexdump_bytes = 32
//! ```

use crate::cpu::memory::DEFAULT_CAPACITY;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Global cached configuration.
static CONFIG: OnceLock<Config> = OnceLock::new();

pub const DEFAULT_MAX_CYCLES: u64 = 10_000;
pub const DEFAULT_HEXDUMP_BYTES: usize = 32;

/// hwlab-emu configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Data memory size in bytes.
    pub memory_bytes: Option<usize>,

    /// Instruction budget for a run.
    pub max_cycles: Option<u64>,

    /// How much memory the post-run hex dump shows.
    pub hexdump_bytes: Option<usize>,
}

impl Config {
    /// Load configuration from all sources.
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(user_config) = Self::load_user_config() {
            config.merge(user_config);
        }

        if let Some(local_config) = Self::load_from_file(Path::new("hwlab.toml")) {
            config.merge(local_config);
        }

        config.apply_env_overrides();

        config
    }

    /// Get the cached global configuration.
    ///
    /// Loads configuration on first call and caches it.
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(|| {
            let config = Self::load();
            log::debug!("Loaded configuration: {:?}", config);
            config
        })
    }

    pub fn memory_bytes(&self) -> usize {
        self.memory_bytes.unwrap_or(DEFAULT_CAPACITY)
    }

    pub fn max_cycles(&self) -> u64 {
        self.max_cycles.unwrap_or(DEFAULT_MAX_CYCLES)
    }

    pub fn hexdump_bytes(&self) -> usize {
        self.hexdump_bytes.unwrap_or(DEFAULT_HEXDUMP_BYTES)
    }

    /// Load user configuration from ~/.config/hwlab/config.toml
    fn load_user_config() -> Option<Self> {
        let path = Self::user_config_path()?;
        Self::load_from_file(&path)
    }

    /// Load configuration from a specific file.
    fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Merge another config into this one.
    /// Only overrides fields that are Some in the other config.
    fn merge(&mut self, other: Self) {
        if other.memory_bytes.is_some() {
            self.memory_bytes = other.memory_bytes;
        }
        if other.max_cycles.is_some() {
            self.max_cycles = other.max_cycles;
        }
        if other.hexdump_bytes.is_some() {
            self.hexdump_bytes = other.hexdump_bytes;
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Some(bytes) = env_number("HWLAB_MEMORY_BYTES") {
            self.memory_bytes = Some(bytes);
        }
        if let Some(cycles) = env_number("HWLAB_MAX_CYCLES") {
            self.max_cycles = Some(cycles);
        }
        if let Some(bytes) = env_number("HWLAB_HEXDUMP_BYTES") {
            self.hexdump_bytes = Some(bytes);
        }
    }

    /// Get the path to the user config file (for display/creation).
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("hwlab").join("config.toml"))
    }

    /// Generate a sample config file content.
    pub fn sample_config() -> String {
        format!(
            r#"# hwlab-emu configuration
# Place this file at ~/.config/hwlab/config.toml or ./hwlab.toml

# Data memory size in bytes (multiple of 4, at least 8)
memory_bytes = {}

# Instruction budget for `run`
max_cycles = {}

# Bytes shown by the hex dump after a run
hexdump_bytes = {}
"#,
            DEFAULT_CAPACITY, DEFAULT_MAX_CYCLES, DEFAULT_HEXDUMP_BYTES
        )
    }
}

/// Parse a numeric environment variable, warning on garbage.
fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => {
            log::info!("Using {} from environment: {}", name, raw);
            Some(value)
        }
        Err(_) => {
            log::warn!("Ignoring {}: '{}' is not a number", name, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.memory_bytes(), 2048);
        assert_eq!(config.max_cycles(), DEFAULT_MAX_CYCLES);
        assert_eq!(config.hexdump_bytes(), DEFAULT_HEXDUMP_BYTES);
    }

    #[test]
    fn test_merge() {
        let mut base = Config {
            memory_bytes: Some(1024),
            max_cycles: Some(5),
            hexdump_bytes: None,
        };
        base.merge(Config {
            memory_bytes: None,
            max_cycles: Some(99),
            hexdump_bytes: Some(64),
        });

        assert_eq!(base.memory_bytes, Some(1024));
        assert_eq!(base.max_cycles, Some(99));
        assert_eq!(base.hexdump_bytes, Some(64));
    }

    #[test]
    fn test_partial_file() {
        let config: Config = toml::from_str("max_cycles = 7").unwrap();
        assert_eq!(config.max_cycles(), 7);
        assert_eq!(config.memory_bytes, None);
    }

    #[test]
    fn test_sample_config_parses() {
        let config: Config = toml::from_str(&Config::sample_config()).expect("Sample config should parse");
        assert_eq!(config.memory_bytes(), DEFAULT_CAPACITY);
        assert_eq!(config.max_cycles(), DEFAULT_MAX_CYCLES);
    }
}
