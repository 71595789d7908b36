//! Arena configuration
//!
//! Loaded once per process (from TOML, the environment, or defaults) and read
//! by every thread when its `Context` is first constructed.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

static CONFIG: OnceCell<Config> = OnceCell::new();

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Payload size of a `Pool` block when none is given
    #[serde(default = "default_pool_block_size")]
    pub pool_block_size: usize,

    /// Block size of each thread's temporary storage pool
    #[serde(default = "default_temporary_storage_block_size")]
    pub temporary_storage_block_size: usize,

    /// First capacity a `List` grows to
    #[serde(default = "default_list_capacity")]
    pub list_capacity: usize,

    /// Overwrite retained pool blocks on reset
    #[serde(default = "default_poison_on_reset")]
    pub poison_on_reset: bool,

    #[serde(default = "default_poison_byte")]
    pub poison_byte: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_block_size: default_pool_block_size(),
            temporary_storage_block_size: default_temporary_storage_block_size(),
            list_capacity: default_list_capacity(),
            poison_on_reset: default_poison_on_reset(),
            poison_byte: default_poison_byte(),
        }
    }
}

fn default_pool_block_size() -> usize { 4096 }
fn default_temporary_storage_block_size() -> usize { 32 * 1024 }
fn default_list_capacity() -> usize { 256 }
fn default_poison_on_reset() -> bool { cfg!(debug_assertions) }
fn default_poison_byte() -> u8 { 0xCD }

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, String> {
        let content = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config: {}", e))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self, String> {
        let config: Self = toml::from_str(content)
            .map_err(|e| format!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `NCZ_POOL_BLOCK_SIZE`, `NCZ_TEMP_BLOCK_SIZE`
    /// and `NCZ_POISON`
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(size) = env_usize("NCZ_POOL_BLOCK_SIZE") {
            config.pool_block_size = size;
        }

        if let Some(size) = env_usize("NCZ_TEMP_BLOCK_SIZE") {
            config.temporary_storage_block_size = size;
        }

        if let Ok(val) = std::env::var("NCZ_POISON") {
            config.poison_on_reset = val == "1" || val.to_lowercase() == "true";
        }

        config
    }

    fn validate(&self) -> Result<(), String> {
        if self.pool_block_size == 0 {
            return Err("pool_block_size must be greater than zero".to_string());
        }
        if self.temporary_storage_block_size == 0 {
            return Err("temporary_storage_block_size must be greater than zero".to_string());
        }
        if self.list_capacity == 0 {
            return Err("list_capacity must be greater than zero".to_string());
        }
        Ok(())
    }
}

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok()?.parse().ok().filter(|&n| n > 0)
}

/// Install the process-wide configuration.
///
/// Returns `false` if a configuration was already installed (or already read
/// by a `Context`); the first one wins.
pub fn install(config: Config) -> bool {
    CONFIG.set(config).is_ok()
}

/// The installed configuration, falling back to `Config::from_env()`
pub fn current() -> &'static Config {
    CONFIG.get_or_init(Config::from_env)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_documented_constants() {
        let config = Config::default();
        assert_eq!(config.pool_block_size, 4096);
        assert_eq!(config.temporary_storage_block_size, 32 * 1024);
        assert_eq!(config.list_capacity, 256);
        assert_eq!(config.poison_byte, 0xCD);
    }

    #[test]
    fn parse_partial_toml_keeps_defaults() {
        let config = Config::parse("pool_block_size = 128\npoison_on_reset = false\n").unwrap();
        assert_eq!(config.pool_block_size, 128);
        assert!(!config.poison_on_reset);
        assert_eq!(config.list_capacity, 256);
    }

    #[test]
    fn parse_rejects_zero_block_size() {
        let err = Config::parse("pool_block_size = 0").unwrap_err();
        assert!(err.contains("pool_block_size"));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "temporary_storage_block_size = 1024").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.temporary_storage_block_size, 1024);
    }

    #[test]
    fn load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(&dir.path().join("ncz.toml")).unwrap_err();
        assert!(err.starts_with("Failed to read config"));
    }
}
