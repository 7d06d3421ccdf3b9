//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::SimConfig;
use std::path::Path;

/// File name looked up by [`load_config`].
pub const CONFIG_FILE_NAME: &str = "satasim.toml";

/// Loads and validates a `satasim.toml` configuration from a directory.
///
/// Image paths in the file are resolved against `dir`.
pub fn load_config(dir: &Path) -> Result<SimConfig, ConfigError> {
    let content = std::fs::read_to_string(dir.join(CONFIG_FILE_NAME))?;
    let mut config = load_config_from_str(&content)?;
    config.resolve_paths(dir);
    Ok(config)
}

/// Parses and validates a `satasim.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<SimConfig, ConfigError> {
    let config: SimConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &SimConfig) -> Result<(), ConfigError> {
    if config.link.align_count == 0 {
        return Err(invalid("link.align_count must be at least 1"));
    }
    if config.memory.delay == 0 {
        return Err(invalid("memory.delay must be at least 1"));
    }
    let w = config.memory.words_per_beat;
    if !(1..=16).contains(&w) || !w.is_power_of_two() {
        return Err(ConfigError::ValidationError(format!(
            "memory.words_per_beat must be a power of two between 1 and 16, got {w}"
        )));
    }
    if config.memory.words == 0 {
        return Err(invalid("memory.words must be at least 1"));
    }
    if config.disk.sectors == 0 {
        return Err(invalid("disk.sectors must be at least 1"));
    }
    Ok(())
}

fn invalid(msg: &str) -> ConfigError {
    ConfigError::ValidationError(msg.to_string())
}
