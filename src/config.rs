//! Configuration types for the tracker
//!
//! These types define the structure of the tracker configuration loaded from
//! a TOML file. Every field has a default, so an empty file is valid.
//!
//! ```toml
//! offset_table_path = "data/EventFlags/eventflag_bst.txt"
//! poll_interval_secs = 5
//! location_order = ["Limgrave", "Stormveil Castle"]
//!
//! [flags]
//! block_divisor = 1000
//! block_multiplier = 125
//!
//! [container]
//! header_size = 0x310
//! slot_size = 0x280090
//!
//! [character]
//! record_offset = 0x1C0000
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flags::{BLOCK_DIVISOR, BLOCK_MULTIPLIER};
use crate::save::{CharacterLayout, ContainerLayout};

fn default_offset_table_path() -> PathBuf {
    PathBuf::from("data/EventFlags/eventflag_bst.txt")
}
fn default_poll_interval_secs() -> u64 { 5 }
fn default_block_divisor() -> u32 { BLOCK_DIVISOR }
fn default_block_multiplier() -> u32 { BLOCK_MULTIPLIER }

/// Top-level tracker configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Path of the block id -> block offset table
    #[serde(default = "default_offset_table_path")]
    pub offset_table_path: PathBuf,

    /// Seconds between polls for the watch loop
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Preferred display order of boss locations; unlisted ones follow
    #[serde(default)]
    pub location_order: Vec<String>,

    #[serde(default)]
    pub flags: FlagGeometry,

    #[serde(default)]
    pub container: ContainerLayout,

    #[serde(default)]
    pub character: CharacterLayout,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            offset_table_path: default_offset_table_path(),
            poll_interval_secs: default_poll_interval_secs(),
            location_order: Vec::new(),
            flags: FlagGeometry::default(),
            container: ContainerLayout::default(),
            character: CharacterLayout::default(),
        }
    }
}

/// Block geometry of the event flag region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagGeometry {
    /// Flags per block
    #[serde(default = "default_block_divisor")]
    pub block_divisor: u32,
    /// Bytes per block offset unit
    #[serde(default = "default_block_multiplier")]
    pub block_multiplier: u32,
}

impl Default for FlagGeometry {
    fn default() -> Self {
        Self {
            block_divisor: BLOCK_DIVISOR,
            block_multiplier: BLOCK_MULTIPLIER,
        }
    }
}

// =============================================================================
// LOADING FUNCTIONS
// =============================================================================

impl TrackerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_toml(&content)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that would make every query fail
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flags.block_divisor == 0 {
            return Err(ConfigError::Invalid("flags.block_divisor must be non-zero".to_string()));
        }
        if self.flags.block_multiplier == 0 {
            return Err(ConfigError::Invalid("flags.block_multiplier must be non-zero".to_string()));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid("poll_interval_secs must be non-zero".to_string()));
        }
        self.container
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.character
            .validate(&self.container)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Parse error: {0}")]
    ParseError(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::save::layout::{FLAG_REGION_MAX_SIZE, HEADER_SIZE, SLOT_COUNT, SLOT_SIZE};

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = TrackerConfig::from_toml("").unwrap();

        assert_eq!(config, TrackerConfig::default());
        assert_eq!(config.flags.block_divisor, 1000);
        assert_eq!(config.flags.block_multiplier, 125);
        assert_eq!(config.container.header_size, HEADER_SIZE);
        assert_eq!(config.container.slot_size, SLOT_SIZE);
        assert_eq!(config.container.slot_count, SLOT_COUNT);
        assert_eq!(config.container.flag_region_max_size, FLAG_REGION_MAX_SIZE);
        assert_eq!(config.poll_interval_secs, 5);
    }

    #[test]
    fn test_full_config() {
        let config = TrackerConfig::from_toml(r#"
            offset_table_path = "/opt/tracker/eventflag_bst.txt"
            poll_interval_secs = 2
            location_order = ["Limgrave", "Stormveil Castle"]

            [flags]
            block_divisor = 1000
            block_multiplier = 125

            [container]
            header_size = 0x310
            slot_size = 0x280090
            slot_count = 10
            flag_region_offset = 0x10
            flag_region_max_size = 0x1BF99F

            [character]
            record_offset = 0x1D0000
            record_size = 0x50
            name_chars = 16
            level_offset = 0x30
            seconds_played_offset = 0x34
            deaths_offset = 0x38
        "#).unwrap();

        assert_eq!(config.offset_table_path, PathBuf::from("/opt/tracker/eventflag_bst.txt"));
        assert_eq!(config.poll_interval_secs, 2);
        assert_eq!(config.location_order, vec!["Limgrave", "Stormveil Castle"]);
        assert_eq!(config.character.record_offset, 0x1D0000);
        assert_eq!(config.character.level_offset, 0x30);
        assert_eq!(config.character.name_offset, 0);
    }

    #[test]
    fn test_zero_divisor_is_invalid() {
        let result = TrackerConfig::from_toml(r#"
            [flags]
            block_divisor = 0
        "#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_character_record_outside_slot_is_invalid() {
        let result = TrackerConfig::from_toml(r#"
            [character]
            record_offset = 0x280080
        "#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_overflowing_layout_is_rejected() {
        let result = TrackerConfig::from_toml(r#"
            [container]
            slot_size = 0x4000000000000000
            slot_count = 10
        "#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_parse_error() {
        let result = TrackerConfig::from_toml("poll_interval_secs = \"soon\"");
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_load_from_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), "poll_interval_secs = 30\n").unwrap();

        let config = TrackerConfig::load(file.path()).unwrap();
        assert_eq!(config.poll_interval_secs, 30);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = TrackerConfig::load(&dir.path().join("tracker.toml"));
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }
}
