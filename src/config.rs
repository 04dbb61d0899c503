//! TOML configuration for a chaincode.
//!
//! The configuration is loaded once at startup and handed to
//! [`crate::contracts::ContractChaincode::builder`]. Nothing here is global.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::metadata::InfoMetadata;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read or written
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid TOML for this schema
    #[error("failed to parse config: {0}")]
    ParseError(String),

    /// Parsed but unusable
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Chaincode configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaincodeConfig {
    /// Namespace that receives unqualified function names (default: first
    /// registered contract)
    #[serde(default)]
    pub default_contract: Option<String>,
    /// Supplementary metadata JSON file used for schema validation
    #[serde(default)]
    pub metadata_path: Option<PathBuf>,
    /// Log filter used when `RUST_LOG` is unset (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Chaincode title and version for generated metadata
    #[serde(default)]
    pub info: Option<InfoMetadata>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ChaincodeConfig {
    fn default() -> Self {
        Self {
            default_contract: None,
            metadata_path: None,
            log_level: default_log_level(),
            info: None,
        }
    }
}

impl ChaincodeConfig {
    /// Load from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check field values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "log_level must be one of {}, got {}",
                LOG_LEVELS.join(", "),
                self.log_level
            )));
        }
        if self
            .default_contract
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "default_contract must not be blank".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: ChaincodeConfig = toml::from_str("").unwrap();
        assert_eq!(config, ChaincodeConfig::default());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_toml_roundtrip() {
        let config = ChaincodeConfig {
            default_contract: Some("assets".into()),
            metadata_path: Some(PathBuf::from("META-INF/metadata.json")),
            log_level: "debug".into(),
            info: Some(InfoMetadata {
                title: "Assets".into(),
                version: "1.0.0".into(),
                description: None,
            }),
        };
        let serialized = toml::to_string_pretty(&config).unwrap();
        let deserialized: ChaincodeConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized, config);
    }

    #[test]
    fn test_file_roundtrip() {
        let path = std::env::temp_dir().join(format!("chaincode-config-{}.toml", std::process::id()));
        let config = ChaincodeConfig {
            default_contract: Some("assets".into()),
            ..ChaincodeConfig::default()
        };
        config.save_to_file(&path).unwrap();
        let loaded = ChaincodeConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validate() {
        let config = ChaincodeConfig {
            log_level: "loud".into(),
            ..ChaincodeConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let config = ChaincodeConfig {
            default_contract: Some(" ".into()),
            ..ChaincodeConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
