//! Configuration for the decision point
//!
//! Handles loading and validating the PDP configuration file.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;
use tracing::{info, warn};
use vigil_core::ConfigError;
use vigil_index::IndexType;
use vigil_policy::CombiningAlgorithm;

/// Names bound from every subscription, which configuration variables may
/// not shadow.
pub const RESERVED_VARIABLES: [&str; 4] = ["subject", "action", "resource", "environment"];

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level, overridden by `RUST_LOG` when set
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Decision point configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PdpConfig {
    /// Algorithm combining the top-level documents
    #[serde(default)]
    pub algorithm: CombiningAlgorithm,

    /// Variables visible to every document
    #[serde(default)]
    pub variables: HashMap<String, Value>,

    /// Index strategy of the retrieval point
    #[serde(default)]
    pub index: IndexType,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PdpConfig {
    /// Load configuration from a file
    ///
    /// A missing path or a missing file yields the defaults.
    pub async fn load(path: Option<&str>) -> Result<Self> {
        let mut config = PdpConfig::default();

        if let Some(path) = path {
            info!("Loading configuration from {}", path);

            if !Path::new(path).exists() {
                warn!("Configuration file not found: {}", path);
                return Ok(config);
            }

            let content = fs::read_to_string(path)
                .await
                .context(format!("Failed to read configuration file: {}", path))?;

            config = Self::from_json(&content)
                .context(format!("Failed to parse configuration file: {}", path))?;
        } else {
            info!("No configuration file specified, using defaults");
        }

        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from JSON without validating it
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        for name in self.variables.keys() {
            if name.trim().is_empty() {
                return Err(ConfigError::InvalidVariable {
                    name: name.clone(),
                    reason: "name cannot be empty".to_string(),
                }
                .into());
            }
            if RESERVED_VARIABLES.contains(&name.as_str()) {
                return Err(ConfigError::InvalidVariable {
                    name: name.clone(),
                    reason: "name is bound by every subscription".to_string(),
                }
                .into());
            }
        }

        let level = self.logging.level.to_ascii_lowercase();
        if !LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidValue {
                field: "logging.level".to_string(),
                reason: format!("'{}' is not one of {}", self.logging.level, LOG_LEVELS.join(", ")),
            }
            .into());
        }

        Ok(())
    }

    pub fn with_algorithm(mut self, algorithm: CombiningAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    pub fn with_index(mut self, index: IndexType) -> Self {
        self.index = index;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = PdpConfig::default();
        assert_eq!(config.algorithm, CombiningAlgorithm::FirstApplicable);
        assert_eq!(config.index, IndexType::Canonical);
        assert!(config.variables.is_empty());
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse() {
        let config = PdpConfig::from_json(
            r#"{
                "algorithm": "deny-overrides",
                "variables": {"limit": 10},
                "index": "naive",
                "logging": {"json": true}
            }"#,
        )
        .unwrap();
        assert_eq!(config.algorithm, CombiningAlgorithm::DenyOverrides);
        assert_eq!(config.variables.get("limit"), Some(&json!(10)));
        assert_eq!(config.index, IndexType::Naive);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.json);
    }

    #[test]
    fn test_unknown_algorithm_falls_back() {
        let config = PdpConfig::from_json(r#"{"algorithm": "most-permissive"}"#).unwrap();
        assert_eq!(config.algorithm, CombiningAlgorithm::FirstApplicable);
    }

    #[test]
    fn test_validate() {
        let config = PdpConfig::default().with_variable("subject", json!("x"));
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InvalidVariable { .. })
        ));

        let mut config = PdpConfig::default();
        config.logging.level = "loud".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::InvalidValue { .. })
        ));
    }

    #[tokio::test]
    async fn test_load() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"algorithm": "permit-unless-deny", "variables": {{"tenant": "acme"}}}}"#)
            .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = PdpConfig::load(Some(&path)).await.unwrap();
        assert_eq!(config.algorithm, CombiningAlgorithm::PermitUnlessDeny);
        assert_eq!(config.variables.get("tenant"), Some(&json!("acme")));
    }

    #[tokio::test]
    async fn test_load_missing_or_malformed() {
        let config = PdpConfig::load(Some("/nonexistent/pdp.json")).await.unwrap();
        assert_eq!(config, PdpConfig::default());

        let config = PdpConfig::load(None).await.unwrap();
        assert_eq!(config, PdpConfig::default());

        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let err = PdpConfig::load(Some(&path)).await.unwrap_err();
        assert!(err.to_string().contains("Failed to parse configuration file"));
    }
}
