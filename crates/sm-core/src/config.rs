//! Engine configuration
//!
//! Read from JSON with camelCase keys; every field is optional.

use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_CAPACITY;
use crate::error::ConfigError;
use crate::section::RegexpMode;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// Maximum number of cached URLs
    pub cache_capacity: usize,
    pub regexp_mode: RegexpMode,
    /// Cache and match URLs with their `#fragment`
    pub keep_fragment: bool,
    /// URL root of the extension's own pages
    pub own_root: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CAPACITY,
            regexp_mode: RegexpMode::Eager,
            keep_fragment: false,
            own_root: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_capacity == 0 {
            return Err(ConfigError::Value("cacheCapacity must be at least 1".into()));
        }
        Ok(())
    }

    /// The own-page root, ignoring an empty string.
    pub fn own_root(&self) -> Option<&str> {
        self.own_root.as_deref().filter(|root| !root.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.cache_capacity, 1000);
        assert_eq!(config.regexp_mode, RegexpMode::Eager);
        assert_eq!(config.own_root(), None);
    }

    #[test]
    fn test_camel_case_keys() {
        let config = EngineConfig::from_json(
            r#"{"cacheCapacity": 16, "regexpMode": "deferred", "keepFragment": true, "ownRoot": ""}"#,
        )
        .unwrap();
        assert_eq!(config.cache_capacity, 16);
        assert_eq!(config.regexp_mode, RegexpMode::Deferred);
        assert!(config.keep_fragment);
        assert_eq!(config.own_root(), None);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(EngineConfig::from_json("[]"), Err(ConfigError::Json(_))));
        assert!(matches!(
            EngineConfig::from_json(r#"{"cacheCapacity": 0}"#),
            Err(ConfigError::Value(_))
        ));
    }
}
