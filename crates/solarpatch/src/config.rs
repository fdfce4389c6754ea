//! Session configuration.
//!
//! Config JSON follows a versioned schema (`solarpatch.config.v1`). Every
//! field other than `schema` is optional and falls back to the built-in
//! defaults.

use std::path::Path;

use crate::error::ConfigurationError;
use crate::instrument::ProviderTable;

const CONFIG_SCHEMA_V1: &str = "solarpatch.config.v1";

const DEFAULT_WORKERS: usize = 4;

/// How prepared patches are written into the shared canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Workers prepare patches; one thread merges them in input order.
    #[default]
    SingleWriter,
    /// Workers merge directly under a canvas-wide lock.
    SharedLock,
}

/// Tuning and lookup tables for one compositing session.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct SessionConfig {
    /// Size of the patch-preparation worker pool.
    pub workers: usize,
    pub merge: MergeStrategy,
    pub providers: ProviderTable,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            merge: MergeStrategy::default(),
            providers: ProviderTable::default(),
        }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct SessionConfigSpecV1 {
    schema: String,
    #[serde(default)]
    workers: Option<usize>,
    #[serde(default)]
    merge: Option<MergeStrategy>,
    #[serde(default)]
    providers: Option<ProviderTable>,
}

impl SessionConfig {
    /// Load a config from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        Ok(Self::from_json_str(&data)?)
    }

    /// Parse a config from JSON text.
    pub fn from_json_str(data: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let spec: SessionConfigSpecV1 = serde_json::from_str(data)?;
        Ok(Self::from_spec(spec)?)
    }

    fn from_spec(spec: SessionConfigSpecV1) -> Result<Self, ConfigurationError> {
        if spec.schema != CONFIG_SCHEMA_V1 {
            return Err(ConfigurationError::Schema {
                found: spec.schema,
                expected: CONFIG_SCHEMA_V1,
            });
        }
        let defaults = Self::default();
        let config = Self {
            workers: spec.workers.unwrap_or(defaults.workers),
            merge: spec.merge.unwrap_or(defaults.merge),
            providers: spec.providers.unwrap_or(defaults.providers),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.workers == 0 {
            return Err(ConfigurationError::WorkerPool(
                "workers must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_four_workers_and_single_writer() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.merge, MergeStrategy::SingleWriter);
        assert_eq!(cfg.providers.primary().name, "HMI");
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let cfg = SessionConfig::from_json_str(
            r#"{"schema":"solarpatch.config.v1","workers":2,"merge":"shared_lock"}"#,
        )
        .expect("valid config");
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.merge, MergeStrategy::SharedLock);
        assert_eq!(cfg.providers, ProviderTable::default());
    }

    #[test]
    fn wrong_schema_is_rejected() {
        let err = SessionConfig::from_json_str(r#"{"schema":"solarpatch.config.v0"}"#)
            .expect_err("expected error");
        assert!(err.to_string().contains("unsupported config schema"));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let raw = r#"{"schema":"solarpatch.config.v1","jsoc_email":"someone@example.org"}"#;
        assert!(SessionConfig::from_json_str(raw).is_err());
    }

    #[test]
    fn zero_workers_is_rejected() {
        let raw = r#"{"schema":"solarpatch.config.v1","workers":0}"#;
        assert!(SessionConfig::from_json_str(raw).is_err());
    }

    #[test]
    fn provider_table_can_be_overridden() {
        let mut providers = serde_json::to_value(ProviderTable::default()).unwrap();
        providers["providers"][0]["canvas_side"] = serde_json::json!(2048);
        let raw = serde_json::json!({
            "schema": "solarpatch.config.v1",
            "providers": providers,
        });
        let cfg = SessionConfig::from_json_str(&raw.to_string()).expect("valid config");
        assert_eq!(cfg.providers.by_name("HMI").unwrap().canvas_side, 2048);
    }
}
