//! Audit Core Configuration
//!
//! Layered loading: built-in defaults, then an optional TOML file, then
//! `PARCEL_AUDIT_*` environment variables.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{AuditError, Result};

const ENV_PREFIX: &str = "PARCEL_AUDIT";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    pub batch_size_threshold: usize,
    pub batch_timeout_secs: u64,
    pub anchor_url: String,
    pub audit_store_url: String,
    pub consistency_url: String,
    pub request_timeout_secs: u64,
    pub digest_cache_capacity: usize,
    /// Name of the environment variable holding the bearer token.
    pub api_token_env: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            batch_size_threshold: 5,
            batch_timeout_secs: 30,
            anchor_url: "http://localhost:8080/api".to_string(),
            audit_store_url: "http://localhost:8080/api".to_string(),
            consistency_url: "http://localhost:8080/api".to_string(),
            request_timeout_secs: 10,
            digest_cache_capacity: 1024,
            api_token_env: "PARCEL_AUDIT_API_TOKEN".to_string(),
        }
    }
}

impl AuditConfig {
    /// Load configuration from defaults and environment only
    pub fn load() -> Result<Self> {
        Self::load_layered(None)
    }

    /// Load configuration with a TOML file layered between defaults and environment
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(AuditError::Config(format!(
                "Configuration file not found: {:?}",
                path
            )));
        }
        Self::load_layered(Some(path))
    }

    fn load_layered(path: Option<&Path>) -> Result<Self> {
        let defaults = Self::default();

        let mut builder = Config::builder()
            .set_default("batch_size_threshold", defaults.batch_size_threshold as i64)?
            .set_default("batch_timeout_secs", defaults.batch_timeout_secs as i64)?
            .set_default("anchor_url", defaults.anchor_url)?
            .set_default("audit_store_url", defaults.audit_store_url)?
            .set_default("consistency_url", defaults.consistency_url)?
            .set_default("request_timeout_secs", defaults.request_timeout_secs as i64)?
            .set_default("digest_cache_capacity", defaults.digest_cache_capacity as i64)?
            .set_default("api_token_env", defaults.api_token_env)?;

        if let Some(path) = path {
            info!("Loading audit configuration from: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        let config: AuditConfig = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the logger and verifier cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size_threshold == 0 {
            return Err(AuditError::Config(
                "batch_size_threshold must be at least 1".to_string(),
            ));
        }
        if self.batch_timeout_secs == 0 {
            return Err(AuditError::Config(
                "batch_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.digest_cache_capacity == 0 {
            return Err(AuditError::Config(
                "digest_cache_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = AuditConfig::default();
        assert_eq!(config.batch_size_threshold, 5);
        assert_eq!(config.batch_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_file_overrides_defaults() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("audit.toml");
        fs::write(
            &path,
            "batch_size_threshold = 10\nanchor_url = \"https://anchor.example.org\"\n",
        )
        .unwrap();

        let config = AuditConfig::load_from_file(&path).unwrap();
        assert_eq!(config.batch_size_threshold, 10);
        assert_eq!(config.anchor_url, "https://anchor.example.org");
        assert_eq!(config.batch_timeout_secs, 30);
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let temp_dir = tempdir().unwrap();
        let result = AuditConfig::load_from_file(&temp_dir.path().join("absent.toml"));
        assert!(matches!(result, Err(AuditError::Config(_))));
    }

    #[test]
    fn test_zero_threshold_rejected() {
        let config = AuditConfig {
            batch_size_threshold: 0,
            ..AuditConfig::default()
        };
        assert!(matches!(config.validate(), Err(AuditError::Config(_))));
    }
}
