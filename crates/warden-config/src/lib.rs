//! Configuration management for Warden
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (WARDEN_* prefix, `__` between section and key)
//! 2. warden.local.toml (gitignored, local overrides)
//! 3. warden.toml (deployment config)
//! 4. ~/.config/warden/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)
//!
//! Key material is never read from these files. [`CryptoConfig`] only names
//! where the master key lives.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main Warden configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub audit: AuditConfig,
    pub ability: AbilityConfig,
    pub crypto: CryptoConfig,
    pub outbound: OutboundConfig,
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Timeout for a single store call.
    pub store_timeout_ms: u64,
    /// Compare-and-append attempts before an append is handed to the retry worker.
    pub max_contention_retries: u32,
    pub retry_max_attempts: u32,
    pub retry_initial_backoff_ms: u64,
    pub retry_max_backoff_ms: u64,
    pub retry_queue_capacity: usize,
    /// Entries older than this are flagged retired.
    pub retention_days: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: 2_000,
            max_contention_retries: 8,
            retry_max_attempts: 5,
            retry_initial_backoff_ms: 200,
            retry_max_backoff_ms: 10_000,
            retry_queue_capacity: 1_024,
            // Seven years, the longest retention any supported framework asks for.
            retention_days: 2_555,
        }
    }
}

impl AuditConfig {
    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn retry_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_initial_backoff_ms)
    }

    pub fn retry_max_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_max_backoff_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbilityConfig {
    /// First business hour, UTC, inclusive.
    pub business_hours_start: u32,
    /// Last business hour, UTC, exclusive.
    pub business_hours_end: u32,
    pub signature_internal: u8,
    pub signature_confidential: u8,
    pub signature_restricted: u8,
    pub signature_high_risk_increment: u8,
    pub signature_critical_risk_increment: u8,
}

impl Default for AbilityConfig {
    fn default() -> Self {
        Self {
            business_hours_start: 9,
            business_hours_end: 17,
            signature_internal: 1,
            signature_confidential: 2,
            signature_restricted: 3,
            signature_high_risk_increment: 1,
            signature_critical_risk_increment: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Environment variable holding the base64 master key.
    pub master_key_env: String,
    /// File holding the master key. Takes precedence over the variable.
    pub master_key_file: Option<PathBuf>,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            master_key_env: "WARDEN_MASTER_KEY".to_string(),
            master_key_file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutboundConfig {
    pub queue_capacity: usize,
    pub max_delivery_attempts: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for OutboundConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            max_delivery_attempts: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: "warden=info".to_string(),
        }
    }
}

impl WardenConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Parse a single TOML file without layering.
    pub fn from_file(path: impl AsRef<Path>) -> std::result::Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&raw).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects values the components cannot run with.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::ValidationError(msg));

        let ability = &self.ability;
        if ability.business_hours_start >= ability.business_hours_end
            || ability.business_hours_end > 24
        {
            return invalid(format!(
                "business hours {}..{} must be a non-empty range within 0..24",
                ability.business_hours_start, ability.business_hours_end
            ));
        }
        let levels = [
            ability.signature_internal,
            ability.signature_confidential,
            ability.signature_restricted,
        ];
        if levels.iter().any(|&level| level > 5) {
            return invalid("signature levels must be between 0 and 5".to_string());
        }

        let audit = &self.audit;
        if audit.store_timeout_ms == 0 {
            return invalid("audit.store_timeout_ms must be positive".to_string());
        }
        if audit.retry_queue_capacity == 0 || audit.retry_max_attempts == 0 {
            return invalid("audit retry queue capacity and attempts must be positive".to_string());
        }
        if audit.retry_max_backoff_ms < audit.retry_initial_backoff_ms {
            return invalid("audit.retry_max_backoff_ms is below the initial backoff".to_string());
        }
        if audit.retention_days == 0 {
            return invalid("audit.retention_days must be positive".to_string());
        }

        let outbound = &self.outbound;
        if outbound.queue_capacity == 0 || outbound.max_delivery_attempts == 0 {
            return invalid("outbound queue capacity and attempts must be positive".to_string());
        }
        if outbound.max_backoff_ms < outbound.initial_backoff_ms {
            return invalid("outbound.max_backoff_ms is below the initial backoff".to_string());
        }

        if self.crypto.master_key_env.is_empty() && self.crypto.master_key_file.is_none() {
            return invalid("crypto needs master_key_env or master_key_file".to_string());
        }
        Ok(())
    }

    /// Resolve relative paths to absolute
    pub fn resolve_paths(&mut self, base_dir: impl AsRef<Path>) {
        let base = base_dir.as_ref();
        if let Some(file) = &self.crypto.master_key_file
            && file.is_relative()
        {
            self.crypto.master_key_file = Some(base.join(file));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = WardenConfig::default();
        assert_eq!(config.audit.store_timeout(), Duration::from_secs(2));
        assert_eq!(config.crypto.master_key_env, "WARDEN_MASTER_KEY");
        assert_eq!(config.telemetry.filter, "warden=info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_business_hours() {
        let mut config = WardenConfig::default();
        config.ability.business_hours_start = 18;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_invalid_backoff() {
        let mut config = WardenConfig::default();
        config.outbound.max_backoff_ms = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_path_resolution() {
        let mut config = WardenConfig::default();
        config.crypto.master_key_file = Some(PathBuf::from("secrets/master.key"));
        config.resolve_paths("/srv/warden");
        assert_eq!(
            config.crypto.master_key_file,
            Some(PathBuf::from("/srv/warden/secrets/master.key"))
        );
    }

    #[test]
    fn test_from_file() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("warden.toml");
        fs::write(&path, "[outbound]\nqueue_capacity = 8\n").expect("Failed to write config");

        let config = WardenConfig::from_file(&path).expect("Failed to load config");
        assert_eq!(config.outbound.queue_capacity, 8);
        assert_eq!(config.outbound.max_delivery_attempts, 5);
    }

    #[test]
    fn test_from_file_parse_error() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let path = temp_dir.path().join("warden.toml");
        fs::write(&path, "[audit\nstore_timeout_ms = 1").expect("Failed to write config");

        assert!(matches!(
            WardenConfig::from_file(&path),
            Err(ConfigError::ParseError { .. })
        ));
        assert!(matches!(
            WardenConfig::from_file(temp_dir.path().join("missing.toml")),
            Err(ConfigError::ReadError { .. })
        ));
    }
}
