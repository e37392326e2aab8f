//! Configuration loader with multi-source merging

use crate::{Paths, WardenConfig};
use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

/// Configuration loader with builder pattern
pub struct ConfigLoader {
    project_dir: PathBuf,
    env_prefix: String,
    include_user_config: bool,
}

impl ConfigLoader {
    /// Create a new config loader rooted at the current directory
    pub fn new() -> Self {
        Self {
            project_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            env_prefix: "WARDEN".to_string(),
            include_user_config: true,
        }
    }

    /// Set the directory holding warden.toml
    pub fn with_project_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.project_dir = dir.as_ref().to_path_buf();
        self
    }

    /// Set the environment variable prefix (default: "WARDEN")
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Skip ~/.config/warden/config.toml
    pub fn without_user_config(mut self) -> Self {
        self.include_user_config = false;
        self
    }

    /// Load configuration from all sources with proper precedence
    pub fn load(self) -> Result<WardenConfig> {
        let mut builder = config::Config::builder();

        // 1. Built-in defaults
        let defaults = WardenConfig::default();
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        // 2. User config (~/.config/warden/config.toml)
        if self.include_user_config
            && let Ok(user_config_file) = Paths::new().user_config_file()
            && user_config_file.exists()
        {
            builder = builder.add_source(
                config::File::from(user_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 3. Deployment config (warden.toml)
        let project_config_file = Paths::project_config_file(&self.project_dir);
        if project_config_file.exists() {
            builder = builder.add_source(
                config::File::from(project_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 4. Local config (warden.local.toml)
        let local_config_file = Paths::local_config_file(&self.project_dir);
        if local_config_file.exists() {
            builder = builder.add_source(
                config::File::from(local_config_file)
                    .required(false)
                    .format(config::FileFormat::Toml),
            );
        }

        // 5. Environment variables (WARDEN_AUDIT__STORE_TIMEOUT_MS=500)
        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("Failed to build configuration")?;

        let mut warden_config: WardenConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        warden_config.resolve_paths(&self.project_dir);
        warden_config
            .validate()
            .context("Configuration failed validation")?;

        Ok(warden_config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn loader(dir: &Path) -> ConfigLoader {
        ConfigLoader::new()
            .with_project_dir(dir)
            .with_env_prefix("WARDEN_LOADER_TEST")
            .without_user_config()
    }

    #[test]
    fn test_load_defaults() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let config = loader(temp_dir.path()).load().expect("Failed to load config");
        assert_eq!(config, WardenConfig::default());
    }

    #[test]
    fn test_load_project_config() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        let config_content = r#"
[audit]
store_timeout_ms = 500
retention_days = 2190

[ability]
business_hours_start = 8
business_hours_end = 18

[crypto]
master_key_file = "keys/master.key"
"#;
        fs::write(project_dir.join("warden.toml"), config_content)
            .expect("Failed to write config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.audit.store_timeout_ms, 500);
        assert_eq!(config.audit.retention_days, 2190);
        assert_eq!(config.audit.max_contention_retries, 8);
        assert_eq!(config.ability.business_hours_start, 8);
        assert_eq!(
            config.crypto.master_key_file,
            Some(project_dir.join("keys/master.key"))
        );
    }

    #[test]
    fn test_local_overrides() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        let project_dir = temp_dir.path();

        fs::write(
            project_dir.join("warden.toml"),
            "[outbound]\nqueue_capacity = 64\nmax_delivery_attempts = 3\n",
        )
        .expect("Failed to write project config");
        fs::write(
            project_dir.join("warden.local.toml"),
            "[outbound]\nqueue_capacity = 16\n",
        )
        .expect("Failed to write local config");

        let config = loader(project_dir).load().expect("Failed to load config");

        assert_eq!(config.outbound.queue_capacity, 16);
        assert_eq!(config.outbound.max_delivery_attempts, 3);
    }

    #[test]
    fn test_invalid_values_fail_load() {
        let temp_dir = tempdir().expect("Failed to create temp dir");
        fs::write(
            temp_dir.path().join("warden.toml"),
            "[audit]\nstore_timeout_ms = 0\n",
        )
        .expect("Failed to write config");

        let err = loader(temp_dir.path()).load().unwrap_err();
        assert!(format!("{err:#}").contains("store_timeout_ms"));
    }

    // Environment variables are not exercised here: mutating the process
    // environment requires `unsafe` in edition 2024. In deployments
    // WARDEN_AUDIT__STORE_TIMEOUT_MS=500 overrides audit.store_timeout_ms.
}
