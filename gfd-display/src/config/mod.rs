//! Configuration module for gfd-display.
//!
//! Handles loading configuration from the TOML file and CLI arguments.
//! Also handles admin passcode hashing.

pub mod file;

use crate::config::file::FileConfig;
use gfd_core::config::{AdminConfig, SessionConfig};
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("password hashing error: {0}")]
    HashError(String),
}

/// Loaded configuration result containing all parts.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub session: SessionConfig,
    pub identity_path: PathBuf,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    config_path: PathBuf,
    base_url_override: Option<Url>,
}

impl ConfigLoader {
    /// Create a new config loader.
    pub fn new(config_path: impl AsRef<Path>, base_url_override: Option<Url>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            base_url_override,
        }
    }

    /// Load and process the configuration.
    ///
    /// This will:
    /// 1. Read the TOML file
    /// 2. Validate the configuration
    /// 3. Hash the admin passcode if it's plaintext (and rewrite the file)
    /// 4. Apply CLI overrides
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let config_content = std::fs::read_to_string(&self.config_path)?;
        let mut file_config: FileConfig = toml::from_str(&config_content)?;

        self.validate(&file_config)?;

        // Hash admin passcode if needed and rewrite config
        let passcode_hash = if file_config.is_admin_passcode_hashed() {
            file_config.admin.passcode.clone()
        } else {
            let hash = self.hash_passcode(&file_config.admin.passcode)?;
            file_config.admin.passcode = hash.clone();
            self.rewrite_config(&file_config)?;
            tracing::info!("Admin passcode hashed and config file updated");
            hash
        };

        // The override is applied after the rewrite so it never lands in the file.
        let base_url = self
            .base_url_override
            .clone()
            .unwrap_or(file_config.server.base_url);

        Ok(LoadedConfig {
            session: SessionConfig {
                base_url,
                admin: AdminConfig::new(passcode_hash),
            },
            identity_path: file_config.device.identity_path,
        })
    }

    /// Reload the configuration (used during SIGHUP).
    pub fn reload(&self) -> Result<LoadedConfig, ConfigError> {
        self.load()
    }

    fn validate(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let scheme = config.server.base_url.scheme();
        if scheme != "http" && scheme != "https" {
            return Err(ConfigError::ValidationError(format!(
                "server.base_url must be http or https, got {scheme}"
            )));
        }
        if config.admin.passcode.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "admin.passcode must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn hash_passcode(&self, plaintext: &str) -> Result<String, ConfigError> {
        use argon2::{
            Argon2, PasswordHasher,
            password_hash::{SaltString, rand_core::OsRng},
        };

        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ConfigError::HashError(e.to_string()))
    }

    fn rewrite_config(&self, config: &FileConfig) -> Result<(), ConfigError> {
        let toml_string = toml::to_string_pretty(config)?;

        // Write atomically: write to temp file, then rename
        let temp_path = self.config_path.with_extension("toml.tmp");
        std::fs::write(&temp_path, toml_string)?;
        std::fs::rename(&temp_path, &self.config_path)?;

        Ok(())
    }
}
