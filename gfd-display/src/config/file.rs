//! TOML file configuration structures.
//!
//! These structs directly map to the `gfd-config.toml` file format.

use gfd_core::config::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

/// Root configuration structure as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerConfig,
    pub admin: AdminConfig,
    #[serde(default)]
    pub device: DeviceConfig,
}

/// Backend connection section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the GFD backend (e.g., "http://localhost:8081").
    #[serde(default = "default_base_url")]
    pub base_url: Url,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> Url {
    Url::parse(DEFAULT_BASE_URL).expect("valid default base URL")
}

/// Admin configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    /// The admin passcode. If this is plaintext (doesn't start with
    /// `$argon2`), it will be hashed and the config file will be rewritten.
    pub passcode: String,
}

/// Device section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Where the device identity is persisted.
    #[serde(default = "default_identity_path")]
    pub identity_path: PathBuf,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            identity_path: default_identity_path(),
        }
    }
}

fn default_identity_path() -> PathBuf {
    PathBuf::from("./gfd-device.json")
}

impl FileConfig {
    /// Check if the admin passcode is already hashed (argon2 format).
    pub fn is_admin_passcode_hashed(&self) -> bool {
        self.admin.passcode.starts_with("$argon2")
    }
}
