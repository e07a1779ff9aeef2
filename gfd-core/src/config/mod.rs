//! Configuration types for the guided flow display.
//!
//! These types represent the validated runtime configuration of a display
//! session. Loading and parsing the config file is handled by the binary
//! crate.

mod admin;

pub use admin::AdminConfig;

use url::Url;

/// Default backend address, used when nothing else is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8081";

/// Runtime configuration of a [`DisplaySession`](crate::session::DisplaySession).
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Base URL of the backend serving `/api/sse/*`.
    pub base_url: Url,
    /// Admin gate configuration.
    pub admin: AdminConfig,
}
