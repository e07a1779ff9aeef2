//! Device identity.
//!
//! Each display generates an opaque device id once and presents it to the
//! backend as the `deviceId` cookie on every request. The id is persisted
//! with a 30-day expiry and regenerated lazily once it has expired.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

/// Lifetime of a freshly generated device id.
pub const DEVICE_ID_TTL: Duration = Duration::days(30);

/// Errors raised by an [`IdentityStore`].
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed identity record: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// The persisted identity of this display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceIdentity {
    pub device_id: String,
    #[serde(with = "time::serde::timestamp")]
    pub expires_at: OffsetDateTime,
}

impl DeviceIdentity {
    /// Generate a new identity: `gfd-<unix millis>-<random suffix>`.
    pub fn generate(now: OffsetDateTime) -> Self {
        let millis = now.unix_timestamp_nanos() / 1_000_000;
        let suffix = fast32::base32::RFC4648_NOPAD
            .encode(&rand::random::<[u8; 6]>())
            .to_ascii_lowercase();
        Self {
            device_id: format!("gfd-{millis}-{suffix}"),
            expires_at: now + DEVICE_ID_TTL,
        }
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

/// Persistence for the device identity.
pub trait IdentityStore: Send {
    /// Load the stored identity, expired or not.
    fn load(&self) -> Result<Option<DeviceIdentity>, IdentityError>;

    fn save(&self, identity: &DeviceIdentity) -> Result<(), IdentityError>;
}

/// Return the stored identity, generating and saving a new one when none
/// is stored or the stored one has expired.
pub fn load_or_create(
    store: &dyn IdentityStore,
    now: OffsetDateTime,
) -> Result<DeviceIdentity, IdentityError> {
    match store.load() {
        Ok(Some(identity)) if !identity.is_expired(now) => return Ok(identity),
        Ok(Some(identity)) => {
            debug!(device_id = %identity.device_id, "Stored device id expired");
        }
        Ok(None) => {}
        Err(IdentityError::Malformed(e)) => {
            warn!(error = %e, "Discarding malformed device identity");
        }
        Err(e) => return Err(e),
    }

    let identity = DeviceIdentity::generate(now);
    store.save(&identity)?;
    info!(device_id = %identity.device_id, "Generated new device id");
    Ok(identity)
}

/// Stores the identity as a JSON file.
#[derive(Debug, Clone)]
pub struct FileIdentityStore {
    path: PathBuf,
}

impl FileIdentityStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IdentityStore for FileIdentityStore {
    fn load(&self) -> Result<Option<DeviceIdentity>, IdentityError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, identity: &DeviceIdentity) -> Result<(), IdentityError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        // Write atomically: write to temp file, then rename
        let temp_path = self.path.with_extension("json.tmp");
        std::fs::write(&temp_path, serde_json::to_vec_pretty(identity)?)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }
}

/// In-memory store, for tests and ephemeral displays.
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    identity: Mutex<Option<DeviceIdentity>>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(identity: DeviceIdentity) -> Self {
        Self {
            identity: Mutex::new(Some(identity)),
        }
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn load(&self) -> Result<Option<DeviceIdentity>, IdentityError> {
        let guard = self.identity.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone())
    }

    fn save(&self, identity: &DeviceIdentity) -> Result<(), IdentityError> {
        let mut guard = self.identity.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(identity.clone());
        Ok(())
    }
}
