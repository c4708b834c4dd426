//! Credential Store
//!
//! Persists the last profile that connected successfully, so the next run can
//! reconnect without asking. Exactly one record is kept; there is no history.
//!
//! # Storage Location
//! - Default: `~/.config/askdb/db_config.json` (per-user)
//! - Override: `ASKDB_STORE_PATH` or `--store-path`
//!
//! Absence of the file means "no saved profile". The record is plain JSON;
//! an encrypting store only has to implement [`CredentialStore`].

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{ClientError, Result};
use crate::service::ConnectionProfile;

/// File name of the single stored record
pub const STORE_FILE_NAME: &str = "db_config.json";

/// Durable home for the current connection profile
///
/// Only the session calls `save` and `clear`.
pub trait CredentialStore: Send + Sync {
    fn save(&self, profile: &ConnectionProfile) -> Result<()>;

    fn load(&self) -> Result<Option<ConnectionProfile>>;

    fn clear(&self) -> Result<()>;
}

/// Get path to the default store file (`~/.config/askdb/db_config.json`)
pub fn default_store_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ClientError::config_error("Could not determine user config directory"))?;

    Ok(config_dir.join("askdb").join(STORE_FILE_NAME))
}

/// Profile stored as a JSON file
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for FileCredentialStore {
    fn save(&self, profile: &ConnectionProfile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                ClientError::config_error(format!("Could not create store directory: {e}"))
            })?;
        }

        let contents = serde_json::to_string_pretty(profile)
            .map_err(|e| ClientError::config_error(format!("Could not serialize profile: {e}")))?;

        fs::write(&self.path, contents)
            .map_err(|e| ClientError::config_error(format!("Could not write store file: {e}")))
    }

    fn load(&self) -> Result<Option<ConnectionProfile>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .map_err(|e| ClientError::config_error(format!("Could not read store file: {e}")))?;

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| ClientError::config_error(format!("Invalid store file format: {e}")))
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ClientError::config_error(format!("Could not remove store file: {e}"))),
        }
    }
}

/// Profile kept in memory for the life of the process
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    slot: Mutex<Option<ConnectionProfile>>,
}

impl MemoryCredentialStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a profile, as if a previous run had saved it
    #[must_use]
    pub fn with_profile(profile: ConnectionProfile) -> Self {
        Self { slot: Mutex::new(Some(profile)) }
    }

    fn slot(&self) -> Result<std::sync::MutexGuard<'_, Option<ConnectionProfile>>> {
        self.slot.lock().map_err(|_| ClientError::config_error("Credential store lock poisoned"))
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn save(&self, profile: &ConnectionProfile) -> Result<()> {
        *self.slot()? = Some(profile.clone());
        Ok(())
    }

    fn load(&self) -> Result<Option<ConnectionProfile>> {
        Ok(self.slot()?.clone())
    }

    fn clear(&self) -> Result<()> {
        *self.slot()? = None;
        Ok(())
    }
}
