//! Durable storage for the single API key slot.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use keyring::Entry;
use tempfile::NamedTempFile;

use super::error::CredentialError;
use crate::core::constants::KEYRING_SERVICE;

/// A flat string key-value store. Implementations must treat removing an
/// absent key as success.
pub trait CredentialBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, CredentialError>;
    fn write(&self, key: &str, value: &str) -> Result<(), CredentialError>;
    fn delete(&self, key: &str) -> Result<(), CredentialError>;

    fn name(&self) -> &'static str;
}

/// Platform secret store (macOS keychain, Windows credential manager,
/// Secret Service on Linux).
#[derive(Debug, Default, Clone, Copy)]
pub struct KeyringBackend;

impl CredentialBackend for KeyringBackend {
    fn read(&self, key: &str) -> Result<Option<String>, CredentialError> {
        let entry = Entry::new(KEYRING_SERVICE, key)?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        let entry = Entry::new(KEYRING_SERVICE, key)?;
        entry.set_password(value)?;
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CredentialError> {
        let entry = Entry::new(KEYRING_SERVICE, key)?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn name(&self) -> &'static str {
        "keyring"
    }
}

/// Plaintext TOML file, rewritten atomically on every change.
#[derive(Debug, Clone)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, CredentialError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = fs::read_to_string(&self.path).map_err(|source| CredentialError::Io {
            path: self.path.clone(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| CredentialError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn store(&self, values: &BTreeMap<String, String>) -> Result<(), CredentialError> {
        let io_err = |source| CredentialError::Io {
            path: self.path.clone(),
            source,
        };

        let parent = self
            .path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty());
        if let Some(dir) = parent {
            fs::create_dir_all(dir).map_err(io_err)?;
        }

        let contents = toml::to_string(values)?;
        let mut temp_file = match parent {
            Some(dir) => NamedTempFile::new_in(dir),
            None => NamedTempFile::new(),
        }
        .map_err(io_err)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            temp_file
                .as_file()
                .set_permissions(fs::Permissions::from_mode(0o600))
                .map_err(io_err)?;
        }

        temp_file.write_all(contents.as_bytes()).map_err(io_err)?;
        temp_file.as_file_mut().sync_all().map_err(io_err)?;
        temp_file
            .persist(&self.path)
            .map_err(|err| io_err(err.error))?;
        Ok(())
    }
}

impl CredentialBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>, CredentialError> {
        Ok(self.load()?.remove(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        let mut values = self.load()?;
        values.insert(key.to_string(), value.to_string());
        self.store(&values)
    }

    fn delete(&self, key: &str) -> Result<(), CredentialError> {
        let mut values = self.load()?;
        if values.remove(key).is_none() {
            return Ok(());
        }
        self.store(&values)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// In-process storage. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    values: Mutex<BTreeMap<String, String>>,
    failing: Mutex<Option<String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let backend = Self::default();
        backend
            .lock_values()
            .insert(key.to_string(), value.to_string());
        backend
    }

    /// Make every subsequent operation fail with `reason`, or recover with `None`.
    pub fn set_failure(&self, reason: Option<&str>) {
        *self
            .failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = reason.map(str::to_string);
    }

    fn check(&self) -> Result<(), CredentialError> {
        match self
            .failing
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
        {
            Some(reason) => Err(CredentialError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn lock_values(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, String>> {
        self.values
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CredentialBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, CredentialError> {
        self.check()?;
        Ok(self.lock_values().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), CredentialError> {
        self.check()?;
        self.lock_values().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), CredentialError> {
        self.check()?;
        self.lock_values().remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
