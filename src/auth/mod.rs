//! The API key slot.
//!
//! [`CredentialStore`] wraps a [`CredentialBackend`] with the user-facing
//! policy: reads never fail (storage errors are alerted and read as absent),
//! writes and removals alert on failure and report it to the caller.

pub mod backend;
pub mod error;

use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::alert::{Alert, AlertSink};
use crate::core::config::data::{Config, CredentialStoreKind};
use crate::core::constants::{MISSING_KEY_MESSAGE, STORAGE_API_KEY};

pub use backend::{CredentialBackend, FileBackend, KeyringBackend, MemoryBackend};
pub use error::CredentialError;

/// The API key. The value is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<dyn CredentialBackend>,
    alerts: Arc<dyn AlertSink>,
}

impl CredentialStore {
    pub fn new(backend: Arc<dyn CredentialBackend>, alerts: Arc<dyn AlertSink>) -> Self {
        Self { backend, alerts }
    }

    /// Build the store selected by `config`.
    pub fn from_config(config: &Config, alerts: Arc<dyn AlertSink>) -> Self {
        let backend: Arc<dyn CredentialBackend> = match config.credential_store() {
            CredentialStoreKind::Keyring => Arc::new(KeyringBackend),
            CredentialStoreKind::File => Arc::new(FileBackend::new(Config::credentials_path())),
        };
        Self::new(backend, alerts)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// The stored key, or `None` when absent or unreadable.
    pub fn get(&self) -> Option<Credential> {
        match self.lookup() {
            Ok(found) => found,
            Err(err) => {
                self.report_read_failure(&err);
                None
            }
        }
    }

    /// Like [`get`](Self::get), but an absent key is alerted too. Callers
    /// about to need the key use this; the user sees one alert either way.
    pub fn require(&self) -> Option<Credential> {
        match self.lookup() {
            Ok(Some(credential)) => Some(credential),
            Ok(None) => {
                self.alerts.show(Alert::error(MISSING_KEY_MESSAGE));
                None
            }
            Err(err) => {
                self.report_read_failure(&err);
                None
            }
        }
    }

    fn lookup(&self) -> Result<Option<Credential>, CredentialError> {
        let found = self.backend.read(STORAGE_API_KEY)?;
        debug!(
            backend = self.backend.name(),
            present = found.is_some(),
            "credential lookup"
        );
        Ok(found.map(Credential))
    }

    fn report_read_failure(&self, err: &CredentialError) {
        warn!(
            backend = self.backend.name(),
            recoverable = err.is_recoverable(),
            "credential lookup failed: {err}"
        );
        self.alerts.show(Alert::error(MISSING_KEY_MESSAGE));
    }

    pub fn set(&self, value: &str) -> Result<(), CredentialError> {
        match self.backend.write(STORAGE_API_KEY, value) {
            Ok(()) => {
                debug!(backend = self.backend.name(), "credential stored");
                self.alerts.show(Alert::info("API key saved"));
                Ok(())
            }
            Err(err) => {
                warn!(backend = self.backend.name(), "credential store failed: {err}");
                self.alerts
                    .show(Alert::error("Could not save API key to storage"));
                Err(err)
            }
        }
    }

    pub fn remove(&self) -> Result<(), CredentialError> {
        match self.backend.delete(STORAGE_API_KEY) {
            Ok(()) => {
                debug!(backend = self.backend.name(), "credential removed");
                self.alerts.show(Alert::info("API key removed"));
                Ok(())
            }
            Err(err) => {
                warn!(backend = self.backend.name(), "credential removal failed: {err}");
                self.alerts
                    .show(Alert::error("Could not remove API key from storage"));
                Err(err)
            }
        }
    }
}
