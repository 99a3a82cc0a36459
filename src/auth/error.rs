use std::error::Error;
use std::fmt;
use std::path::PathBuf;

use crate::core::config::data::path_display;

/// Describes failures when reading or writing the stored API key.
///
/// Recoverable errors indicate that the credential backend was temporarily
/// unavailable (a locked keychain, an unreachable secret service). Permanent
/// errors surface the underlying cause directly so callers can report them.
#[derive(Debug)]
pub enum CredentialError {
    Recoverable(keyring::Error),
    Permanent(keyring::Error),
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    Encode(toml::ser::Error),
    /// Injected failure from a test backend.
    Unavailable(String),
}

impl CredentialError {
    /// Returns true when the error represents a temporary outage of the
    /// storage backend.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CredentialError::Recoverable(_) | CredentialError::Unavailable(_)
        )
    }
}

impl From<keyring::Error> for CredentialError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                CredentialError::Recoverable(err)
            }
            other => CredentialError::Permanent(other),
        }
    }
}

impl From<toml::ser::Error> for CredentialError {
    fn from(err: toml::ser::Error) -> Self {
        CredentialError::Encode(err)
    }
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialError::Recoverable(err) | CredentialError::Permanent(err) => {
                write!(f, "{err}")
            }
            CredentialError::Io { path, source } => {
                write!(
                    f,
                    "Failed to access credentials at {}: {}",
                    path_display(path),
                    source
                )
            }
            CredentialError::Parse { path, source } => {
                write!(
                    f,
                    "Failed to parse credentials at {}: {}",
                    path_display(path),
                    source
                )
            }
            CredentialError::Encode(err) => write!(f, "Failed to encode credentials: {err}"),
            CredentialError::Unavailable(reason) => {
                write!(f, "Credential storage unavailable: {reason}")
            }
        }
    }
}

impl Error for CredentialError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CredentialError::Recoverable(err) | CredentialError::Permanent(err) => Some(err),
            CredentialError::Io { source, .. } => Some(source),
            CredentialError::Parse { source, .. } => Some(source),
            CredentialError::Encode(err) => Some(err),
            CredentialError::Unavailable(_) => None,
        }
    }
}
