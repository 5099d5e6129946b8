//! Bearer credential lookup for relay calls.
//!
//! The relay asks for exactly one token per call and never caches it.
//! Acquiring and storing credentials is handled outside this crate; this
//! module only reads what is already there.

use std::env;
use tracing::debug;

pub const KEYRING_SERVICE: &str = "devdoc";
pub const KEYRING_USER: &str = "backend";
pub const API_KEY_ENV: &str = "DEVDOC_API_KEY";

/// Failures when attempting to access the system keyring.
///
/// Recoverable errors indicate that the credential backend was temporarily
/// unavailable (for example when the keychain service is locked). Permanent
/// errors surface the underlying cause directly.
#[derive(Debug, thiserror::Error)]
pub enum KeyringAccessError {
    #[error(transparent)]
    Recoverable(keyring::Error),
    #[error(transparent)]
    Permanent(keyring::Error),
}

impl KeyringAccessError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, KeyringAccessError::Recoverable(_))
    }
}

impl From<keyring::Error> for KeyringAccessError {
    fn from(err: keyring::Error) -> Self {
        match err {
            keyring::Error::PlatformFailure(_) | keyring::Error::NoStorageAccess(_) => {
                KeyringAccessError::Recoverable(err)
            }
            other => KeyringAccessError::Permanent(other),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("no API credential found; store one in the system keyring (service 'devdoc', user 'backend') or set DEVDOC_API_KEY")]
    Missing,
    #[error("keyring unavailable: {0}")]
    Keyring(#[from] KeyringAccessError),
}

pub trait CredentialSource: Send + Sync {
    fn bearer_token(&self) -> Result<String, CredentialError>;
}

/// Reads the token from the system keyring, falling back to
/// `DEVDOC_API_KEY`.
pub struct KeyringCredentials {
    use_keyring: bool,
}

impl KeyringCredentials {
    pub fn new() -> Self {
        Self::new_with_keyring(true)
    }

    /// Construct a source, optionally disabling keyring access (useful for tests)
    pub fn new_with_keyring(use_keyring: bool) -> Self {
        Self { use_keyring }
    }

    fn read_keyring(&self) -> Result<Option<String>, KeyringAccessError> {
        if !self.use_keyring {
            return Ok(None);
        }
        let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
        match entry.get_password() {
            Ok(token) => Ok(Some(token)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl Default for KeyringCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialSource for KeyringCredentials {
    fn bearer_token(&self) -> Result<String, CredentialError> {
        let keyring_result = self.read_keyring();
        match keyring_result {
            Ok(Some(token)) if !token.trim().is_empty() => return Ok(token.trim().to_string()),
            Ok(_) => {}
            Err(err) if err.is_recoverable() => {
                debug!(error = %err, "Keyring temporarily unavailable, trying environment");
            }
            Err(err) => return Err(err.into()),
        }

        env::var(API_KEY_ENV)
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .ok_or(CredentialError::Missing)
    }
}

/// Fixed token, for embedding and tests.
#[derive(Clone)]
pub struct StaticCredentials(Option<String>);

impl StaticCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn none() -> Self {
        Self(None)
    }
}

impl CredentialSource for StaticCredentials {
    fn bearer_token(&self) -> Result<String, CredentialError> {
        self.0.clone().ok_or(CredentialError::Missing)
    }
}
