// src/crypto/secret_store.rs
// Abstraction over the OS-provided secret store so the keystore is testable
// without touching a real OS keychain.

use crate::error::{Result, WaddleError};
use std::collections::HashMap;
use std::sync::Mutex;

pub trait SecretStore: Send + Sync {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>>;
    fn set(&self, name: &str, payload: &[u8]) -> Result<()>;
}

/// Thin wrapper over the platform keychain (macOS Keychain / Linux Secret
/// Service) via the `keyring` crate.
pub struct KeyringSecretStore {
    service: String,
}

impl KeyringSecretStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }
}

impl SecretStore for KeyringSecretStore {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        let entry = keyring::Entry::new(&self.service, name)
            .map_err(|e| WaddleError::Encryption(format!("keyring entry: {e}")))?;
        match entry.get_secret() {
            Ok(bytes) => Ok(Some(bytes)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(WaddleError::Encryption(format!("keyring get: {e}"))),
        }
    }

    fn set(&self, name: &str, payload: &[u8]) -> Result<()> {
        let entry = keyring::Entry::new(&self.service, name)
            .map_err(|e| WaddleError::Encryption(format!("keyring entry: {e}")))?;
        entry
            .set_secret(payload)
            .map_err(|e| WaddleError::Encryption(format!("keyring set: {e}")))
    }
}

/// In-memory fake used by tests and by `Keystore::new_for_test`.
#[derive(Default)]
pub struct InMemorySecretStore {
    inner: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for InMemorySecretStore {
    fn get(&self, name: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.inner.lock().unwrap().get(name).cloned())
    }

    fn set(&self, name: &str, payload: &[u8]) -> Result<()> {
        self.inner
            .lock()
            .unwrap()
            .insert(name.to_string(), payload.to_vec());
        Ok(())
    }
}
