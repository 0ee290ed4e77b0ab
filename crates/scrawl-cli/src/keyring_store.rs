//! Token storage in the OS keychain.

#[cfg(test)]
use std::collections::HashMap;
#[cfg(test)]
use std::sync::{Mutex, OnceLock};

#[cfg(not(test))]
use keyring::Entry;
use scrawl_core::store::KeyValueStore;
use scrawl_core::{Error, Result};

#[cfg(not(test))]
const KEYRING_SERVICE_NAME: &str = "scrawl-cli";

/// One keychain entry per key, scoped to the API the tokens belong to.
#[derive(Debug, Clone)]
pub struct KeyringStore {
    scope: String,
}

impl KeyringStore {
    pub fn new(api_base_url: &str) -> Self {
        Self {
            scope: api_base_url.to_string(),
        }
    }

    fn username(&self, key: &str) -> String {
        format!("{key}@{}", self.scope)
    }

    #[cfg(test)]
    fn test_store() -> &'static Mutex<HashMap<String, String>> {
        static STORE: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        STORE.get_or_init(|| Mutex::new(HashMap::new()))
    }

    #[cfg(not(test))]
    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(KEYRING_SERVICE_NAME, &self.username(key)).map_err(keychain_error)
    }
}

#[cfg(not(test))]
impl KeyValueStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(keychain_error(error)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(keychain_error)
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(keychain_error(error)),
        }
    }
}

#[cfg(test)]
impl KeyValueStore for KeyringStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let guard = Self::test_store().lock().map_err(keychain_error)?;
        Ok(guard.get(&self.username(key)).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut guard = Self::test_store().lock().map_err(keychain_error)?;
        guard.insert(self.username(key), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut guard = Self::test_store().lock().map_err(keychain_error)?;
        guard.remove(&self.username(key));
        Ok(())
    }
}

fn keychain_error(error: impl std::fmt::Display) -> Error {
    Error::Persistence(format!("keychain: {error}"))
}
