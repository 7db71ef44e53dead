//! Account identifier storage in the system keyring

use anyhow::{Context, Result};
use tracing::debug;

use skiff_core::ports::AccountStore;

/// [`AccountStore`] backed by the OS credential store
///
/// Each key becomes a keyring entry under the configured service name.
#[derive(Debug, Clone)]
pub struct KeyringAccountStore {
    service: String,
}

impl KeyringAccountStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&self.service, key).context("Failed to create keyring entry")
    }
}

impl AccountStore for KeyringAccountStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to read from keyring")),
        }
    }

    fn save(&self, key: &str, value: Option<&str>) -> Result<()> {
        let entry = self.entry(key)?;
        match value {
            Some(value) => {
                entry
                    .set_password(value)
                    .context("Failed to store account id in keyring")?;
                debug!(key, "Stored account id");
            }
            None => match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => debug!(key, "Cleared account id"),
                Err(e) => return Err(anyhow::Error::new(e).context("Failed to delete from keyring")),
            },
        }
        Ok(())
    }
}
