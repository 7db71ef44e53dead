//! Persisted account identifier storage
//!
//! The only state the adapter persists across process restarts is the
//! identifier of the authenticated account, keyed per adapter instance.

use std::collections::HashMap;
use std::sync::Mutex;

/// Port trait for a durable string key-value store
pub trait AccountStore: Send + Sync {
    /// Loads the value stored under `key`
    fn load(&self, key: &str) -> anyhow::Result<Option<String>>;

    /// Stores `value` under `key`, or removes the key when `value` is `None`
    fn save(&self, key: &str, value: Option<&str>) -> anyhow::Result<()>;
}

/// Process-local [`AccountStore`], useful for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryAccountStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountStore for MemoryAccountStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("account store lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn save(&self, key: &str, value: Option<&str>) -> anyhow::Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| anyhow::anyhow!("account store lock poisoned"))?;
        match value {
            Some(value) => {
                values.insert(key.to_string(), value.to_string());
            }
            None => {
                values.remove(key);
            }
        }
        Ok(())
    }
}
