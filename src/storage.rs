use std::cell::RefCell;
use std::collections::HashMap;

use crate::error::{LeaderboardError, Result};

/// Synchronous string key-value storage, shaped after `window.localStorage`.
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> Result<()>;
}

/// `window.localStorage`. Looked up on every call so a page with storage
/// disabled degrades per call instead of at construction.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserStorage;

impl BrowserStorage {
    fn storage() -> Result<web_sys::Storage> {
        let window = web_sys::window().ok_or(LeaderboardError::StorageUnavailable)?;
        match window.local_storage() {
            Ok(Some(storage)) => Ok(storage),
            _ => Err(LeaderboardError::StorageUnavailable),
        }
    }
}

impl KeyValueStore for BrowserStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Self::storage()?
            .get_item(key)
            .map_err(|e| LeaderboardError::Storage(format!("{e:?}")))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        // Throws QuotaExceededError when full.
        Self::storage()?
            .set_item(key, value)
            .map_err(|e| LeaderboardError::Storage(format!("{e:?}")))
    }
}

/// In-process storage for hosts without a browser.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: RefCell<HashMap<String, String>>,
    fail_reads: bool,
    fail_writes: bool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail, like a full or locked-down localStorage.
    pub fn read_only() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    /// A store whose reads and writes both fail, like storage blocked by privacy settings.
    pub fn unreadable() -> Self {
        Self {
            fail_reads: true,
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn insert_raw(&self, key: &str, value: &str) {
        self.items
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
    }

    /// The stored value, bypassing any simulated failure.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }
}

impl KeyValueStore for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads {
            return Err(LeaderboardError::Storage("SecurityError".into()));
        }
        Ok(self.raw(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes {
            return Err(LeaderboardError::Storage("quota exceeded".into()));
        }
        self.insert_raw(key, value);
        Ok(())
    }
}
