//! In-process storage backend. Nothing survives a restart; used by tests
//! and by callers that want the stores without touching disk.

use super::traits::{AccountMap, Storage, StorageError};
use crate::list::Item;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct MemoryStorage {
    accounts: Mutex<AccountMap>,
    lists: Mutex<HashMap<String, Vec<Item>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a list has ever been written for `username`.
    pub fn has_list(&self, username: &str) -> bool {
        self.lists.lock().contains_key(username)
    }
}

impl Storage for MemoryStorage {
    fn name(&self) -> &str {
        "memory"
    }

    fn load_accounts(&self) -> Result<AccountMap, StorageError> {
        Ok(self.accounts.lock().clone())
    }

    fn save_accounts(&self, accounts: &AccountMap) -> Result<(), StorageError> {
        *self.accounts.lock() = accounts.clone();
        Ok(())
    }

    fn load_list(&self, username: &str) -> Result<Option<Vec<Item>>, StorageError> {
        Ok(self.lists.lock().get(username).cloned())
    }

    fn save_list(&self, username: &str, items: &[Item]) -> Result<(), StorageError> {
        self.lists.lock().insert(username.to_owned(), items.to_vec());
        Ok(())
    }
}
