//! Per-user list operations over a [`Storage`] backend.
//!
//! Every operation is a full cycle: load the user's list, change it in
//! memory, write the whole list back. Cycles for the same user are
//! serialized by a per-user lock, so two requests from one account cannot
//! interleave and drop each other's writes inside this process.

use super::item::{generate_id, Item, ItemPatch, NewItem};
use crate::storage::{Storage, StorageError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors from list operations.
#[derive(Error, Debug)]
pub enum ListError {
    #[error("title is required")]
    MissingTitle,

    #[error("item not found")]
    ItemNotFound(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Per-user show lists.
pub struct ListStore {
    storage: Arc<dyn Storage>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ListStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Current items, creating an empty list on first access.
    pub fn list(&self, username: &str) -> Result<Vec<Item>, ListError> {
        let lock = self.user_lock(username);
        let _guard = lock.lock();
        self.load(username)
    }

    /// Same contents as [`Self::list`]; backs the download endpoint.
    pub fn export(&self, username: &str) -> Result<Vec<Item>, ListError> {
        self.list(username)
    }

    /// Append a new item. The title must be non-blank and is stored trimmed.
    pub fn add_item(&self, username: &str, new: NewItem) -> Result<Item, ListError> {
        let title = non_blank_title(new.title.as_deref()).ok_or(ListError::MissingTitle)?;

        let lock = self.user_lock(username);
        let _guard = lock.lock();
        let mut items = self.load(username)?;

        let mut id = generate_id();
        while items.iter().any(|i| i.id == id) {
            id = generate_id();
        }

        let item = Item {
            id,
            title,
            seasons: new.seasons.unwrap_or_default(),
            episodes: new.episodes.unwrap_or_default(),
            watched: new.watched.unwrap_or(false),
        };
        items.push(item.clone());
        self.storage.save_list(username, &items)?;

        tracing::info!(username, id = %item.id, "Item added");
        Ok(item)
    }

    /// Overwrite the fields present in `patch` on the item with `id`.
    pub fn update_item(
        &self,
        username: &str,
        id: &str,
        mut patch: ItemPatch,
    ) -> Result<Item, ListError> {
        if let Some(title) = patch.title.take() {
            patch.title = Some(non_blank_title(Some(&title)).ok_or(ListError::MissingTitle)?);
        }

        let lock = self.user_lock(username);
        let _guard = lock.lock();
        let mut items = self.load(username)?;

        let item = items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| ListError::ItemNotFound(id.to_owned()))?;
        if patch.is_empty() {
            return Ok(item.clone());
        }
        patch.apply(item);
        let updated = item.clone();

        self.storage.save_list(username, &items)?;

        tracing::info!(username, id, "Item updated");
        Ok(updated)
    }

    /// Remove the item with `id`. Returns whether anything was removed;
    /// deleting an unknown id is not an error.
    pub fn delete_item(&self, username: &str, id: &str) -> Result<bool, ListError> {
        let lock = self.user_lock(username);
        let _guard = lock.lock();
        let mut items = self.load(username)?;

        let before = items.len();
        items.retain(|i| i.id != id);
        let removed = items.len() != before;

        self.storage.save_list(username, &items)?;

        if removed {
            tracing::info!(username, id, "Item deleted");
        } else {
            tracing::debug!(username, id, "Delete of unknown item ignored");
        }
        Ok(removed)
    }

    fn load(&self, username: &str) -> Result<Vec<Item>, ListError> {
        if let Some(items) = self.storage.load_list(username)? {
            return Ok(items);
        }
        self.storage.save_list(username, &[])?;
        tracing::debug!(username, "Created empty list on first access");
        Ok(Vec::new())
    }

    fn user_lock(&self, username: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock();
        Arc::clone(locks.entry(username.to_owned()).or_default())
    }
}

fn non_blank_title(title: Option<&str>) -> Option<String> {
    let trimmed = title?.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
