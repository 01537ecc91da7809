//! JSON-file storage backend.
//!
//! Layout under the data directory:
//! - `users.json`: the account map
//! - `lists/<safe>-<hash>.json`: one list per user
//!
//! `<safe>` is the username with every character outside `[A-Za-z0-9_-]`
//! replaced by `_`; `<hash>` is the first 8 bytes of SHA-256 over the raw
//! username, so names that sanitize identically still get distinct files.
//!
//! Writes go to a temp file in the target directory and are renamed into
//! place, so a crashed write never leaves a half-written file behind.

use super::traits::{AccountMap, Storage, StorageError};
use crate::list::Item;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File name of the account map inside the data directory.
pub const ACCOUNTS_FILE: &str = "users.json";

/// Directory holding per-user list files.
pub const LISTS_DIR: &str = "lists";

/// Longest sanitized prefix kept in a list file name.
const MAX_SAFE_PREFIX: usize = 64;

/// Bytes of the username digest appended to list file names.
const NAME_HASH_BYTES: usize = 8;

/// Flat-file store rooted at a data directory.
pub struct FileStorage {
    root: PathBuf,
    accounts_path: PathBuf,
    lists_dir: PathBuf,
}

impl FileStorage {
    /// Open (or create) the store at `root`, making sure the directory
    /// tree and an empty account map exist.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        let lists_dir = root.join(LISTS_DIR);
        fs::create_dir_all(&lists_dir).map_err(|source| StorageError::Io {
            path: lists_dir.clone(),
            source,
        })?;

        let storage = Self {
            accounts_path: root.join(ACCOUNTS_FILE),
            lists_dir,
            root,
        };

        if !storage.accounts_path.exists() {
            storage.save_accounts(&AccountMap::new())?;
            tracing::info!(
                path = %storage.accounts_path.display(),
                "Initialized empty account map"
            );
        }

        Ok(storage)
    }

    /// The data directory this store writes under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the list file for `username`.
    pub fn list_path(&self, username: &str) -> PathBuf {
        self.lists_dir.join(list_file_name(username))
    }
}

impl Storage for FileStorage {
    fn name(&self) -> &str {
        "file"
    }

    fn load_accounts(&self) -> Result<AccountMap, StorageError> {
        Ok(read_json(&self.accounts_path)?.unwrap_or_default())
    }

    fn save_accounts(&self, accounts: &AccountMap) -> Result<(), StorageError> {
        write_json(&self.accounts_path, accounts)
    }

    fn load_list(&self, username: &str) -> Result<Option<Vec<Item>>, StorageError> {
        read_json(&self.list_path(username))
    }

    fn save_list(&self, username: &str, items: &[Item]) -> Result<(), StorageError> {
        write_json(&self.list_path(username), items)
    }
}

/// Filesystem-safe, collision-free file name for a user's list.
pub fn list_file_name(username: &str) -> String {
    let safe: String = username
        .chars()
        .take(MAX_SAFE_PREFIX)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let digest = Sha256::digest(username.as_bytes());
    format!("{safe}-{}.json", hex::encode(&digest[..NAME_HASH_BYTES]))
}

/// Read a JSON file. Missing files read as `None`, blank files as the default value.
fn read_json<T: DeserializeOwned + Default>(path: &Path) -> Result<Option<T>, StorageError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StorageError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if raw.trim().is_empty() {
        return Ok(Some(T::default()));
    }

    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| StorageError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    let mut body = serde_json::to_vec_pretty(value)?;
    body.push(b'\n');

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let io_err = |source: io::Error| StorageError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(&body).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}
