use crate::list::Item;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use thiserror::Error;

/// Persisted form of one account. The username is the map key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    /// Opaque credential produced by a [`crate::auth::PasswordHasher`].
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Username -> account, serialized as one JSON object.
pub type AccountMap = BTreeMap<String, AccountRecord>;

/// Errors raised by a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but does not hold the expected JSON shape.
    #[error("corrupt data in {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Backend for the account map and the per-user lists.
///
/// Every call is a whole-value read or write; callers do their own
/// read-modify-write and serialize it where they need to.
pub trait Storage: Send + Sync {
    /// Backend name, used in startup logs.
    fn name(&self) -> &str;

    /// Load the full account map. A store that has never been written reads as empty.
    fn load_accounts(&self) -> Result<AccountMap, StorageError>;

    /// Replace the full account map.
    fn save_accounts(&self, accounts: &AccountMap) -> Result<(), StorageError>;

    /// Load one user's list, or `None` if it has never been written.
    fn load_list(&self, username: &str) -> Result<Option<Vec<Item>>, StorageError>;

    /// Replace one user's list.
    fn save_list(&self, username: &str, items: &[Item]) -> Result<(), StorageError>;
}
