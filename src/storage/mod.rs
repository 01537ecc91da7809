//! Persistence for accounts and per-user lists.
//!
//! The stores above this module only see the [`Storage`] trait; the
//! JSON-file backend is what the server runs on, the in-memory one backs
//! tests.

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileStorage;
pub use memory::MemoryStorage;
pub use traits::{AccountMap, AccountRecord, Storage, StorageError};

use std::path::Path;
use std::sync::Arc;

/// Open the file-backed store rooted at `data_dir`.
pub fn create_storage(data_dir: &Path) -> Result<Arc<dyn Storage>, StorageError> {
    let storage = FileStorage::open(data_dir)?;
    tracing::info!(
        backend = storage.name(),
        data_dir = %data_dir.display(),
        "Storage ready"
    );
    Ok(Arc::new(storage))
}
