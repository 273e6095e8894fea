mod config;
mod error;
mod store;

pub use config::FileStoreConfig;
pub use error::FileStoreError;
pub use store::FileBoutStore;

use crate::dao::storage::StorageError;

impl From<FileStoreError> for StorageError {
    fn from(err: FileStoreError) -> Self {
        match err {
            FileStoreError::Decode { .. } => StorageError::corrupted(err.to_string(), err),
            _ => StorageError::unavailable(err.to_string(), err),
        }
    }
}
