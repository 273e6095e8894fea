#[cfg(feature = "couch-store")]
pub mod couchdb;
#[cfg(feature = "file-store")]
pub mod file;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use crate::dao::models::{BoutEntity, BoutListItemEntity};
use crate::dao::storage::StorageResult;
use futures::future::BoxFuture;
use uuid::Uuid;

/// Abstraction over the persistence layer for bout snapshots.
pub trait BoutStore: Send + Sync {
    /// Insert or replace the snapshot of a bout.
    fn save_bout(&self, bout: BoutEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Load the snapshot of a bout.
    fn find_bout(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<BoutEntity>>>;
    /// Most recently saved bout, used to resume after a restart.
    fn latest_bout(&self) -> BoxFuture<'static, StorageResult<Option<BoutEntity>>>;
    /// Summaries of every stored bout, most recent first.
    fn list_bouts(&self) -> BoxFuture<'static, StorageResult<Vec<BoutListItemEntity>>>;
    /// Cheap liveness check.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
