use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

use futures::future::BoxFuture;
use tokio::fs;
use tracing::warn;
use uuid::Uuid;

use crate::dao::{
    bout_store::BoutStore,
    models::{BoutEntity, BoutListItemEntity},
    storage::StorageResult,
};

use super::{
    config::FileStoreConfig,
    error::{FileResult, FileStoreError},
};

const FILE_PREFIX: &str = "bout-";
const FILE_EXTENSION: &str = "json";

/// Keeps one pretty-printed JSON snapshot per bout in a directory.
#[derive(Clone)]
pub struct FileBoutStore {
    dir: Arc<Path>,
}

impl FileBoutStore {
    /// Open the store, creating the data directory when needed.
    pub async fn open(config: FileStoreConfig) -> FileResult<Self> {
        let store = Self {
            dir: Arc::from(config.dir),
        };
        store.ensure_dir().await?;
        Ok(store)
    }

    async fn ensure_dir(&self) -> FileResult<()> {
        fs::create_dir_all(&*self.dir)
            .await
            .map_err(|source| FileStoreError::CreateDir {
                path: self.dir.to_path_buf(),
                source,
            })
    }

    fn bout_path(&self, id: Uuid) -> PathBuf {
        self.dir.join(format!("{FILE_PREFIX}{id}.{FILE_EXTENSION}"))
    }

    /// Write to a sibling temp file, then rename over the snapshot so readers never see a torn file.
    async fn write_bout(&self, bout: &BoutEntity) -> FileResult<()> {
        let payload = serde_json::to_vec_pretty(bout).map_err(|source| FileStoreError::Encode {
            id: bout.id,
            source,
        })?;

        let path = self.bout_path(bout.id);
        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        fs::write(&temp_path, &payload)
            .await
            .map_err(|source| FileStoreError::Write {
                path: temp_path.clone(),
                source,
            })?;
        fs::rename(&temp_path, &path)
            .await
            .map_err(|source| FileStoreError::Write { path, source })
    }

    async fn read_bout(&self, path: &Path) -> FileResult<Option<BoutEntity>> {
        let contents = match fs::read(path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(FileStoreError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        serde_json::from_slice(&contents)
            .map(Some)
            .map_err(|source| FileStoreError::Decode {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Every readable snapshot, most recent first. Unreadable files are skipped.
    async fn read_all(&self) -> FileResult<Vec<BoutEntity>> {
        let read_dir_error = |source| FileStoreError::ReadDir {
            path: self.dir.to_path_buf(),
            source,
        };

        let mut entries = fs::read_dir(&*self.dir).await.map_err(read_dir_error)?;
        let mut bouts = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(read_dir_error)? {
            let path = entry.path();
            if !is_snapshot(&path) {
                continue;
            }
            match self.read_bout(&path).await {
                Ok(Some(bout)) => bouts.push(bout),
                Ok(None) => {}
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable bout snapshot");
                }
            }
        }

        bouts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(bouts)
    }

    async fn check_dir(&self) -> FileResult<()> {
        match fs::metadata(&*self.dir).await {
            Ok(metadata) if metadata.is_dir() => Ok(()),
            _ => Err(FileStoreError::MissingDir {
                path: self.dir.to_path_buf(),
            }),
        }
    }
}

fn is_snapshot(path: &Path) -> bool {
    let named_like_bout = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(FILE_PREFIX));
    named_like_bout && path.extension().is_some_and(|ext| ext == FILE_EXTENSION)
}

impl BoutStore for FileBoutStore {
    fn save_bout(&self, bout: BoutEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.write_bout(&bout).await.map_err(Into::into) })
    }

    fn find_bout(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<BoutEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let path = store.bout_path(id);
            store.read_bout(&path).await.map_err(Into::into)
        })
    }

    fn latest_bout(&self) -> BoxFuture<'static, StorageResult<Option<BoutEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let bouts = store.read_all().await?;
            Ok(bouts.into_iter().next())
        })
    }

    fn list_bouts(&self) -> BoxFuture<'static, StorageResult<Vec<BoutListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let bouts = store.read_all().await?;
            Ok(bouts.into_iter().map(Into::into).collect())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.check_dir().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_dir().await.map_err(Into::into) })
    }
}
