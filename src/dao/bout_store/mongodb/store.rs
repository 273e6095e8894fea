use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{Collection, Database, IndexModel, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult},
    models::{MongoBoutDocument, doc_id},
};
use crate::dao::{
    bout_store::BoutStore,
    models::{BoutEntity, BoutListItemEntity},
    storage::StorageResult,
};

const BOUT_COLLECTION_NAME: &str = "bouts";

/// Bout store backed by a MongoDB collection.
#[derive(Clone)]
pub struct MongoBoutStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let database =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        self.state.write().await.database = database;
        Ok(())
    }
}

impl MongoBoutStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let database = establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let index = IndexModel::builder()
            .keys(doc! {"updated_at": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("bout_updated_at_idx".to_owned()))
                    .build(),
            )
            .build();

        self.collection()
            .await
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: BOUT_COLLECTION_NAME,
                index: "updated_at",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<MongoBoutDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoBoutDocument>(BOUT_COLLECTION_NAME)
    }

    async fn save_bout(&self, bout: BoutEntity) -> MongoResult<()> {
        let id = bout.id;
        let document: MongoBoutDocument = bout.into();
        self.collection()
            .await
            .replace_one(doc_id(id), &document)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveBout { id, source })?;
        Ok(())
    }

    async fn find_bout(&self, id: Uuid) -> MongoResult<Option<BoutEntity>> {
        let document = self
            .collection()
            .await
            .find_one(doc_id(id))
            .await
            .map_err(|source| MongoDaoError::LoadBout { id, source })?;
        Ok(document.map(Into::into))
    }

    async fn latest_bout(&self) -> MongoResult<Option<BoutEntity>> {
        let document = self
            .collection()
            .await
            .find_one(doc! {})
            .sort(doc! {"updated_at": -1})
            .await
            .map_err(|source| MongoDaoError::LoadLatest { source })?;
        Ok(document.map(Into::into))
    }

    async fn list_bouts(&self) -> MongoResult<Vec<BoutListItemEntity>> {
        let documents: Vec<MongoBoutDocument> = self
            .collection()
            .await
            .find(doc! {})
            .sort(doc! {"updated_at": -1})
            .await
            .map_err(|source| MongoDaoError::ListBouts { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListBouts { source })?;

        Ok(documents
            .into_iter()
            .map(|document| BoutEntity::from(document).into())
            .collect())
    }
}

impl BoutStore for MongoBoutStore {
    fn save_bout(&self, bout: BoutEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.save_bout(bout).await.map_err(Into::into) })
    }

    fn find_bout(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<BoutEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.find_bout(id).await.map_err(Into::into) })
    }

    fn latest_bout(&self) -> BoxFuture<'static, StorageResult<Option<BoutEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.latest_bout().await.map_err(Into::into) })
    }

    fn list_bouts(&self) -> BoxFuture<'static, StorageResult<Vec<BoutListItemEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list_bouts().await.map_err(Into::into) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
