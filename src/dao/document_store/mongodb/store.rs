use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{ClientSession, Collection, bson::doc, options::IndexOptions};
use tokio::sync::RwLock;
use tracing::warn;

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::{MongoPathDocument, children_filter, path_filter},
};
use crate::dao::{
    document::{DocPath, Document, Millis, WriteBatch, apply_write},
    document_store::DocumentStore,
    storage::StorageResult,
};

const DOCUMENT_COLLECTION_NAME: &str = "documents";

/// MongoDB-backed document store. Batches run inside a multi-document transaction,
/// which requires the server to run as a replica set.
#[derive(Clone)]
pub struct MongoDocumentStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    client: mongodb::Client,
    database: mongodb::Database,
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
        let (client, database) = self.config.open().await?;
        let mut guard = self.state.write().await;
        guard.client = client;
        guard.database = database;
        Ok(())
    }
}

impl MongoDocumentStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (client, database) = config.open().await?;

        let store = Self {
            inner: Arc::new(MongoInner {
                state: RwLock::new(MongoState { client, database }),
                config,
            }),
        };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;
        let index = mongodb::IndexModel::builder()
            .keys(doc! { "parent": 1 })
            .options(
                IndexOptions::builder()
                    .name(Some("document_parent_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                index: "document_parent_idx",
                source,
            })?;
        Ok(())
    }

    async fn collection(&self) -> Collection<MongoPathDocument> {
        let guard = self.inner.state.read().await;
        guard
            .database
            .collection::<MongoPathDocument>(DOCUMENT_COLLECTION_NAME)
    }

    async fn client(&self) -> mongodb::Client {
        let guard = self.inner.state.read().await;
        guard.client.clone()
    }

    async fn find(&self, path: DocPath) -> MongoResult<Option<Document>> {
        let collection = self.collection().await;
        let found = collection
            .find_one(path_filter(&path))
            .await
            .map_err(MongoDaoError::document("read", &path))?;
        Ok(found.map(|document| document.data))
    }

    async fn children(&self, collection_path: DocPath) -> MongoResult<Vec<(String, Document)>> {
        let collection = self.collection().await;
        let documents: Vec<MongoPathDocument> = collection
            .find(children_filter(&collection_path))
            .sort(doc! { "_id": 1 })
            .await
            .map_err(MongoDaoError::document("list", &collection_path))?
            .try_collect()
            .await
            .map_err(MongoDaoError::document("list", &collection_path))?;

        Ok(documents
            .into_iter()
            .filter_map(|document| {
                let id = DocPath::parse(&document.path).ok()?.id().to_owned();
                Some((id, document.data))
            })
            .collect())
    }

    async fn commit_batch(&self, batch: WriteBatch, committed_at: Millis) -> StorageResult<()> {
        let client = self.client().await;
        let collection = self.collection().await;

        let mut session = client
            .start_session()
            .await
            .map_err(|source| MongoDaoError::Transaction {
                stage: "start_session",
                source,
            })?;
        session
            .start_transaction()
            .await
            .map_err(|source| MongoDaoError::Transaction {
                stage: "start_transaction",
                source,
            })?;

        match apply_ops(&collection, &mut session, &batch, committed_at).await {
            Ok(()) => {
                session
                    .commit_transaction()
                    .await
                    .map_err(|source| MongoDaoError::Transaction {
                        stage: "commit_transaction",
                        source,
                    })?;
                Ok(())
            }
            Err(err) => {
                if let Err(abort_err) = session.abort_transaction().await {
                    warn!(error = %abort_err, "failed to abort MongoDB transaction");
                }
                Err(err)
            }
        }
    }
}

async fn apply_ops(
    collection: &Collection<MongoPathDocument>,
    session: &mut ClientSession,
    batch: &WriteBatch,
    committed_at: Millis,
) -> StorageResult<()> {
    for op in batch.ops() {
        let path = op.path();
        let current = collection
            .find_one(path_filter(path))
            .session(&mut *session)
            .await
            .map_err(MongoDaoError::document("read", path))?
            .map(|document| document.data);

        match apply_write(current, op, committed_at)? {
            Some(next) => {
                collection
                    .replace_one(path_filter(path), MongoPathDocument::new(path, next))
                    .upsert(true)
                    .session(&mut *session)
                    .await
                    .map_err(MongoDaoError::document("write", path))?;
            }
            None => {
                collection
                    .delete_one(path_filter(path))
                    .session(&mut *session)
                    .await
                    .map_err(MongoDaoError::document("write", path))?;
            }
        }
    }
    Ok(())
}

impl DocumentStore for MongoDocumentStore {
    fn get(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        let store = self.clone();
        Box::pin(async move { store.find(path).await.map_err(Into::into) })
    }

    fn list(
        &self,
        collection: DocPath,
    ) -> BoxFuture<'static, StorageResult<Vec<(String, Document)>>> {
        let store = self.clone();
        Box::pin(async move { store.children(collection).await.map_err(Into::into) })
    }

    fn commit(
        &self,
        batch: WriteBatch,
        committed_at: Millis,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.commit_batch(batch, committed_at).await })
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
