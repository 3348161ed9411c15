use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, StatusCode};

use crate::dao::{
    document::{DocPath, Document, Millis, WriteBatch, apply_write},
    document_store::DocumentStore,
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{CouchRootDocument, root_doc_id},
};

/// CouchDB-backed document store: one revisioned CouchDB document per room root.
#[derive(Clone)]
pub struct CouchDocumentStore {
    client: Client,
    config: Arc<CouchConfig>,
}

impl CouchDocumentStore {
    /// Build the HTTP client and make sure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;
        let store = Self {
            client,
            config: Arc::new(config),
        };
        store.ensure_database().await?;
        Ok(store)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.config.credentials {
            Some(creds) => builder.basic_auth(&creds.username, Some(&creds.password)),
            None => builder,
        }
    }

    fn request(&self, method: Method, doc_id: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.config.database_url(), doc_id);
        self.authorized(self.client.request(method, url))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let url = self.config.database_url();
        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(CouchDaoError::http("database lookup", &url))?;

        let status = match response.status() {
            StatusCode::NOT_FOUND => self
                .authorized(self.client.put(&url))
                .send()
                .await
                .map_err(CouchDaoError::http("database creation", &url))?
                .status(),
            other => other,
        };
        if status.is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::Status {
                target: self.config.database.clone(),
                status,
            })
        }
    }

    async fn load_root(&self, root: &DocPath) -> CouchResult<Option<CouchRootDocument>> {
        let doc_id = root_doc_id(root);
        let response = self
            .request(Method::GET, &doc_id)
            .send()
            .await
            .map_err(CouchDaoError::http("read", &doc_id))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => response
                .json::<CouchRootDocument>()
                .await
                .map(Some)
                .map_err(CouchDaoError::http("decode", doc_id)),
            other => Err(CouchDaoError::Status {
                target: doc_id,
                status: other,
            }),
        }
    }

    async fn store_root(&self, document: &CouchRootDocument) -> CouchResult<()> {
        let response = self
            .request(Method::PUT, &document.id)
            .json(document)
            .send()
            .await
            .map_err(CouchDaoError::http("write", &document.id))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(CouchDaoError::RevisionConflict {
                doc_id: document.id.clone(),
            }),
            other => Err(CouchDaoError::Status {
                target: document.id.clone(),
                status: other,
            }),
        }
    }

    async fn commit_batch(&self, batch: WriteBatch, committed_at: Millis) -> StorageResult<()> {
        let roots = batch.roots();
        let [root] = roots.as_slice() else {
            return Err(StorageError::InvalidBatch(
                "CouchDB batches must target a single root".into(),
            ));
        };

        let mut aggregate = self
            .load_root(root)
            .await?
            .unwrap_or_else(|| CouchRootDocument::empty(root_doc_id(root)));

        for op in batch.ops() {
            let key = op.path().as_str();
            let current = aggregate.documents.remove(key);
            if let Some(next) = apply_write(current, op, committed_at)? {
                aggregate.documents.insert(key.to_owned(), next);
            }
        }

        if aggregate.rev.is_none() && aggregate.documents.is_empty() {
            return Ok(());
        }
        self.store_root(&aggregate).await?;
        Ok(())
    }
}

impl DocumentStore for CouchDocumentStore {
    fn get(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        let store = self.clone();
        Box::pin(async move {
            let aggregate = store.load_root(&path.root()).await?;
            Ok(aggregate.and_then(|mut doc| doc.documents.remove(path.as_str())))
        })
    }

    fn list(
        &self,
        collection: DocPath,
    ) -> BoxFuture<'static, StorageResult<Vec<(String, Document)>>> {
        let store = self.clone();
        Box::pin(async move {
            let aggregate = store.load_root(&collection.root()).await?;
            Ok(aggregate
                .map(|doc| doc.children(&collection))
                .unwrap_or_default())
        })
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
        Box::pin(async move {
            let url = store.config.database_url();
            let response = store
                .authorized(store.client.get(&url))
                .send()
                .await
                .map_err(CouchDaoError::http("health check", &url))?;

            match response.status() {
                status if status.is_success() => Ok(()),
                status => Err(CouchDaoError::Status { target: url, status }.into()),
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
