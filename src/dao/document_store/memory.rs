use std::{
    collections::BTreeMap,
    io,
    ops::Bound,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use futures::future::BoxFuture;
use tokio::sync::RwLock;

use crate::dao::{
    document::{DocPath, Document, Millis, WriteBatch, apply_write},
    document_store::DocumentStore,
    storage::{StorageError, StorageResult},
};

/// Process-local store keeping every document in an ordered map keyed by its path.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    documents: Arc<RwLock<BTreeMap<String, Document>>>,
    offline: Arc<AtomicBool>,
}

impl MemoryDocumentStore {
    /// Empty, online store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every operation fails until the store is brought back online.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn ensure_online(&self) -> StorageResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StorageError::unavailable(
                "in-memory store is offline".into(),
                io::Error::new(io::ErrorKind::NotConnected, "offline"),
            ))
        } else {
            Ok(())
        }
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn get(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<Document>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let guard = store.documents.read().await;
            Ok(guard.get(path.as_str()).cloned())
        })
    }

    fn list(
        &self,
        collection: DocPath,
    ) -> BoxFuture<'static, StorageResult<Vec<(String, Document)>>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let prefix = format!("{}/", collection.as_str());
            let guard = store.documents.read().await;
            let children = guard
                .range::<String, _>((Bound::Included(&prefix), Bound::Unbounded))
                .take_while(|(key, _)| key.starts_with(&prefix))
                .filter(|(key, _)| !key[prefix.len()..].contains('/'))
                .map(|(key, document)| (key[prefix.len()..].to_owned(), document.clone()))
                .collect();
            Ok(children)
        })
    }

    fn commit(
        &self,
        batch: WriteBatch,
        committed_at: Millis,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.ensure_online()?;
            let mut guard = store.documents.write().await;

            // Stage every write first so a failing op leaves the map untouched.
            let mut staged: BTreeMap<String, Option<Document>> = BTreeMap::new();
            for op in batch.ops() {
                let key = op.path().as_str();
                let current = match staged.get(key) {
                    Some(pending) => pending.clone(),
                    None => guard.get(key).cloned(),
                };
                let next = apply_write(current, op, committed_at)?;
                staged.insert(key.to_owned(), next);
            }

            for (key, next) in staged {
                match next {
                    Some(document) => {
                        guard.insert(key, document);
                    }
                    None => {
                        guard.remove(&key);
                    }
                }
            }
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_online() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::document::Fields;
    use serde_json::json;

    fn path(raw: &str) -> DocPath {
        DocPath::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn lists_direct_children_only() {
        let store = MemoryDocumentStore::new();
        let mut batch = WriteBatch::new();
        batch
            .set(path("rooms/R/players/p1"), Fields::new().value("name", "Ada"))
            .set(path("rooms/R/players/p2"), Fields::new().value("name", "Bo"))
            .set(path("rooms/R/players/p2/extra/x"), Fields::new())
            .set(path("rooms/R/playersX/p3"), Fields::new());
        store.commit(batch, 1).await.unwrap();

        let players = store.list(path("rooms/R/players")).await.unwrap();
        let ids: Vec<_> = players.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2"]);
        assert_eq!(players[0].1["name"], json!("Ada"));
    }

    #[tokio::test]
    async fn failing_batch_leaves_documents_untouched() {
        let store = MemoryDocumentStore::new();
        let mut seed = WriteBatch::new();
        seed.set(path("rooms/R"), Fields::new().value("phase", "lobby"));
        store.commit(seed, 1).await.unwrap();

        let mut batch = WriteBatch::new();
        batch
            .merge(path("rooms/R"), Fields::new().value("phase", "collect"))
            .create(path("rooms/R"), Fields::new());
        assert!(store.commit(batch, 2).await.is_err());

        let room = store.get(path("rooms/R")).await.unwrap().unwrap();
        assert_eq!(room["phase"], json!("lobby"));
    }

    #[tokio::test]
    async fn offline_store_reports_unavailable() {
        let store = MemoryDocumentStore::new();
        store.set_offline(true);
        assert!(matches!(
            store.health_check().await,
            Err(StorageError::Unavailable { .. })
        ));
        store.set_offline(false);
        assert!(store.health_check().await.is_ok());
    }
}
