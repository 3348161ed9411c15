/// CouchDB backend, one revisioned document per room.
#[cfg(feature = "couch-store")]
pub mod couchdb;
/// Process-local backend used by default and in tests.
pub mod memory;
/// MongoDB backend, one document per path.
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use futures::future::BoxFuture;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tracing::debug;

use crate::dao::{
    document::{DocPath, Document, Millis, WriteBatch},
    storage::{StorageError, StorageResult},
};

/// Abstraction over the document database backing every room.
///
/// Implementations must apply [`WriteBatch`]es atomically: either every write lands or none does.
pub trait DocumentStore: Send + Sync {
    /// Document at `path`, `None` when absent.
    fn get(&self, path: DocPath) -> BoxFuture<'static, StorageResult<Option<Document>>>;
    /// Documents stored directly under `collection`, keyed by their id.
    fn list(&self, collection: DocPath)
    -> BoxFuture<'static, StorageResult<Vec<(String, Document)>>>;
    /// Apply `batch` atomically, resolving server timestamps to `committed_at`.
    fn commit(
        &self,
        batch: WriteBatch,
        committed_at: Millis,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap round trip proving the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Notification published after every successful commit.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    /// Root document the batch was confined to.
    pub root: DocPath,
    /// Every path the batch wrote or deleted.
    pub paths: Vec<DocPath>,
    /// Commit timestamp of the batch.
    pub committed_at: Millis,
}

/// Fan-out channel carrying [`ChangeSet`]s to subscribers.
#[derive(Clone)]
pub struct ChangeFeed {
    sender: broadcast::Sender<ChangeSet>,
}

impl ChangeFeed {
    /// Feed buffering up to `capacity` changes per lagging subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Receive every change published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.sender.subscribe()
    }

    fn publish(&self, change: ChangeSet) {
        let _ = self.sender.send(change);
    }
}

/// Timestamp source that never returns the same or an earlier value twice.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: AtomicI64,
}

impl MonotonicClock {
    /// Current wall time in milliseconds, bumped past the previous tick.
    pub fn tick(&self) -> Millis {
        let wall = wall_clock_millis();
        let previous = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
                Some(wall.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        wall.max(previous + 1)
    }
}

fn wall_clock_millis() -> Millis {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX)
}

/// Installed backend together with its commit clock and change feed.
#[derive(Clone)]
pub struct StoreHandle {
    backend: Arc<dyn DocumentStore>,
    clock: Arc<MonotonicClock>,
    feed: ChangeFeed,
}

impl StoreHandle {
    /// Wrap `backend`, publishing its commits on `feed`.
    pub fn new(backend: Arc<dyn DocumentStore>, feed: ChangeFeed) -> Self {
        Self {
            backend,
            clock: Arc::new(MonotonicClock::default()),
            feed,
        }
    }

    /// Document at `path`.
    pub async fn get(&self, path: &DocPath) -> StorageResult<Option<Document>> {
        self.backend.get(path.clone()).await
    }

    /// Documents directly under `collection`.
    pub async fn list(&self, collection: &DocPath) -> StorageResult<Vec<(String, Document)>> {
        self.backend.list(collection.clone()).await
    }

    /// Commit `batch` atomically, stamping it with a fresh server timestamp.
    ///
    /// Every batch must stay within a single root document so backends can apply it in one write.
    pub async fn commit(&self, batch: WriteBatch) -> StorageResult<Millis> {
        if batch.is_empty() {
            return Ok(self.clock.tick());
        }

        let roots = batch.roots();
        let [root] = roots.as_slice() else {
            return Err(StorageError::InvalidBatch(format!(
                "batch spans {} roots",
                roots.len()
            )));
        };
        let root = root.clone();

        let paths = batch.paths();
        let committed_at = self.clock.tick();
        let writes = batch.len();
        self.backend.commit(batch, committed_at).await?;

        debug!(root = %root, writes, committed_at, "batch committed");
        self.feed.publish(ChangeSet {
            root,
            paths,
            committed_at,
        });
        Ok(committed_at)
    }

    /// Check the backend answers.
    pub async fn health_check(&self) -> StorageResult<()> {
        self.backend.health_check().await
    }

    /// Ask the backend to reconnect.
    pub async fn try_reconnect(&self) -> StorageResult<()> {
        self.backend.try_reconnect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{document::Fields, document_store::memory::MemoryDocumentStore};

    fn handle() -> (StoreHandle, ChangeFeed) {
        let feed = ChangeFeed::new(8);
        let handle = StoreHandle::new(Arc::new(MemoryDocumentStore::new()), feed.clone());
        (handle, feed)
    }

    #[test]
    fn clock_is_strictly_monotonic() {
        let clock = MonotonicClock::default();
        let mut previous = clock.tick();
        for _ in 0..1_000 {
            let next = clock.tick();
            assert!(next > previous);
            previous = next;
        }
    }

    #[tokio::test]
    async fn commit_publishes_change_set() {
        let (handle, feed) = handle();
        let mut changes = feed.subscribe();

        let mut batch = WriteBatch::new();
        batch.set(
            DocPath::parse("rooms/ABC234").unwrap(),
            Fields::new().value("phase", "lobby"),
        );
        batch.set(
            DocPath::parse("rooms/ABC234/players/p1").unwrap(),
            Fields::new().value("name", "Ada"),
        );
        let committed_at = handle.commit(batch).await.unwrap();

        let change = changes.recv().await.unwrap();
        assert_eq!(change.root.as_str(), "rooms/ABC234");
        assert_eq!(change.paths.len(), 2);
        assert_eq!(change.committed_at, committed_at);
    }

    #[tokio::test]
    async fn rejects_batches_spanning_rooms() {
        let (handle, _feed) = handle();
        let mut batch = WriteBatch::new();
        batch.set(DocPath::parse("rooms/A").unwrap(), Fields::new());
        batch.set(DocPath::parse("rooms/B").unwrap(), Fields::new());

        assert!(matches!(
            handle.commit(batch).await,
            Err(StorageError::InvalidBatch(_))
        ));
        assert!(
            handle
                .get(&DocPath::parse("rooms/A").unwrap())
                .await
                .unwrap()
                .is_none()
        );
    }
}
