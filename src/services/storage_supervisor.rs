use std::{env, future::Future, str::FromStr, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

#[cfg(feature = "couch-store")]
use crate::dao::document_store::couchdb::{CouchConfig, CouchDocumentStore};
#[cfg(feature = "mongo-store")]
use crate::dao::document_store::mongodb::{MongoConfig, MongoDocumentStore};
use crate::{
    dao::{
        document_store::{DocumentStore, memory::MemoryDocumentStore},
        storage::StorageError,
    },
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;
const BACKEND_ENV: &str = "WHOSE_SONG_STORE";

/// Document store selected through `WHOSE_SONG_STORE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    /// Process-local store; rooms do not survive a restart.
    Memory,
    /// CouchDB, configured through `COUCH_*`.
    Couch,
    /// MongoDB, configured through `MONGO_*`.
    Mongo,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" | "" => Ok(StoreBackend::Memory),
            "couch" | "couchdb" => Ok(StoreBackend::Couch),
            "mongo" | "mongodb" => Ok(StoreBackend::Mongo),
            other => Err(format!("unknown store backend `{other}`")),
        }
    }
}

impl StoreBackend {
    /// Read the backend from the environment, falling back to the in-memory store.
    pub fn from_env() -> Self {
        match env::var(BACKEND_ENV) {
            Ok(raw) => raw.parse().unwrap_or_else(|err: String| {
                warn!(error = %err, "falling back to the in-memory store");
                StoreBackend::Memory
            }),
            Err(_) => StoreBackend::Memory,
        }
    }

    /// Build a connected backend.
    pub async fn connect(self) -> Result<Arc<dyn DocumentStore>, StorageError> {
        match self {
            StoreBackend::Memory => Ok(Arc::new(MemoryDocumentStore::new())),
            #[cfg(feature = "couch-store")]
            StoreBackend::Couch => {
                let config = CouchConfig::from_env()?;
                Ok(Arc::new(CouchDocumentStore::connect(config).await?))
            }
            #[cfg(feature = "mongo-store")]
            StoreBackend::Mongo => {
                let config = MongoConfig::from_env().await?;
                Ok(Arc::new(MongoDocumentStore::connect(config).await?))
            }
            #[allow(unreachable_patterns)]
            other => Err(StorageError::unavailable(
                format!("{other:?} store support was not compiled in"),
                std::io::Error::new(std::io::ErrorKind::Unsupported, "missing cargo feature"),
            )),
        }
    }
}

/// Keep a store installed in the shared state, backing off between connection attempts.
/// The state stays degraded while no healthy store is available.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn DocumentStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;
    loop {
        match connect().await {
            Ok(store) => {
                state.install_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;
                watch(&state, store.as_ref()).await;
            }
            Err(err) => warn!(error = %err, "storage connection attempt failed"),
        }
        sleep(delay).await;
        delay = next_delay(delay);
    }
}

/// Poll the store until it fails beyond recovery, then drop it from the state.
async fn watch(state: &SharedState, store: &dyn DocumentStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("storage healthy again; leaving degraded mode");
                    state.mark_degraded(false);
                }
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                if !recover(state, store).await {
                    warn!("exhausted storage reconnect attempts; dropping the backend");
                    state.clear_store().await;
                    return;
                }
                state.mark_degraded(false);
            }
        }
        sleep(HEALTH_POLL_INTERVAL).await;
    }
}

/// Try to reconnect in place. Degraded mode starts at the first failed attempt.
async fn recover(state: &SharedState, store: &dyn DocumentStore) -> bool {
    let mut delay = INITIAL_DELAY;
    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnected after a failed health check");
                return true;
            }
            Err(err) => {
                warn!(attempt, error = %err, "storage reconnect attempt failed");
                if attempt == 0 {
                    state.mark_degraded(true);
                }
                sleep(delay).await;
                delay = next_delay(delay);
            }
        }
    }
    false
}

fn next_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::AppConfig, state::AppState};

    #[test]
    fn parses_backend_names() {
        assert_eq!("memory".parse::<StoreBackend>(), Ok(StoreBackend::Memory));
        assert_eq!(" CouchDB ".parse::<StoreBackend>(), Ok(StoreBackend::Couch));
        assert_eq!("mongo".parse::<StoreBackend>(), Ok(StoreBackend::Mongo));
        assert!("redis".parse::<StoreBackend>().is_err());
    }

    #[tokio::test]
    async fn supervisor_installs_the_store() {
        let state = AppState::new(AppConfig::default());
        let mut watcher = state.degraded_watcher();
        let handle = tokio::spawn(run(state.clone(), || StoreBackend::Memory.connect()));

        watcher.changed().await.unwrap();
        assert!(!state.is_degraded());
        assert!(state.require_store().await.is_ok());
        handle.abort();
    }

    #[test]
    fn backoff_is_capped() {
        assert_eq!(next_delay(INITIAL_DELAY), Duration::from_secs(2));
        assert_eq!(next_delay(Duration::from_secs(8)), MAX_DELAY);
    }
}
