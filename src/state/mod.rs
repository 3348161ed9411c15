/// Per-round submissions and votes, and the checks made on them.
pub mod ledger;
/// Room and player domain types.
pub mod room;
/// Round scoring.
pub mod scoring;
/// Phase machine with plan/apply/abort transitions.
pub mod state_machine;
/// Game statistics over finished rounds.
pub mod stats;

use std::{future::Future, sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, broadcast, watch};
use tokio::time::timeout;
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    dao::document_store::{ChangeFeed, ChangeSet, DocumentStore, StoreHandle},
    error::ServiceError,
};

pub use self::state_machine::{AbortError, ApplyError, Plan, PlanError, PlanId, Snapshot};
use self::state_machine::{RoomEvent, RoomPhase, RoomStateMachine};

/// State shared by every handler.
pub type SharedState = Arc<AppState>;
/// Deadline for the side effects of one transition.
pub const DEFAULT_TRANSITION_TIMEOUT: Duration = Duration::from_secs(5);
const CHANGE_FEED_CAPACITY: usize = 256;

/// Per-room serialization point: the gate orders every write to the room,
/// the machine tracks its phase between requests.
struct RoomSlot {
    gate: Mutex<()>,
    machine: RwLock<RoomStateMachine>,
}

impl RoomSlot {
    fn resume(phase: RoomPhase) -> Self {
        Self {
            gate: Mutex::new(()),
            machine: RwLock::new(RoomStateMachine::resume(phase)),
        }
    }
}

/// Central application state: the installed store, the change feed and per-room machines.
pub struct AppState {
    store: RwLock<Option<StoreHandle>>,
    changes: ChangeFeed,
    rooms: DashMap<String, Arc<RoomSlot>>,
    config: AppConfig,
    degraded: watch::Sender<bool>,
    transition_timeout: Option<Duration>,
}

impl AppState {
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new(config: AppConfig) -> SharedState {
        Self::with_transition_timeout(config, Some(DEFAULT_TRANSITION_TIMEOUT))
    }

    /// Like [`Self::new`] with a custom transition deadline; `None` disables it.
    pub fn with_transition_timeout(config: AppConfig, limit: Option<Duration>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            changes: ChangeFeed::new(CHANGE_FEED_CAPACITY),
            rooms: DashMap::new(),
            config,
            degraded: degraded_tx,
            transition_timeout: limit,
        })
    }

    /// Runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Installed store, if any.
    pub async fn store(&self) -> Option<StoreHandle> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Installed store, or [`ServiceError::Degraded`] when none is available.
    pub async fn require_store(&self) -> Result<StoreHandle, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a backend and leave degraded mode. Commits through it feed [`Self::subscribe_changes`].
    pub async fn install_store(&self, backend: Arc<dyn DocumentStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(StoreHandle::new(backend, self.changes.clone()));
        }
        self.rooms.clear();
        self.mark_degraded(false);
    }

    /// Remove the current store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.mark_degraded(true);
    }

    /// Whether no healthy store is available.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Receiver notified whenever degraded mode flips.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Change notifications for every committed batch, across all rooms.
    pub fn subscribe_changes(&self) -> broadcast::Receiver<ChangeSet> {
        self.changes.subscribe()
    }

    /// Flip degraded mode without touching the installed store (failing health checks).
    pub fn mark_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }

    fn room_slot(&self, code: &str, stored_phase: RoomPhase) -> Arc<RoomSlot> {
        self.rooms
            .entry(code.to_owned())
            .or_insert_with(|| Arc::new(RoomSlot::resume(stored_phase)))
            .clone()
    }

    /// Drop the in-memory machine so the next command rehydrates it from the store.
    fn forget_room(&self, code: &str) {
        self.rooms.remove(code);
    }

    /// Drop a finished room's slot unless another request already holds it.
    /// A later restart rehydrates the machine from the stored phase.
    fn release_idle_room(&self, code: &str) {
        // one reference in the map plus the caller's
        self.rooms.remove_if(code, |_, slot| Arc::strong_count(slot) <= 2);
    }

    /// Phase tracked in memory for `code`, if the room has been touched since startup.
    pub async fn tracked_phase(&self, code: &str) -> Option<RoomPhase> {
        let slot = self.rooms.get(code).map(|slot| slot.clone())?;
        let machine = slot.machine.read().await;
        Some(machine.phase())
    }

    /// Run `work` while holding the room gate, applying the transition for `event` only
    /// when the work succeeds. Failed or timed-out work aborts the plan and leaves the phase untouched.
    pub async fn run_transition<F, Fut, T>(
        &self,
        code: &str,
        stored_phase: RoomPhase,
        event: RoomEvent,
        work: F,
    ) -> Result<(T, RoomPhase), ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let slot = self.room_slot(code, stored_phase);
        let gate = slot.gate.lock().await;
        let Plan { id: plan_id, from, .. } = slot.machine.write().await.plan(event)?;

        let work_future = work();
        let outcome = match self.transition_timeout {
            Some(limit) => match timeout(limit, work_future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Err(abort_err) = slot.machine.write().await.abort(plan_id) {
                        warn!(
                            room = code,
                            event = ?event,
                            plan_id = %plan_id,
                            error = %abort_err,
                            "failed to abort transition after timeout"
                        );
                    }
                    // the store may have applied the batch after all
                    self.forget_room(code);
                    drop(gate);
                    warn!(room = code, event = ?event, "transition timed out");
                    return Err(ServiceError::Timeout);
                }
            },
            None => work_future.await,
        };

        match outcome {
            Ok(value) => {
                let next = slot.machine.write().await.apply(plan_id)?;
                if next == RoomPhase::Finished {
                    self.release_idle_room(code);
                }
                drop(gate);
                info!(room = code, from = %from, to = %next, event = ?event, "room transition applied");
                Ok((value, next))
            }
            Err(err) => {
                if let Err(abort_err) = slot.machine.write().await.abort(plan_id) {
                    warn!(
                        room = code,
                        event = ?event,
                        plan_id = %plan_id,
                        error = %abort_err,
                        "failed to abort transition after work error"
                    );
                }
                drop(gate);
                Err(err)
            }
        }
    }

    /// Run `work` while holding the room gate without changing phase
    /// (ledger writes, profile and settings updates).
    pub async fn run_exclusive<F, Fut, T>(
        &self,
        code: &str,
        stored_phase: RoomPhase,
        work: F,
    ) -> Result<T, ServiceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let slot = self.room_slot(code, stored_phase);
        let _gate = slot.gate.lock().await;

        match self.transition_timeout {
            Some(limit) => timeout(limit, work())
                .await
                .map_err(|_| ServiceError::Timeout)?,
            None => work().await,
        }
    }
}
