//! SimulatedStore - scriptable local store
//!
//! 用于测试和开发工具的模拟存储，支持按步骤注入挂起/失败/延迟。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use contracts::event_names::{
    CONFLICT_DETECTED, LEGACY_READY, LEGACY_SYNC_QUERIES_FAILED, OUTBOX_STATUS,
    SYNC_QUERIES_STARTED,
};
use contracts::{
    ConflictContext, ConflictHandler, ConflictRegistry, ContractError, DataStore, Record,
    ResetStep, DATASTORE_CHANNEL,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use crate::bus::InProcessBus;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// How a store call behaves
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepBehavior {
    /// Settle immediately with success
    #[default]
    Succeed,
    /// Settle immediately with a store error
    Fail(String),
    /// Never settle
    Hang,
    /// Succeed after a delay
    Delay(Duration),
}

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreState {
    Running,
    Stopped,
}

impl StoreState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreState::Running => "running",
            StoreState::Stopped => "stopped",
        }
    }
}

/// Sync queries outcome emitted after `start`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptedSync {
    Ready,
    Failed,
    /// Emit `syncQueriesStarted` only
    Silent,
}

/// Lifecycle events published after a successful `start`
///
/// Uses the legacy event names the engine emits (`ready`, `syncQueriesFailed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncScript {
    pub outcome: ScriptedSync,
    pub after: Duration,
}

impl SyncScript {
    pub fn ready_after(after: Duration) -> Self {
        Self {
            outcome: ScriptedSync::Ready,
            after,
        }
    }

    pub fn failed_after(after: Duration) -> Self {
        Self {
            outcome: ScriptedSync::Failed,
            after,
        }
    }

    pub fn silent() -> Self {
        Self {
            outcome: ScriptedSync::Silent,
            after: Duration::ZERO,
        }
    }
}

/// Simulated local store
///
/// Records every call in order. Also acts as the engine's conflict hook registry.
pub struct SimulatedStore {
    behaviors: Mutex<HashMap<ResetStep, StepBehavior>>,
    calls: Mutex<Vec<ResetStep>>,
    completed: Mutex<Vec<ResetStep>>,
    state: Mutex<StoreState>,
    records: AtomicUsize,
    pending_writes: Arc<AtomicUsize>,
    bus: Option<(InProcessBus, SyncScript)>,
    conflict_handler: Mutex<Option<Arc<dyn ConflictHandler>>>,
    registrations: AtomicUsize,
}

impl Default for SimulatedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedStore {
    /// Running store whose calls all succeed immediately
    pub fn new() -> Self {
        Self {
            behaviors: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            completed: Mutex::new(Vec::new()),
            state: Mutex::new(StoreState::Running),
            records: AtomicUsize::new(0),
            pending_writes: Arc::new(AtomicUsize::new(0)),
            bus: None,
            conflict_handler: Mutex::new(None),
            registrations: AtomicUsize::new(0),
        }
    }

    /// Script `step`
    pub fn with_step(self, step: ResetStep, behavior: StepBehavior) -> Self {
        self.set_step(step, behavior);
        self
    }

    /// Seed local records (wiped by `clear`)
    pub fn with_records(self, records: usize) -> Self {
        self.records.store(records, Ordering::SeqCst);
        self
    }

    /// Seed queued local writes (see [`SimulatedStore::drain_outbox`])
    pub fn with_pending_writes(self, pending: usize) -> Self {
        self.pending_writes.store(pending, Ordering::SeqCst);
        self
    }

    /// Publish lifecycle events on `bus` (channel `datastore`) as the engine would
    pub fn with_bus(mut self, bus: impl Into<InProcessBus>, script: SyncScript) -> Self {
        self.bus = Some((bus.into(), script));
        self
    }

    /// Re-script `step` at runtime
    pub fn set_step(&self, step: ResetStep, behavior: StepBehavior) {
        lock(&self.behaviors).insert(step, behavior);
    }

    /// Calls made so far, in order (including calls still in flight)
    pub fn calls(&self) -> Vec<ResetStep> {
        lock(&self.calls).clone()
    }

    /// Calls that settled successfully, in completion order
    pub fn completed(&self) -> Vec<ResetStep> {
        lock(&self.completed).clone()
    }

    pub fn state(&self) -> StoreState {
        *lock(&self.state)
    }

    pub fn record_count(&self) -> usize {
        self.records.load(Ordering::SeqCst)
    }

    pub fn pending_writes(&self) -> usize {
        self.pending_writes.load(Ordering::SeqCst)
    }

    /// Number of conflict handler registrations received
    pub fn handler_registrations(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    /// Hand `conflict` to the registered handler, as the engine would during sync
    ///
    /// Returns `None` when no handler is registered. Publishes `conflictDetected` when
    /// attached to a bus.
    pub fn simulate_conflict(&self, conflict: &ConflictContext) -> Option<Record> {
        let handler = lock(&self.conflict_handler).clone()?;
        self.publish(
            CONFLICT_DETECTED,
            json!({ "model": conflict.model_family, "operation": conflict.operation }),
        );
        Some(handler.resolve(conflict))
    }

    /// Report the outbox state now, then report it empty after `after`
    ///
    /// Requires a bus; without one this only clears the pending count.
    pub fn drain_outbox(&self, after: Duration) {
        let pending = Arc::clone(&self.pending_writes);
        let Some((bus, _)) = &self.bus else {
            pending.store(0, Ordering::SeqCst);
            return;
        };

        bus.publish(
            DATASTORE_CHANNEL,
            OUTBOX_STATUS,
            json!({ "isEmpty": pending.load(Ordering::SeqCst) == 0 }),
        );
        let bus = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            pending.store(0, Ordering::SeqCst);
            bus.publish(DATASTORE_CHANNEL, OUTBOX_STATUS, json!({ "isEmpty": true }));
        });
    }

    fn publish(&self, event: &str, data: serde_json::Value) {
        if let Some((bus, _)) = &self.bus {
            bus.publish(DATASTORE_CHANNEL, event, data);
        }
    }

    fn behavior(&self, step: ResetStep) -> StepBehavior {
        lock(&self.behaviors).get(&step).cloned().unwrap_or_default()
    }

    async fn run(&self, step: ResetStep) -> Result<(), ContractError> {
        lock(&self.calls).push(step);

        // The engine only wipes its tables once sync is stopped
        let state = self.state();
        if step == ResetStep::Clear && state == StoreState::Running {
            debug!(state = state.as_str(), "simulated store refused clear");
            return Err(ContractError::store_state(state.as_str(), step.as_str()));
        }

        match self.behavior(step) {
            StepBehavior::Succeed => {}
            StepBehavior::Fail(message) => {
                debug!(step = step.as_str(), %message, "simulated store call failed");
                return Err(ContractError::store(step.as_str(), message));
            }
            StepBehavior::Hang => std::future::pending::<()>().await,
            StepBehavior::Delay(delay) => tokio::time::sleep(delay).await,
        }

        self.apply(step);
        lock(&self.completed).push(step);
        Ok(())
    }

    fn apply(&self, step: ResetStep) {
        match step {
            ResetStep::Stop => *lock(&self.state) = StoreState::Stopped,
            ResetStep::Clear => {
                self.records.store(0, Ordering::SeqCst);
                self.pending_writes.store(0, Ordering::SeqCst);
            }
            ResetStep::Start => {
                *lock(&self.state) = StoreState::Running;
                self.script_sync();
            }
        }
    }

    fn script_sync(&self) {
        let Some((bus, script)) = &self.bus else {
            return;
        };

        bus.publish(DATASTORE_CHANNEL, SYNC_QUERIES_STARTED, json!({}));
        let event = match script.outcome {
            ScriptedSync::Ready => LEGACY_READY,
            ScriptedSync::Failed => LEGACY_SYNC_QUERIES_FAILED,
            ScriptedSync::Silent => return,
        };

        let bus = bus.clone();
        let after = script.after;
        tokio::spawn(async move {
            tokio::time::sleep(after).await;
            bus.publish(DATASTORE_CHANNEL, event, json!({}));
        });
    }
}

impl std::fmt::Debug for SimulatedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedStore")
            .field("state", &self.state())
            .field("calls", &self.calls())
            .field("records", &self.record_count())
            .finish()
    }
}

impl DataStore for SimulatedStore {
    #[instrument(name = "simulated_store_stop", skip(self))]
    async fn stop(&self) -> Result<(), ContractError> {
        self.run(ResetStep::Stop).await
    }

    #[instrument(name = "simulated_store_clear", skip(self))]
    async fn clear(&self) -> Result<(), ContractError> {
        self.run(ResetStep::Clear).await
    }

    #[instrument(name = "simulated_store_start", skip(self))]
    async fn start(&self) -> Result<(), ContractError> {
        self.run(ResetStep::Start).await
    }
}

impl ConflictRegistry for SimulatedStore {
    fn register_conflict_handler(&self, handler: Arc<dyn ConflictHandler>) {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        *lock(&self.conflict_handler) = Some(handler);
    }
}
