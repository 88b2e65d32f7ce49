//! Sync status tracker - folds lifecycle events into a live status snapshot.

use std::fmt;

use contracts::event_names::{
    CONFLICT_DETECTED, NETWORK_STATUS, OUTBOX_STATUS, SYNC_QUERIES_ERROR, SYNC_QUERIES_READY,
    SYNC_QUERIES_STARTED,
};
use contracts::{LifecycleBus, NormalizedEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::trace;

use crate::bus::{subscribe, Subscription};
use crate::conflict::is_truthy;
use crate::normalizer::canonical_name;

/// Connectivity as last reported by the engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkStatus {
    #[default]
    Online,
    Offline,
}

/// Background sync progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    #[default]
    NotSynced,
    Syncing,
    Synced,
    Error,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SyncState::NotSynced => "not_synced",
            SyncState::Syncing => "syncing",
            SyncState::Synced => "synced",
            SyncState::Error => "error",
        })
    }
}

/// Point-in-time sync status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub network: NetworkStatus,
    pub sync_state: SyncState,
    /// Latched on the first ready event, never cleared
    pub is_ready: bool,
    pub conflict_count: u64,
    /// Last reported outbox state (`None` until the first report)
    pub outbox_empty: Option<bool>,
}

impl SyncStatus {
    /// Fold one event into the status; returns whether anything changed
    pub fn apply(&mut self, event: &NormalizedEvent) -> bool {
        let before = self.clone();
        match canonical_name(event) {
            NETWORK_STATUS => {
                self.network = if is_truthy(event.data.get("active")) {
                    NetworkStatus::Online
                } else {
                    NetworkStatus::Offline
                };
            }
            SYNC_QUERIES_STARTED => self.sync_state = SyncState::Syncing,
            SYNC_QUERIES_READY => {
                self.sync_state = SyncState::Synced;
                self.is_ready = true;
            }
            SYNC_QUERIES_ERROR => self.sync_state = SyncState::Error,
            CONFLICT_DETECTED => self.conflict_count += 1,
            OUTBOX_STATUS => {
                self.outbox_empty = event.data.get("isEmpty").and_then(|v| v.as_bool());
            }
            other => trace!(event = other, "status tracker ignoring event"),
        }
        *self != before
    }
}

/// Live status fed by the lifecycle channel
///
/// Detaches from the bus on [`SyncStatusTracker::detach`] or drop.
#[derive(Debug)]
pub struct SyncStatusTracker {
    status: watch::Receiver<SyncStatus>,
    subscription: Subscription,
}

impl SyncStatusTracker {
    /// Start tracking events on `bus`
    pub fn attach<B>(bus: &B) -> Self
    where
        B: LifecycleBus + ?Sized,
    {
        let (tx, rx) = watch::channel(SyncStatus::default());
        let subscription = subscribe(bus, move |event| {
            tx.send_if_modified(|status| status.apply(&event));
        });
        Self {
            status: rx,
            subscription,
        }
    }

    /// Copy of the current status
    pub fn snapshot(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change
    pub fn watch(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    /// Stop tracking; the last snapshot stays readable
    pub fn detach(&self) {
        self.subscription.unsubscribe();
    }

    pub fn is_attached(&self) -> bool {
        self.subscription.is_active()
    }
}
