//! InProcessBus - synchronous in-process pub/sub satisfying `LifecycleBus`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use contracts::{raw_notification, LifecycleBus, RawCallback, RawNotification, Unsubscribe};
use serde_json::Value;
use tracing::trace;

type Listeners = HashMap<String, Vec<(u64, RawCallback)>>;

#[derive(Default)]
struct BusInner {
    listeners: Mutex<Listeners>,
    next_id: AtomicU64,
    unsubscribes: AtomicUsize,
    published: AtomicU64,
}

impl BusInner {
    fn listeners(&self) -> MutexGuard<'_, Listeners> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, channel: &str, id: u64) {
        let mut listeners = self.listeners();
        if let Some(entries) = listeners.get_mut(channel) {
            entries.retain(|(entry_id, _)| *entry_id != id);
            if entries.is_empty() {
                listeners.remove(channel);
            }
        }
    }
}

/// In-process notification bus
///
/// Publishing is synchronous: every listener runs on the publisher's thread before
/// `publish` returns. Listeners are snapshotted first and called with no lock held, so a
/// callback may unsubscribe itself (or anyone else) mid-dispatch.
#[derive(Clone, Default)]
pub struct InProcessBus {
    inner: Arc<BusInner>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `{payload: {event, data}}` on `channel`
    pub fn publish(&self, channel: &str, event: &str, data: Value) {
        self.publish_raw(channel, &raw_notification(event, data));
    }

    /// Publish an arbitrary notification value on `channel`
    pub fn publish_raw(&self, channel: &str, raw: &RawNotification) {
        let snapshot: Vec<RawCallback> = self
            .inner
            .listeners()
            .get(channel)
            .map(|entries| entries.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default();

        self.inner.published.fetch_add(1, Ordering::Relaxed);
        trace!(channel, listeners = snapshot.len(), "dispatching notification");
        for callback in snapshot {
            callback(raw);
        }
    }

    /// Number of listeners currently attached to `channel`
    pub fn listener_count(&self, channel: &str) -> usize {
        self.inner.listeners().get(channel).map_or(0, Vec::len)
    }

    /// Number of detach handles invoked so far
    pub fn unsubscribe_count(&self) -> usize {
        self.inner.unsubscribes.load(Ordering::SeqCst)
    }

    /// Number of notifications published so far
    pub fn published_count(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }
}

/// Shares the same listener table as the wrapped bus
impl From<Arc<InProcessBus>> for InProcessBus {
    fn from(bus: Arc<InProcessBus>) -> Self {
        (*bus).clone()
    }
}

impl std::fmt::Debug for InProcessBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let channels: Vec<(String, usize)> = self
            .inner
            .listeners()
            .iter()
            .map(|(channel, entries)| (channel.clone(), entries.len()))
            .collect();
        f.debug_struct("InProcessBus")
            .field("channels", &channels)
            .field("unsubscribes", &self.unsubscribe_count())
            .finish()
    }
}

impl LifecycleBus for InProcessBus {
    fn listen(&self, channel: &str, callback: RawCallback) -> Unsubscribe {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners()
            .entry(channel.to_string())
            .or_default()
            .push((id, callback));

        let inner = Arc::clone(&self.inner);
        let channel = channel.to_string();
        Box::new(move || {
            inner.unsubscribes.fetch_add(1, Ordering::SeqCst);
            inner.remove(&channel, id);
        })
    }
}
