//! Lifecycle notifications - raw and normalized shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Channel the storage engine publishes lifecycle notifications on
pub const DATASTORE_CHANNEL: &str = "datastore";

/// Well-known lifecycle event names (canonical form unless noted)
pub mod event_names {
    /// Initial sync queries finished (canonical ready name)
    pub const SYNC_QUERIES_READY: &str = "syncQueriesReady";
    /// Initial sync queries failed (canonical failure name)
    pub const SYNC_QUERIES_ERROR: &str = "syncQueriesError";
    /// Initial sync queries started
    pub const SYNC_QUERIES_STARTED: &str = "syncQueriesStarted";
    /// Outbox status changed, `data.isEmpty` carries the queue state
    pub const OUTBOX_STATUS: &str = "outboxStatus";
    /// Network status changed, `data.active` carries connectivity
    pub const NETWORK_STATUS: &str = "networkStatus";
    /// The engine detected a local/remote conflict
    pub const CONFLICT_DETECTED: &str = "conflictDetected";

    /// Legacy alias of [`SYNC_QUERIES_READY`]
    pub const LEGACY_READY: &str = "ready";
    /// Legacy alias of [`SYNC_QUERIES_ERROR`]
    pub const LEGACY_SYNC_QUERIES_FAILED: &str = "syncQueriesFailed";

    /// Legacy/alternate name -> canonical name.
    ///
    /// Targets must never appear as keys, so canonicalization stays idempotent.
    pub const ALIASES: &[(&str, &str)] = &[
        (LEGACY_READY, SYNC_QUERIES_READY),
        (LEGACY_SYNC_QUERIES_FAILED, SYNC_QUERIES_ERROR),
    ];

    /// Canonical names the engine is known to publish
    pub const KNOWN: &[&str] = &[
        SYNC_QUERIES_READY,
        SYNC_QUERIES_ERROR,
        SYNC_QUERIES_STARTED,
        OUTBOX_STATUS,
        NETWORK_STATUS,
        CONFLICT_DETECTED,
    ];

    /// Resolve a raw event name to its canonical name
    ///
    /// Names absent from the alias table pass through unchanged.
    pub fn canonicalize(name: &str) -> &str {
        for (alias, canonical) in ALIASES {
            if *alias == name {
                return canonical;
            }
        }
        name
    }

    /// Canonical form of `name` if it is a known engine event
    pub fn known(name: &str) -> Option<&'static str> {
        let canonical = canonicalize(name);
        KNOWN.iter().copied().find(|candidate| *candidate == canonical)
    }
}

/// Opaque, vendor-shaped payload as delivered by the bus.
///
/// Never trusted: every receipt goes through the normalizer.
pub type RawNotification = Value;

/// Parsed lifecycle event
///
/// Produced per notification, consumed by the first matching listener, then discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEvent {
    /// Event name as received (not yet canonicalized)
    pub event: String,
    /// Event data, passed through untouched
    #[serde(default)]
    pub data: Value,
}

impl NormalizedEvent {
    /// Create a new event
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }
}

/// Build a raw notification in the engine's `{payload: {event, data}}` shape.
///
/// Used by in-process buses and tests to publish well-formed notifications.
pub fn raw_notification(event: &str, data: Value) -> RawNotification {
    serde_json::json!({
        "payload": {
            "event": event,
            "data": data,
        }
    })
}
