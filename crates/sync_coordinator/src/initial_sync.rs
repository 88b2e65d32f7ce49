//! Initial-sync waiter.
//!
//! Single-shot state machine: Waiting -> {Ready, Failed, TimedOut}. Readiness is
//! advisory, callers proceed on every outcome with different confidence.

use std::collections::HashSet;
use std::sync::Arc;

use contracts::{
    InitialSyncOptions, InitialSyncResult, LifecycleBus, LifecycleTelemetry, WaiterKind,
};
use tokio::time::Instant;
use tracing::{debug, instrument};

use crate::normalizer::{canonical_name, canonicalize};
use crate::race::first_matching_event;

/// Canonicalized ready/failure sets
#[derive(Debug, Clone)]
struct OutcomeSets {
    ready: HashSet<String>,
    failed: HashSet<String>,
}

impl OutcomeSets {
    fn from_options(options: &InitialSyncOptions) -> Self {
        let canonical = |names: &[String]| {
            names
                .iter()
                .map(|name| canonicalize(name).to_string())
                .collect::<HashSet<_>>()
        };
        Self {
            ready: canonical(&options.ready_events),
            failed: canonical(&options.failure_events),
        }
    }

    fn classify(&self, canonical: &str) -> Option<InitialSyncResult> {
        if self.ready.contains(canonical) {
            Some(InitialSyncResult::ready(canonical))
        } else if self.failed.contains(canonical) {
            Some(InitialSyncResult::failed(canonical))
        } else {
            None
        }
    }
}

/// Wait for the store to report initial sync ready (or failed), bounded by the deadline
///
/// Never fails: a deadline is reported as `SyncOutcome::Timeout` with no event.
#[instrument(
    name = "wait_for_initial_sync",
    skip(bus, options, telemetry),
    fields(timeout_ms = options.timeout_ms)
)]
pub async fn wait_for_initial_sync_with<B>(
    bus: &B,
    options: &InitialSyncOptions,
    telemetry: Arc<dyn LifecycleTelemetry>,
) -> InitialSyncResult
where
    B: LifecycleBus + ?Sized,
{
    let sets = OutcomeSets::from_options(options);
    let started = Instant::now();
    let observer = Arc::clone(&telemetry);

    let result = first_matching_event(
        bus,
        options.timeout(),
        move |event| {
            observer.event_observed(WaiterKind::InitialSync, event);
            sets.classify(canonical_name(event))
        },
        InitialSyncResult::timeout,
    )
    .await;

    debug!(
        outcome = %result.outcome,
        event = ?result.event,
        "initial sync wait resolved"
    );
    telemetry.initial_sync_resolved(&result, started.elapsed());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{NoopTelemetry, SyncOutcome, DATASTORE_CHANNEL};
    use serde_json::json;
    use std::time::Duration;
    use store_harness::InProcessBus;

    fn noop() -> Arc<dyn LifecycleTelemetry> {
        Arc::new(NoopTelemetry)
    }

    fn publish_later(bus: &Arc<InProcessBus>, after_ms: u64, event: &'static str) {
        let bus = Arc::clone(bus);
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(after_ms)).await;
            bus.publish(DATASTORE_CHANNEL, event, json!({}));
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_on_legacy_event() {
        let bus = Arc::new(InProcessBus::new());
        publish_later(&bus, 10, "ready");

        let result = wait_for_initial_sync_with(
            bus.as_ref(),
            &InitialSyncOptions::with_timeout_ms(1_000),
            noop(),
        )
        .await;

        assert_eq!(result, InitialSyncResult::ready("syncQueriesReady"));
        assert_eq!(bus.unsubscribe_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_on_legacy_failure_event() {
        let bus = Arc::new(InProcessBus::new());
        publish_later(&bus, 10, "syncQueriesFailed");

        let result = wait_for_initial_sync_with(
            bus.as_ref(),
            &InitialSyncOptions::with_timeout_ms(1_000),
            noop(),
        )
        .await;

        assert_eq!(result.outcome, SyncOutcome::Failed);
        assert_eq!(result.event.as_deref(), Some("syncQueriesError"));
        assert_eq!(bus.unsubscribe_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_without_events() {
        let bus = InProcessBus::new();
        let started = tokio::time::Instant::now();

        let result =
            wait_for_initial_sync_with(&bus, &InitialSyncOptions::with_timeout_ms(1_000), noop())
                .await;

        assert_eq!(result, InitialSyncResult::timeout());
        assert!(result.event.is_none());
        assert!(started.elapsed() >= Duration::from_millis(1_000));
        assert_eq!(bus.unsubscribe_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrelated_events_are_ignored() {
        let bus = Arc::new(InProcessBus::new());
        publish_later(&bus, 5, "outboxStatus");
        publish_later(&bus, 6, "networkStatus");
        publish_later(&bus, 20, "syncQueriesReady");

        let result = wait_for_initial_sync_with(
            bus.as_ref(),
            &InitialSyncOptions::with_timeout_ms(1_000),
            noop(),
        )
        .await;

        assert_eq!(result, InitialSyncResult::ready("syncQueriesReady"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_sets_are_canonicalized() {
        let bus = Arc::new(InProcessBus::new());
        publish_later(&bus, 10, "syncQueriesReady");

        // "ready" configured, modern name arrives: both canonicalize to the same name
        let options = InitialSyncOptions {
            timeout_ms: 1_000,
            ready_events: vec!["ready".to_string()],
            failure_events: vec![],
        };
        let result = wait_for_initial_sync_with(bus.as_ref(), &options, noop()).await;
        assert!(result.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_event_after_timeout_is_not_observed() {
        let bus = Arc::new(InProcessBus::new());
        publish_later(&bus, 2_000, "ready");

        let result = wait_for_initial_sync_with(
            bus.as_ref(),
            &InitialSyncOptions::with_timeout_ms(1_000),
            noop(),
        )
        .await;
        assert_eq!(result.outcome, SyncOutcome::Timeout);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(bus.listener_count(DATASTORE_CHANNEL), 0);
        assert_eq!(bus.unsubscribe_count(), 1);
    }
}
